use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::InnerState;

pub async fn health_check(State(inner): State<InnerState>) -> impl IntoResponse {
    match sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&inner.db)
        .await
    {
        Ok(_) => (StatusCode::OK, "OK"),
        Err(e) => {
            tracing::error!("Health check database ping failed: {:?}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "DB UNAVAILABLE")
        }
    }
}

mod ai;
mod catalog;
mod db;
mod drive;
mod errors;
mod routes;
mod store;
mod system;
mod utils;

use std::error::Error;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use axum_prometheus::PrometheusMetricLayer;
use sqlx::PgPool;
use time::Duration;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::ai::AiClient;
use crate::catalog::CatalogCache;
use crate::db::init_db;
use crate::routes::{
    add_video, admin_login, admin_logout, admin_session, delete_video, get_video, list_videos,
    refresh_videos,
};
use crate::store::VideoStore;
use crate::system::health_check::health_check;

#[derive(Clone)]
struct InnerState {
    pub db: PgPool,
    pub videos: VideoStore,
    pub catalog: Arc<RwLock<CatalogCache>>,
    pub ai: AiClient,
    pub admin_username: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api_streamlink=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db = init_db().await?;

    let ai = AiClient::new(
        std::env::var("AI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com".to_string()),
        std::env::var("AI_API_KEY").unwrap_or_default(),
        std::env::var("AI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
    );

    let admin_username = std::env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string());

    let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();

    let session_store = MemoryStore::default();
    let session = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_expiry(Expiry::OnInactivity(Duration::days(120)));

    let app_state = InnerState {
        videos: VideoStore::new(db.clone()),
        catalog: Arc::new(RwLock::new(CatalogCache::new())),
        ai,
        admin_username,
        db,
    };

    let app = Router::new()
        .route("/videos", get(list_videos).post(add_video))
        .route("/videos/refresh", post(refresh_videos))
        .route("/videos/:id", get(get_video).delete(delete_video))
        .route("/admin/login", post(admin_login))
        .route("/admin/logout", post(admin_logout))
        .route("/admin/session", get(admin_session))
        .route("/metrics", get(|| async move { metric_handle.render() }))
        .route("/health", get(health_check))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(prometheus_layer)
        .layer(session)
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3001")
        .await
        .expect("Could not initialize TcpListener");

    tracing::debug!(
        "listening on {}",
        listener
            .local_addr()
            .expect("Could not convert listener address to local address")
    );

    axum::serve(listener, app)
        .await
        .expect("Could not successfully connect");

    Ok(())
}

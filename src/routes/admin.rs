use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::errors::AppError;
use crate::InnerState;

/// The admin flag lives in the request session, not in process-wide state;
/// every handler that mutates the catalog asks for it explicitly.
const ADMIN_SESSION_KEY: &str = "isAdminAuthenticated";

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub is_authenticated: bool,
}

fn session_error(e: tower_sessions::session::Error) -> AppError {
    AppError::Unexpected(anyhow::Error::new(e).context("Session store failure"))
}

#[tracing::instrument(name = "Admin login", skip(session, inner, payload))]
pub async fn admin_login(
    session: Session,
    State(inner): State<InnerState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    if !payload.username.eq_ignore_ascii_case(&inner.admin_username) {
        tracing::warn!("Rejected admin login attempt");
        return Err(AppError::Authentication(anyhow::anyhow!(
            "Unknown admin username"
        )));
    }

    session
        .insert(ADMIN_SESSION_KEY, true)
        .await
        .map_err(session_error)?;

    tracing::info!("Admin session established");
    Ok(Json(SessionResponse {
        is_authenticated: true,
    }))
}

#[tracing::instrument(name = "Admin logout", skip(session))]
pub async fn admin_logout(session: Session) -> Result<Json<SessionResponse>, AppError> {
    session.flush().await.map_err(session_error)?;
    Ok(Json(SessionResponse {
        is_authenticated: false,
    }))
}

#[tracing::instrument(name = "Admin session check", skip(session))]
pub async fn admin_session(session: Session) -> Result<Json<SessionResponse>, AppError> {
    let is_authenticated = session
        .get::<bool>(ADMIN_SESSION_KEY)
        .await
        .map_err(session_error)?
        .unwrap_or(false);

    Ok(Json(SessionResponse { is_authenticated }))
}

pub async fn require_admin(session: &Session) -> Result<(), AppError> {
    let is_authenticated = session
        .get::<bool>(ADMIN_SESSION_KEY)
        .await
        .map_err(session_error)?
        .unwrap_or(false);

    if is_authenticated {
        Ok(())
    } else {
        Err(AppError::Authentication(anyhow::anyhow!(
            "Admin session required"
        )))
    }
}

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use url::Url;

use crate::catalog::{self, CatalogState};
use crate::drive;
use crate::errors::AppError;
use crate::routes::admin::require_admin;
use crate::store::{NewVideo, Video, DEFAULT_DESCRIPTION};
use crate::InnerState;

const MAX_TITLE_CHARS: usize = 150;
const MAX_DESCRIPTION_CHARS: usize = 5000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddVideoRequest {
    pub google_drive_link: String,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddVideoResponse {
    pub created: bool,
    pub video_id: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct VideoListResponse {
    pub data: Vec<Video>,
    pub total: usize,
    pub state: CatalogState,
}

#[derive(Debug, Serialize)]
pub struct DeleteVideoResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Substring,
    Relevance,
}

#[derive(Debug, Deserialize)]
pub struct VideoQueryParams {
    pub q: Option<String>,
    #[serde(default)]
    pub mode: SearchMode,
}

/// Title for records submitted without one.
fn default_title(file_id: &str) -> String {
    format!("Google Drive Video {}", file_id)
}

fn resolve_title(title: Option<String>, file_id: &str) -> Result<String, AppError> {
    match title {
        Some(title) => {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(AppError::Validation("Title is required.".to_string()));
            }
            if title.chars().count() > MAX_TITLE_CHARS {
                return Err(AppError::Validation(format!(
                    "Title cannot exceed {} characters.",
                    MAX_TITLE_CHARS
                )));
            }
            Ok(title)
        }
        None => Ok(default_title(file_id)),
    }
}

fn validate_description(description: &Option<String>) -> Result<(), AppError> {
    if let Some(description) = description {
        if description.chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(AppError::Validation(format!(
                "Description cannot exceed {} characters.",
                MAX_DESCRIPTION_CHARS
            )));
        }
    }
    Ok(())
}

/// Re-run the full catalog fetch and install the result under a sequencing
/// token, so a slower fetch finishing late cannot clobber a newer snapshot.
pub(crate) async fn refresh_catalog(inner: &InnerState) -> Result<Vec<Video>, AppError> {
    let token = inner.catalog.write().await.begin_fetch();

    match inner.videos.list_all().await {
        Ok(videos) => {
            let mut cache = inner.catalog.write().await;
            cache.install(token, videos);
            Ok(cache.snapshot())
        }
        Err(e) => {
            inner.catalog.write().await.mark_error(token);
            Err(e)
        }
    }
}

async fn ensure_catalog_loaded(inner: &InnerState) -> Result<(), AppError> {
    if inner.catalog.read().await.is_loaded() {
        return Ok(());
    }
    refresh_catalog(inner).await?;
    Ok(())
}

#[tracing::instrument(name = "Add video to library", skip(session, inner, payload))]
pub async fn add_video(
    session: Session,
    State(inner): State<InnerState>,
    Json(payload): Json<AddVideoRequest>,
) -> Result<Json<AddVideoResponse>, AppError> {
    require_admin(&session).await?;

    Url::parse(&payload.google_drive_link)?;

    let file_id = drive::extract_drive_file_id(&payload.google_drive_link).ok_or_else(|| {
        AppError::Validation("Invalid Google Drive link format.".to_string())
    })?;

    let title = resolve_title(payload.title, &file_id)?;
    validate_description(&payload.description)?;

    if inner.videos.exists(&file_id).await? {
        tracing::info!("Video {} already cataloged, skipping insert", file_id);
        return Ok(Json(AddVideoResponse {
            created: false,
            video_id: file_id,
            message: "This video already exists in the library.".to_string(),
        }));
    }

    let description = match payload.description {
        Some(description) if !description.trim().is_empty() => description,
        _ => match inner.ai.generate_description(&title).await {
            Ok(generated) if !generated.is_empty() => generated,
            Ok(_) => DEFAULT_DESCRIPTION.to_string(),
            Err(e) => {
                tracing::warn!("Description generation unavailable, using fallback: {:?}", e);
                DEFAULT_DESCRIPTION.to_string()
            }
        },
    };

    let video = inner
        .videos
        .create(NewVideo {
            thumbnail_url: drive::thumbnail_url(&file_id),
            google_drive_file_id: file_id,
            title: title.clone(),
            description,
            original_link: payload.google_drive_link,
        })
        .await?;

    inner.catalog.write().await.insert(video.clone());

    tracing::info!("Added video {} to the library", video.id);
    Ok(Json(AddVideoResponse {
        created: true,
        video_id: video.id,
        message: format!("Video \"{}\" added successfully.", title),
    }))
}

#[tracing::instrument(name = "List videos", skip(inner))]
pub async fn list_videos(
    State(inner): State<InnerState>,
    Query(params): Query<VideoQueryParams>,
) -> Result<Json<VideoListResponse>, AppError> {
    ensure_catalog_loaded(&inner).await?;

    let (snapshot, state) = {
        let cache = inner.catalog.read().await;
        (cache.snapshot(), cache.state())
    };
    let query = params.q.unwrap_or_default();

    let data = if query.trim().is_empty() {
        snapshot
    } else {
        match params.mode {
            SearchMode::Relevance => relevance_or_substring(&inner, &snapshot, &query).await,
            SearchMode::Substring => catalog::filter_substring(&snapshot, &query),
        }
    };

    let total = data.len();
    Ok(Json(VideoListResponse { data, total, state }))
}

/// Relevance mode delegates to the collaborator; any failure falls back
/// silently to substring matching. Search never hard-fails the listing.
async fn relevance_or_substring(
    inner: &InnerState,
    snapshot: &[Video],
    query: &str,
) -> Vec<Video> {
    let titles: Vec<String> = snapshot.iter().map(|v| v.title.clone()).collect();
    let descriptions: Vec<String> = snapshot.iter().map(|v| v.description.clone()).collect();

    match inner.ai.search_titles(query, &titles, &descriptions).await {
        Ok(matching) => catalog::filter_by_titles(snapshot, &matching),
        Err(e) => {
            tracing::warn!("Relevance search unavailable, falling back to substring: {:?}", e);
            catalog::filter_substring(snapshot, query)
        }
    }
}

#[tracing::instrument(name = "Refresh video catalog", skip(inner))]
pub async fn refresh_videos(
    State(inner): State<InnerState>,
) -> Result<Json<VideoListResponse>, AppError> {
    let data = refresh_catalog(&inner).await?;
    let total = data.len();
    let state = inner.catalog.read().await.state();
    Ok(Json(VideoListResponse { data, total, state }))
}

#[tracing::instrument(name = "Get video detail", skip(inner))]
pub async fn get_video(
    State(inner): State<InnerState>,
    Path(video_id): Path<String>,
) -> Result<Json<Video>, AppError> {
    // A backend failure and a missing record render the same to the viewer,
    // so both collapse to not-found here.
    let video = match inner.videos.get_by_id(&video_id).await {
        Ok(video) => video,
        Err(e) => {
            tracing::warn!("Lookup of video {} failed: {:?}", video_id, e);
            None
        }
    };

    video
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Video '{}' not found", video_id)))
}

#[tracing::instrument(name = "Delete video", skip(session, inner))]
pub async fn delete_video(
    session: Session,
    State(inner): State<InnerState>,
    Path(video_id): Path<String>,
) -> Result<Json<DeleteVideoResponse>, AppError> {
    require_admin(&session).await?;

    // On failure the cache is left untouched; the prune below only runs
    // after the backend confirmed the delete.
    inner.videos.delete_by_id(&video_id).await?;
    inner.catalog.write().await.remove(&video_id);

    tracing::info!("Deleted video {} from the library", video_id);
    Ok(Json(DeleteVideoResponse {
        success: true,
        message: format!("Video {} deleted.", video_id),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_title_defaults_to_a_template_embedding_the_id() {
        let title = resolve_title(None, "ABC123").unwrap();
        assert_eq!(title, "Google Drive Video ABC123");
    }

    #[test]
    fn blank_title_is_a_validation_error() {
        let err = resolve_title(Some("   ".to_string()), "ABC123").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn overlong_title_is_a_validation_error() {
        let err = resolve_title(Some("x".repeat(151)), "ABC123").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn title_at_the_limit_passes() {
        let title = resolve_title(Some("x".repeat(150)), "ABC123").unwrap();
        assert_eq!(title.chars().count(), 150);
    }

    #[test]
    fn overlong_description_is_a_validation_error() {
        let description = Some("x".repeat(5001));
        assert!(matches!(
            validate_description(&description),
            Err(AppError::Validation(_))
        ));
        assert!(validate_description(&Some("short".to_string())).is_ok());
        assert!(validate_description(&None).is_ok());
    }
}

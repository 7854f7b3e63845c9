use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;

use crate::drive;
use crate::errors::AppError;
use crate::utils::{timeout_query, QUERY_TIMEOUT};

pub const DEFAULT_DESCRIPTION: &str = "No description provided.";

/// A cataloged video. The Drive file id doubles as the primary key, so
/// `id == google_drive_file_id` always holds.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    pub google_drive_file_id: String,
    pub title: String,
    pub description: String,
    pub thumbnail_url: String,
    pub original_link: String,
    pub created_at: DateTime<Utc>,
}

/// Fields the add workflow supplies; `created_at` is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub google_drive_file_id: String,
    pub title: String,
    pub description: String,
    pub thumbnail_url: String,
    pub original_link: String,
}

/// The `createdAt` encodings found in stored documents. New writes are always
/// RFC 3339 strings; older documents carry a `{seconds, nanoseconds}` pair or
/// a raw epoch-milliseconds number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredTimestamp {
    Text(String),
    SecondsNanos {
        seconds: i64,
        #[serde(default)]
        nanoseconds: u32,
    },
    EpochMillis(i64),
}

impl StoredTimestamp {
    /// Normalize to the canonical timestamp. A missing or unparseable value
    /// maps to "now" so one bad document never fails the whole listing.
    fn normalize(value: Option<Self>) -> DateTime<Utc> {
        match value {
            Some(StoredTimestamp::Text(raw)) => raw
                .parse::<DateTime<Utc>>()
                .unwrap_or_else(|_| Utc::now()),
            Some(StoredTimestamp::SecondsNanos {
                seconds,
                nanoseconds,
            }) => Utc
                .timestamp_opt(seconds, nanoseconds)
                .single()
                .unwrap_or_else(Utc::now),
            Some(StoredTimestamp::EpochMillis(millis)) => Utc
                .timestamp_millis_opt(millis)
                .single()
                .unwrap_or_else(Utc::now),
            None => Utc::now(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredVideoDoc {
    #[serde(default)]
    google_drive_file_id: Option<String>,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    thumbnail_url: Option<String>,
    #[serde(default)]
    original_link: Option<String>,
    #[serde(default)]
    created_at: Option<StoredTimestamp>,
}

/// Decode one stored document into the canonical record shape. The row key
/// wins over whatever `id` the document itself may carry.
fn decode_video(id: String, doc: Value) -> Result<Video, serde_json::Error> {
    let doc: StoredVideoDoc = serde_json::from_value(doc)?;

    let google_drive_file_id = doc.google_drive_file_id.unwrap_or_else(|| id.clone());
    let thumbnail_url = doc
        .thumbnail_url
        .unwrap_or_else(|| drive::thumbnail_url(&google_drive_file_id));

    Ok(Video {
        id,
        original_link: doc.original_link.unwrap_or_default(),
        title: doc.title,
        description: doc
            .description
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
        thumbnail_url,
        created_at: StoredTimestamp::normalize(doc.created_at),
        google_drive_file_id,
    })
}

/// Newest first; the stable sort keeps insertion order for equal timestamps.
fn sort_newest_first(videos: &mut [Video]) {
    videos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[derive(Clone, Debug)]
pub struct VideoStore {
    db: PgPool,
}

impl VideoStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Pre-insert duplicate gate. Not atomic with the following `create`:
    /// two concurrent submissions of the same link can both pass this check.
    #[tracing::instrument(name = "Check video exists", skip(self))]
    pub async fn exists(&self, file_id: &str) -> Result<bool, AppError> {
        let found = timeout_query(
            QUERY_TIMEOUT,
            sqlx::query_scalar::<_, bool>(r#"SELECT EXISTS(SELECT 1 FROM videos WHERE id = $1)"#)
                .bind(file_id)
                .fetch_one(&self.db),
        )
        .await?;

        Ok(found)
    }

    #[tracing::instrument(name = "Create video", skip(self, new_video), fields(file_id = %new_video.google_drive_file_id))]
    pub async fn create(&self, new_video: NewVideo) -> Result<Video, AppError> {
        let video = Video {
            id: new_video.google_drive_file_id.clone(),
            google_drive_file_id: new_video.google_drive_file_id,
            title: new_video.title,
            description: new_video.description,
            thumbnail_url: new_video.thumbnail_url,
            original_link: new_video.original_link,
            created_at: Utc::now(),
        };

        let doc = serde_json::to_value(&video).map_err(|e| {
            AppError::Unexpected(anyhow::Error::new(e).context("Failed to encode video document"))
        })?;

        timeout_query(
            QUERY_TIMEOUT,
            sqlx::query(r#"INSERT INTO videos (id, doc) VALUES ($1, $2)"#)
                .bind(&video.id)
                .bind(&doc)
                .execute(&self.db),
        )
        .await?;

        tracing::debug!("Stored video document {}", video.id);
        Ok(video)
    }

    /// Full catalog scan, every document normalized to the canonical
    /// timestamp, sorted by `created_at` descending. A document that cannot
    /// be decoded at all is skipped with a warning rather than failing the
    /// listing.
    #[tracing::instrument(name = "List all videos", skip(self))]
    pub async fn list_all(&self) -> Result<Vec<Video>, AppError> {
        let rows = timeout_query(
            QUERY_TIMEOUT,
            sqlx::query_as::<_, (String, Value)>(
                r#"SELECT id, doc FROM videos ORDER BY seq ASC"#,
            )
            .fetch_all(&self.db),
        )
        .await?;

        let mut videos: Vec<Video> = rows
            .into_iter()
            .filter_map(|(id, doc)| match decode_video(id.clone(), doc) {
                Ok(video) => Some(video),
                Err(e) => {
                    tracing::warn!("Skipping undecodable video document {}: {}", id, e);
                    None
                }
            })
            .collect();

        sort_newest_first(&mut videos);

        tracing::debug!("Fetched {} videos from the catalog", videos.len());
        Ok(videos)
    }

    #[tracing::instrument(name = "Get video by id", skip(self))]
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Video>, AppError> {
        let row = timeout_query(
            QUERY_TIMEOUT,
            sqlx::query_as::<_, (String, Value)>(r#"SELECT id, doc FROM videos WHERE id = $1"#)
                .bind(id)
                .fetch_optional(&self.db),
        )
        .await?;

        match row {
            Some((id, doc)) => {
                let video = decode_video(id, doc).map_err(|e| {
                    AppError::Unexpected(
                        anyhow::Error::new(e).context("Failed to decode video document"),
                    )
                })?;
                Ok(Some(video))
            }
            None => Ok(None),
        }
    }

    /// Permanent removal. Deleting an id that is not cataloged is not an
    /// error.
    #[tracing::instrument(name = "Delete video by id", skip(self))]
    pub async fn delete_by_id(&self, id: &str) -> Result<(), AppError> {
        let result = timeout_query(
            QUERY_TIMEOUT,
            sqlx::query(r#"DELETE FROM videos WHERE id = $1"#)
                .bind(id)
                .execute(&self.db),
        )
        .await?;

        if result.rows_affected() == 0 {
            tracing::debug!("Delete of {} affected no rows", id);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // The exists/create pair is read-then-write: concurrent submissions of
    // the same link can both pass `exists` and race on the insert. That gap
    // is a known limitation of the store contract, so nothing here asserts
    // transactional behavior around the duplicate check.

    use super::*;
    use serde_json::json;

    fn doc(created_at: Value) -> Value {
        json!({
            "googleDriveFileId": "ABC123",
            "title": "Cats at Night",
            "description": "A cat explores the city after dark.",
            "thumbnailUrl": "https://drive.google.com/thumbnail?id=ABC123",
            "originalLink": "https://drive.google.com/file/d/ABC123/view",
            "createdAt": created_at,
        })
    }

    #[test]
    fn decodes_rfc3339_timestamps() {
        let video = decode_video("ABC123".to_string(), doc(json!("2024-03-01T12:00:00Z"))).unwrap();
        assert_eq!(video.created_at, Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn decodes_seconds_nanoseconds_pairs() {
        let video = decode_video(
            "ABC123".to_string(),
            doc(json!({ "seconds": 1709294400, "nanoseconds": 0 })),
        )
        .unwrap();
        assert_eq!(video.created_at, Utc.timestamp_opt(1709294400, 0).unwrap());
    }

    #[test]
    fn pair_without_nanoseconds_defaults_to_zero() {
        let video =
            decode_video("ABC123".to_string(), doc(json!({ "seconds": 1709294400 }))).unwrap();
        assert_eq!(video.created_at, Utc.timestamp_opt(1709294400, 0).unwrap());
    }

    #[test]
    fn decodes_epoch_millisecond_numbers() {
        let video = decode_video("ABC123".to_string(), doc(json!(1709294400000i64))).unwrap();
        assert_eq!(video.created_at, Utc.timestamp_millis_opt(1709294400000).unwrap());
    }

    #[test]
    fn unparseable_timestamp_falls_back_to_now() {
        let before = Utc::now();
        let video = decode_video("ABC123".to_string(), doc(json!("definitely not a date"))).unwrap();
        let after = Utc::now();
        assert!(video.created_at >= before && video.created_at <= after);
    }

    #[test]
    fn missing_timestamp_falls_back_to_now() {
        let mut raw = doc(json!(null));
        raw.as_object_mut().unwrap().remove("createdAt");
        let before = Utc::now();
        let video = decode_video("ABC123".to_string(), raw).unwrap();
        let after = Utc::now();
        assert!(video.created_at >= before && video.created_at <= after);
    }

    #[test]
    fn row_key_wins_over_document_id() {
        let mut raw = doc(json!("2024-03-01T12:00:00Z"));
        raw.as_object_mut()
            .unwrap()
            .insert("id".to_string(), json!("stale-id"));
        let video = decode_video("ABC123".to_string(), raw).unwrap();
        assert_eq!(video.id, "ABC123");
    }

    #[test]
    fn missing_description_gets_the_placeholder() {
        let mut raw = doc(json!("2024-03-01T12:00:00Z"));
        raw.as_object_mut().unwrap().remove("description");
        let video = decode_video("ABC123".to_string(), raw).unwrap();
        assert_eq!(video.description, DEFAULT_DESCRIPTION);
    }

    #[test]
    fn missing_thumbnail_is_derived_from_the_file_id() {
        let mut raw = doc(json!("2024-03-01T12:00:00Z"));
        raw.as_object_mut().unwrap().remove("thumbnailUrl");
        let video = decode_video("ABC123".to_string(), raw).unwrap();
        assert_eq!(video.thumbnail_url, "https://drive.google.com/thumbnail?id=ABC123");
    }

    fn video(id: &str, created_at: DateTime<Utc>) -> Video {
        Video {
            id: id.to_string(),
            google_drive_file_id: id.to_string(),
            title: format!("Video {}", id),
            description: DEFAULT_DESCRIPTION.to_string(),
            thumbnail_url: drive::thumbnail_url(id),
            original_link: format!("https://drive.google.com/file/d/{}/view", id),
            created_at,
        }
    }

    #[test]
    fn sorts_newest_first() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap();

        let mut videos = vec![video("a", t1), video("b", t2), video("c", t0)];
        sort_newest_first(&mut videos);

        let order: Vec<&str> = videos.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }

    #[test]
    fn equal_timestamps_keep_insertion_order() {
        let t = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        let mut videos = vec![video("first", t), video("second", t), video("third", t)];
        sort_newest_first(&mut videos);

        let order: Vec<&str> = videos.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(order, vec!["first", "second", "third"]);
    }

    #[test]
    fn unparseable_timestamp_still_lands_in_a_sorted_listing() {
        let old = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();

        let decoded = decode_video("NEW999".to_string(), doc(json!("garbage"))).unwrap();
        let mut videos = vec![video("old", old), decoded];
        sort_newest_first(&mut videos);

        // The fallback timestamp is "now", so the bad record sorts first.
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].id, "NEW999");
        assert!(videos[0].created_at >= videos[1].created_at);
    }
}

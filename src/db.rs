use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// One document per video, keyed by the Google Drive file id. `seq` is the
/// server-assigned insertion order, used to break ties when sorting by the
/// document's own timestamp.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS videos (
    id  TEXT PRIMARY KEY,
    doc JSONB NOT NULL,
    seq BIGSERIAL
)
"#;

pub async fn init_db() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;

    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .context("Could not connect to the database")?;

    sqlx::query(SCHEMA)
        .execute(&db)
        .await
        .context("Could not initialize the videos table")?;

    Ok(db)
}

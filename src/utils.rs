use crate::errors::AppError;

/// Upper bound on any single catalog query.
pub const QUERY_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(10000);

pub async fn timeout_query<T, F>(duration: std::time::Duration, fut: F) -> Result<T, AppError>
where
    F: std::future::Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(Ok(res)) => Ok(res),
        Ok(Err(e)) => Err(AppError::from(e)),
        Err(_) => Err(AppError::Database(anyhow::anyhow!(
            "Query timeout after {:?}",
            duration
        ))),
    }
}

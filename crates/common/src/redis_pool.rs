use redis::Client;
use redis::aio::ConnectionManager;

use crate::error::AppError;

const SUPPORTED_SCHEMES: &[&str] = &["redis", "rediss", "redis+unix", "unix"];

/// Open a Redis client after checking the connection string's scheme.
///
/// Host, port, password and logical database are all carried by the URL,
/// e.g. `redis://:secret@cache:6379/2`.
pub fn open_client(redis_url: &str) -> Result<Client, AppError> {
    let scheme = redis_url
        .split_once("://")
        .map(|(scheme, _)| scheme.to_ascii_lowercase())
        .ok_or_else(|| AppError::Config(format!("'{}' is not a Redis URL", redis_url)))?;

    if !SUPPORTED_SCHEMES.contains(&scheme.as_str()) {
        return Err(AppError::Config(format!(
            "The connection string does not use the redis:// protocol (got {}://)",
            scheme
        )));
    }

    Ok(Client::open(redis_url)?)
}

/// Logical database index selected by the client's connection info.
pub fn db_index(client: &Client) -> i64 {
    client.get_connection_info().redis.db
}

/// Create a Redis connection manager for async request/response commands.
pub async fn create_redis_pool(client: &Client) -> Result<ConnectionManager, AppError> {
    let manager = ConnectionManager::new(client.clone()).await?;

    tracing::info!(db = db_index(client), "Connected to Redis");
    Ok(manager)
}

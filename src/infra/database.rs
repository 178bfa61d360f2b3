// Shared SQLite pool. Every store gets a clone and creates its own tables.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::path::Path;

/// Accepts a bare file path, a `sqlite:` URL, or an in-memory URL.
pub async fn connect(database_url: &str) -> anyhow::Result<Pool<Sqlite>> {
    let in_memory = database_url.contains(":memory:");

    // Make sure the file exists; sqlx won't create it without `mode=rwc`
    let path_str = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    let path_str = path_str.split('?').next().unwrap_or(path_str);
    if !in_memory && !Path::new(path_str).exists() {
        if let Some(parent) = Path::new(path_str).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::File::create(path_str)?;
    }

    let conn_str = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite://{}", database_url)
    };

    // An in-memory database lives per connection, so keep exactly one
    let mut options = SqlitePoolOptions::new();
    if in_memory {
        options = options.max_connections(1);
    }

    let pool = options.connect(&conn_str).await?;
    tracing::info!(database = %conn_str, "Connected to SQLite");
    Ok(pool)
}

/// Timestamps are stored as unix milliseconds so range queries compare numbers.
pub fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

#[cfg(test)]
pub async fn memory_pool() -> Pool<Sqlite> {
    connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite should always open")
}

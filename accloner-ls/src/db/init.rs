//! Database initialization functions

use crate::error::Result;
use sqlx::{Pool, Sqlite};
use tracing::info;

/// Initialize the catalog schema
///
/// Creates the `ac_models` table if it does not exist yet. Each row is one
/// air-conditioner model; the captured command catalog is stored as a JSON
/// document in the `commands` column. Safe to run on every startup.
pub async fn initialize_catalog(pool: &Pool<Sqlite>) -> Result<()> {
    info!("Initializing catalog schema");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ac_models (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            commands TEXT NOT NULL DEFAULT '[]',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_pool() -> Pool<Sqlite> {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_initialize_creates_table() {
        let pool = setup_pool().await;

        initialize_catalog(&pool).await.unwrap();

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='ac_models')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(exists);
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let pool = setup_pool().await;

        initialize_catalog(&pool).await.unwrap();

        sqlx::query("INSERT INTO ac_models (id, name) VALUES ('abc', 'tesla')")
            .execute(&pool)
            .await
            .unwrap();

        // Second run must not recreate the table or lose rows
        initialize_catalog(&pool).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ac_models")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}

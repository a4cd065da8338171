//! Catalog store
//!
//! SQLite-backed persistence for [`AcModel`] documents. Lookups distinguish
//! "not found" (`Ok(None)`) from store faults (`Err`), and model names are
//! normalized (trimmed, lowercase) before they touch the database.

use crate::db::init;
use crate::error::{Error, Result};
use accloner_common::catalog::{normalize_model_name, AcCommand, AcModel};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Handle to the catalog database
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct CatalogStore {
    pool: Pool<Sqlite>,
}

impl CatalogStore {
    /// Connects to the catalog database and bootstraps the schema
    pub async fn connect(database_url: &str) -> Result<Self> {
        // An in-memory sqlite database exists per connection, so the pool
        // must stay at a single connection for those URLs
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Some(Duration::from_secs(60)))
            .connect(database_url)
            .await?;

        init::initialize_catalog(&pool).await?;
        info!("Connected to catalog database: {}", database_url);

        Ok(Self { pool })
    }

    /// Looks up a model by its identifier
    ///
    /// A string that does not parse as a UUID is a fault, not a miss.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<AcModel>> {
        let model_id = Uuid::parse_str(id)
            .map_err(|e| Error::InvalidInput(format!("malformed model id '{}': {}", id, e)))?;

        let row: Option<(String, String, String)> =
            sqlx::query_as("SELECT id, name, commands FROM ac_models WHERE id = ?")
                .bind(model_id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        row.map(row_to_model).transpose()
    }

    /// Looks up a model by normalized name
    pub async fn find_by_name(&self, name: &str) -> Result<Option<AcModel>> {
        let row: Option<(String, String, String)> =
            sqlx::query_as("SELECT id, name, commands FROM ac_models WHERE name = ?")
                .bind(normalize_model_name(name))
                .fetch_optional(&self.pool)
                .await?;

        row.map(row_to_model).transpose()
    }

    /// Creates a new empty model under `name`
    ///
    /// The name is normalized first; a duplicate name surfaces as a
    /// database fault from the unique constraint.
    pub async fn create(&self, name: &str) -> Result<AcModel> {
        let model = AcModel::new(name);
        if model.name.is_empty() {
            return Err(Error::InvalidInput(
                "model name must not be empty".to_string(),
            ));
        }

        sqlx::query("INSERT INTO ac_models (id, name, commands) VALUES (?, ?, ?)")
            .bind(model.id.to_string())
            .bind(&model.name)
            .bind(serde_json::to_string(&model.commands)?)
            .execute(&self.pool)
            .await?;

        info!("Created model '{}' ({})", model.name, model.id);
        Ok(model)
    }

    /// Persists the full state of a model
    pub async fn save(&self, model: &AcModel) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ac_models (id, name, commands) VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                commands = excluded.commands,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(model.id.to_string())
        .bind(&model.name)
        .bind(serde_json::to_string(&model.commands)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Returns every model in the catalog, ordered by name
    pub async fn list_all(&self) -> Result<Vec<AcModel>> {
        let rows: Vec<(String, String, String)> =
            sqlx::query_as("SELECT id, name, commands FROM ac_models ORDER BY name")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(row_to_model).collect()
    }
}

fn row_to_model((id, name, commands): (String, String, String)) -> Result<AcModel> {
    let id = Uuid::parse_str(&id)
        .map_err(|e| Error::Internal(format!("corrupt model id in catalog: {}", e)))?;
    let commands: Vec<AcCommand> = serde_json::from_str(&commands)?;

    Ok(AcModel { id, name, commands })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_store() -> CatalogStore {
        CatalogStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_create_normalizes_and_finds() {
        let store = setup_store().await;

        let created = store.create("  Tesla ").await.unwrap();
        assert_eq!(created.name, "tesla");
        assert!(created.commands.is_empty());

        let by_name = store.find_by_name(" TESLA").await.unwrap().unwrap();
        assert_eq!(by_name.id, created.id);

        let by_id = store
            .find_by_id(&created.id.to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_id.name, "tesla");
    }

    #[tokio::test]
    async fn test_create_duplicate_name_is_fault() {
        let store = setup_store().await;

        store.create("tesla").await.unwrap();
        let result = store.create(" Tesla ").await;

        assert!(matches!(result, Err(Error::Database(_))));
    }

    #[tokio::test]
    async fn test_create_blank_name_rejected() {
        let store = setup_store().await;

        let result = store.create("   ").await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_find_unknown_is_none_not_error() {
        let store = setup_store().await;

        assert!(store.find_by_name("nonexistent").await.unwrap().is_none());
        assert!(store
            .find_by_id(&Uuid::new_v4().to_string())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_find_by_malformed_id_is_fault() {
        let store = setup_store().await;

        let result = store.find_by_id("not-a-uuid").await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_save_persists_captured_commands() {
        let store = setup_store().await;

        let mut model = store.create("tesla").await.unwrap();
        model.apply_capture(1, 21, "123123123");
        store.save(&model).await.unwrap();

        let reloaded = store.find_by_name("tesla").await.unwrap().unwrap();
        assert_eq!(reloaded.signal_for(1, 21), Some("123123123"));

        // Replacement of an existing pair survives a save round trip
        model.apply_capture(1, 21, "456456456");
        store.save(&model).await.unwrap();

        let reloaded = store.find_by_name("tesla").await.unwrap().unwrap();
        assert_eq!(reloaded.signal_for(1, 21), Some("456456456"));
        assert_eq!(reloaded.commands.len(), 1);
        assert_eq!(reloaded.commands[0].temperatures.len(), 1);
    }

    #[tokio::test]
    async fn test_list_all_ordered_by_name() {
        let store = setup_store().await;

        store.create("midea").await.unwrap();
        store.create("airton").await.unwrap();
        store.create("tesla").await.unwrap();

        let names: Vec<String> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["airton", "midea", "tesla"]);
    }
}

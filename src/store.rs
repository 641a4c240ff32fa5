use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::StoredEntry;

/// Key the serialized period entries live under.
pub const SAVED_DATA_KEY: &str = "savedData";

/// Whole-record persistence of a user's period entries. Records come back
/// undecoded so the loader can skip bad ones individually.
pub trait EntryStore: Clone + Send + Sync + 'static {
    fn load_all(&self, user_id: Uuid) -> impl Future<Output = Result<Vec<serde_json::Value>>> + Send;

    fn save_all(
        &self,
        user_id: Uuid,
        records: &[StoredEntry],
    ) -> impl Future<Output = Result<()>> + Send;
}

fn parse_record(raw: &str) -> Result<Vec<serde_json::Value>> {
    serde_json::from_str(raw).context("saved data is not a JSON array")
}

#[derive(Clone)]
pub struct PgEntryStore {
    pool: PgPool,
}

impl PgEntryStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("connecting to postgres")?;
        Ok(Self { pool })
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tracker_kv (
                user_id UUID NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (user_id, key)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("creating tracker_kv")?;
        Ok(())
    }
}

impl EntryStore for PgEntryStore {
    async fn load_all(&self, user_id: Uuid) -> Result<Vec<serde_json::Value>> {
        let raw: Option<String> =
            sqlx::query_scalar::<_, String>("SELECT value FROM tracker_kv WHERE user_id = $1 AND key = $2")
                .bind(user_id)
                .bind(SAVED_DATA_KEY)
                .fetch_optional(&self.pool)
                .await
                .context("loading saved data")?;

        match raw {
            Some(raw) => parse_record(&raw),
            None => Ok(Vec::new()),
        }
    }

    async fn save_all(&self, user_id: Uuid, records: &[StoredEntry]) -> Result<()> {
        let value = serde_json::to_string(records)?;
        sqlx::query(
            r#"
            INSERT INTO tracker_kv (user_id, key, value, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (user_id, key)
            DO UPDATE SET value = EXCLUDED.value, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(user_id)
        .bind(SAVED_DATA_KEY)
        .bind(value)
        .execute(&self.pool)
        .await
        .context("saving entries")?;
        Ok(())
    }
}

/// In-process store, used by tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<HashMap<Uuid, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces a user's raw record, bypassing encoding.
    pub async fn seed(&self, user_id: Uuid, raw: impl Into<String>) {
        self.records.lock().await.insert(user_id, raw.into());
    }

    pub async fn raw(&self, user_id: Uuid) -> Option<String> {
        self.records.lock().await.get(&user_id).cloned()
    }
}

impl EntryStore for MemoryStore {
    async fn load_all(&self, user_id: Uuid) -> Result<Vec<serde_json::Value>> {
        match self.records.lock().await.get(&user_id) {
            Some(raw) => parse_record(raw),
            None => Ok(Vec::new()),
        }
    }

    async fn save_all(&self, user_id: Uuid, records: &[StoredEntry]) -> Result<()> {
        let value = serde_json::to_string(records)?;
        self.records.lock().await.insert(user_id, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_overwrites_wholesale() -> Result<()> {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        assert!(store.load_all(user).await?.is_empty());

        let first = StoredEntry {
            date: Some("1704067200.0".into()),
            date_type: Some("period".into()),
            timeline: Some("Start".into()),
            flow_type: None,
        };
        store.save_all(user, &[first.clone(), first.clone()]).await?;
        assert_eq!(store.load_all(user).await?.len(), 2);

        store.save_all(user, &[first]).await?;
        let loaded = store.load_all(user).await?;
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0]["timeline"], "Start");
        assert!(loaded[0].get("flowType").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_record_fails_loudly() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        store.seed(user, "{not json").await;
        assert!(store.load_all(user).await.is_err());
    }
}

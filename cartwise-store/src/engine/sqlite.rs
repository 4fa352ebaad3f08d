//! SQLite primary engine.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument};

use super::{Collection, SCHEMA_VERSION, StorageEngine};
use crate::error::StoreError;

/// Schema steps, applied in order. Step `n` upgrades version `n - 1` to `n`.
const MIGRATIONS: &[(u32, &str)] = &[
    (
        1,
        "CREATE TABLE IF NOT EXISTS lists (key TEXT PRIMARY KEY, record TEXT NOT NULL);
         CREATE TABLE IF NOT EXISTS items (key TEXT PRIMARY KEY, record TEXT NOT NULL);
         CREATE TABLE IF NOT EXISTS product_stats (key TEXT PRIMARY KEY, record TEXT NOT NULL);
         CREATE TABLE IF NOT EXISTS settings (key TEXT PRIMARY KEY, record TEXT NOT NULL);",
    ),
    (
        2,
        "CREATE TABLE IF NOT EXISTS budgets (key TEXT PRIMARY KEY, record TEXT NOT NULL);",
    ),
];

/// Primary engine backed by a single SQLite database.
///
/// Each collection is a two-column table holding the JSON record under its
/// key. The connection is shared behind a mutex and every call runs on the
/// blocking thread pool.
#[derive(Clone)]
pub struct SqliteEngine {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteEngine").finish_non_exhaustive()
    }
}

impl SqliteEngine {
    /// Opens (or creates) a database file and upgrades it to the newest schema.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened or its schema is newer
    /// than [`SCHEMA_VERSION`].
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        Self::open_with_version(path, SCHEMA_VERSION).await
    }

    /// Opens a database file, upgrading it no further than `target`.
    ///
    /// Creating a database at an older version is how upgrade paths are
    /// exercised; normal callers use [`SqliteEngine::open`].
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened or migrated.
    pub async fn open_with_version(path: &Path, target: u32) -> Result<Self, StoreError> {
        let path = path.to_path_buf();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, StoreError> {
            info!(path = %path.display(), "Opening SQLite database");
            let mut conn = Connection::open(&path)?;
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            migrate(&mut conn, target)?;
            Ok(conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Creates an in-memory database at the newest schema.
    ///
    /// # Errors
    ///
    /// Returns error if SQLite cannot allocate the database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let mut conn = Connection::open_in_memory()?;
        migrate(&mut conn, SCHEMA_VERSION)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `op` against the connection on the blocking pool.
    async fn run<F, R>(&self, op: F) -> Result<R, StoreError>
    where
        F: FnOnce(&Connection) -> Result<R, StoreError> + Send + 'static,
        R: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Task("connection lock poisoned".to_string()))?;
            op(&guard)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

/// Reads `PRAGMA user_version`.
fn user_version(conn: &Connection) -> Result<u32, StoreError> {
    let version: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    Ok(version)
}

/// Applies every migration step above the current version, up to `target`.
fn migrate(conn: &mut Connection, target: u32) -> Result<u32, StoreError> {
    let current = user_version(conn)?;
    if current > SCHEMA_VERSION {
        return Err(StoreError::UnsupportedSchema {
            found: current,
            supported: SCHEMA_VERSION,
        });
    }

    for (version, sql) in MIGRATIONS {
        if *version <= current || *version > target {
            continue;
        }
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
        info!(from = version - 1, to = version, "Upgraded database schema");
    }

    user_version(conn)
}

fn decode(raw: &str) -> Result<Value, StoreError> {
    Ok(serde_json::from_str(raw)?)
}

#[async_trait]
impl StorageEngine for SqliteEngine {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    #[instrument(level = "trace", skip(self))]
    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>, StoreError> {
        let key = key.to_string();
        self.run(move |conn| {
            let sql = format!("SELECT record FROM {} WHERE key = ?1", collection.table());
            let raw: Option<String> = conn
                .query_row(&sql, params![key], |row| row.get(0))
                .optional()?;
            raw.as_deref().map(decode).transpose()
        })
        .await
    }

    #[instrument(level = "trace", skip(self))]
    async fn get_all(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        self.run(move |conn| {
            let sql = format!("SELECT record FROM {} ORDER BY rowid", collection.table());
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let mut records = Vec::new();
            for raw in rows {
                records.push(decode(&raw?)?);
            }
            debug!(collection = %collection, count = records.len(), "Loaded collection");
            Ok(records)
        })
        .await
    }

    #[instrument(level = "trace", skip(self, record))]
    async fn put(
        &self,
        collection: Collection,
        key: &str,
        record: &Value,
    ) -> Result<(), StoreError> {
        let key = key.to_string();
        let raw = serde_json::to_string(record)?;
        self.run(move |conn| {
            let sql = format!(
                "INSERT INTO {} (key, record) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET record = excluded.record",
                collection.table()
            );
            conn.execute(&sql, params![key, raw])?;
            Ok(())
        })
        .await
    }

    #[instrument(level = "trace", skip(self))]
    async fn delete(&self, collection: Collection, key: &str) -> Result<bool, StoreError> {
        let key = key.to_string();
        self.run(move |conn| {
            let sql = format!("DELETE FROM {} WHERE key = ?1", collection.table());
            let removed = conn.execute(&sql, params![key])?;
            Ok(removed > 0)
        })
        .await
    }

    async fn schema_version(&self) -> Result<u32, StoreError> {
        self.run(user_version).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_get_delete() {
        let engine = SqliteEngine::open_in_memory().unwrap();
        let record = json!({ "id": "a", "name": "Milk" });

        engine.put(Collection::Items, "a", &record).await.unwrap();
        assert_eq!(engine.get(Collection::Items, "a").await.unwrap(), Some(record));

        assert!(engine.delete(Collection::Items, "a").await.unwrap());
        assert!(!engine.delete(Collection::Items, "a").await.unwrap());
        assert_eq!(engine.get(Collection::Items, "a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_replaces_existing() {
        let engine = SqliteEngine::open_in_memory().unwrap();
        engine
            .put(Collection::Lists, "l", &json!({ "v": 1 }))
            .await
            .unwrap();
        engine
            .put(Collection::Lists, "l", &json!({ "v": 2 }))
            .await
            .unwrap();

        let all = engine.get_all(Collection::Lists).await.unwrap();
        assert_eq!(all, vec![json!({ "v": 2 })]);
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let engine = SqliteEngine::open_in_memory().unwrap();
        engine
            .put(Collection::Lists, "x", &json!({ "kind": "list" }))
            .await
            .unwrap();
        assert!(engine.get(Collection::Items, "x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_in_memory_is_current_version() {
        let engine = SqliteEngine::open_in_memory().unwrap();
        assert_eq!(engine.schema_version().await.unwrap(), SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn test_version_one_has_no_budgets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v1.db");

        let engine = SqliteEngine::open_with_version(&path, 1).await.unwrap();
        assert_eq!(engine.schema_version().await.unwrap(), 1);
        assert!(engine.get_all(Collection::Budgets).await.is_err());
    }

    #[tokio::test]
    async fn test_upgrade_from_version_one_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upgrade.db");

        {
            let v1 = SqliteEngine::open_with_version(&path, 1).await.unwrap();
            v1.put(Collection::Lists, "l1", &json!({ "name": "Old" }))
                .await
                .unwrap();
        }

        let v2 = SqliteEngine::open(&path).await.unwrap();
        assert_eq!(v2.schema_version().await.unwrap(), 2);
        assert_eq!(
            v2.get(Collection::Lists, "l1").await.unwrap(),
            Some(json!({ "name": "Old" }))
        );
        assert!(v2.get_all(Collection::Budgets).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_newer_schema_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1)
                .unwrap();
        }

        let result = SqliteEngine::open(&path).await;
        assert!(matches!(result, Err(StoreError::UnsupportedSchema { .. })));
    }
}

// ABOUTME: SQLite datastore storing each record as a JSON document keyed by primary key
// ABOUTME: Creates one table per registered record type and maps key conflicts to RecordExist

use super::{prepare_write, primary_key_of, DataStore, ListOptions, StoreError};
use crate::model::{Document, Entity, TableRegistry};
use crate::utils::validate_table_name;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{ffi, params, Connection};
use std::sync::{Mutex, MutexGuard};

const BACKEND: &str = "sqlite";

/// Datastore backed by a single SQLite database file
///
/// Statements run synchronously on the calling task; the engine issues one
/// call at a time so the connection lock is never contended.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file and make sure every record table exists
    ///
    /// `location` may be a plain path, a `sqlite://` URL or `:memory:`.
    pub fn open(location: &str, registry: &TableRegistry) -> Result<Self> {
        let path = location.strip_prefix("sqlite://").unwrap_or(location);
        if path.is_empty() {
            anyhow::bail!("SQLite datastore requires a file path in 'url' or 'database'");
        }

        tracing::debug!("Opening SQLite database at {}", path);
        let conn = if path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .with_context(|| format!("Failed to open SQLite database '{}'", path))?;

        Self::from_connection(conn, registry)
    }

    pub fn open_in_memory(registry: &TableRegistry) -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory SQLite")?;
        Self::from_connection(conn, registry)
    }

    fn from_connection(conn: Connection, registry: &TableRegistry) -> Result<Self> {
        for table in registry.iter() {
            let name = table.table_name();
            validate_table_name(name)?;
            conn.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS \"{}\" (id TEXT PRIMARY KEY NOT NULL, data TEXT NOT NULL)",
                    name
                ),
                [],
            )
            .with_context(|| format!("Failed to create SQLite table '{}'", name))?;
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::backend(BACKEND, "connection lock poisoned"))
    }

    fn with_conn<T>(
        &self,
        operation: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StoreError> {
        let conn = self.lock()?;
        operation(&conn).map_err(|e| StoreError::backend(BACKEND, e))
    }
}

/// Only a primary key collision on insert means the row already exists;
/// CHECK, NOT NULL, other UNIQUE and trigger failures stay backend errors.
fn map_insert_error(err: rusqlite::Error) -> StoreError {
    let duplicate_key = matches!(
        &err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    );
    if duplicate_key {
        StoreError::RecordExist
    } else {
        StoreError::backend(BACKEND, err)
    }
}

fn checked_table(entity: &dyn Entity) -> Result<&'static str, StoreError> {
    let name = entity.table_name();
    validate_table_name(name).map_err(|e| StoreError::backend(BACKEND, e.to_string()))?;
    Ok(name)
}

#[async_trait]
impl DataStore for SqliteStore {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn list(
        &self,
        table: &dyn Entity,
        options: Option<&ListOptions>,
    ) -> Result<Vec<Box<dyn Entity>>, StoreError> {
        let name = checked_table(table)?;
        // LIMIT -1 means no limit in SQLite
        let (offset, limit) = match options.and_then(ListOptions::signed_window) {
            Some((offset, limit)) => (offset, limit),
            None => (0, -1),
        };

        let raw: Vec<String> = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT data FROM \"{}\" ORDER BY id LIMIT ?1 OFFSET ?2",
                name
            ))?;
            let rows = stmt.query_map(params![limit, offset], |row| row.get::<_, String>(0))?;
            rows.collect()
        })?;

        raw.into_iter()
            .map(|data| -> Result<Box<dyn Entity>, StoreError> {
                let document: Document = serde_json::from_str(&data)
                    .map_err(|e| StoreError::backend(BACKEND, e))?;
                Ok(table.from_document(document)?)
            })
            .collect()
    }

    async fn add(&self, entity: &dyn Entity) -> Result<(), StoreError> {
        let name = checked_table(entity)?;
        let (key, document) = prepare_write(entity, true)?;
        let data = serde_json::to_string(&document).map_err(|e| StoreError::backend(BACKEND, e))?;

        self.lock()?
            .execute(
                &format!("INSERT INTO \"{}\" (id, data) VALUES (?1, ?2)", name),
                params![key, data],
            )
            .map_err(map_insert_error)?;
        Ok(())
    }

    async fn put(&self, entity: &dyn Entity) -> Result<(), StoreError> {
        let name = checked_table(entity)?;
        let (key, document) = prepare_write(entity, false)?;
        let data = serde_json::to_string(&document).map_err(|e| StoreError::backend(BACKEND, e))?;

        self.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO \"{}\" (id, data) VALUES (?1, ?2) \
                     ON CONFLICT(id) DO UPDATE SET data = excluded.data",
                    name
                ),
                params![key, data],
            )
        })?;
        Ok(())
    }

    async fn delete(&self, entity: &dyn Entity) -> Result<(), StoreError> {
        let name = checked_table(entity)?;
        let key = primary_key_of(entity)?;

        let deleted = self.with_conn(|conn| {
            conn.execute(
                &format!("DELETE FROM \"{}\" WHERE id = ?1", name),
                params![key],
            )
        })?;
        if deleted == 0 {
            return Err(StoreError::RecordNotExist);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MigrationError;
    use crate::migration::{migrate, select_tables, DuplicatePolicy};
    use crate::model::{default_registry, Application, Project};
    use tempfile::tempdir;

    fn project(name: &str, owner: &str) -> Project {
        Project {
            name: name.to_string(),
            owner: owner.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_duplicate_key_is_record_exist() {
        let store = SqliteStore::open_in_memory(&default_registry()).unwrap();
        store.add(&project("default", "admin")).await.unwrap();

        let err = store.add(&project("default", "other")).await.unwrap_err();
        assert!(err.is_record_exist(), "unexpected error: {:?}", err);
    }

    fn check_constrained_store() -> SqliteStore {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE \"vela_application\" \
             (id TEXT PRIMARY KEY NOT NULL, data TEXT NOT NULL CHECK(length(data) < 10))",
            [],
        )
        .unwrap();
        SqliteStore::from_connection(conn, &default_registry()).unwrap()
    }

    #[tokio::test]
    async fn test_other_constraint_failure_is_backend_error() {
        let store = check_constrained_store();
        let app = Application {
            name: "app1".to_string(),
            description: "too long for the check".to_string(),
            ..Default::default()
        };

        let err = store.add(&app).await.unwrap_err();
        assert!(!err.is_record_exist());
        assert!(matches!(err, StoreError::Backend { backend: "sqlite", .. }));

        let err = store.put(&app).await.unwrap_err();
        assert!(matches!(err, StoreError::Backend { .. }));
    }

    #[tokio::test]
    async fn test_skip_migration_surfaces_constraint_failure() {
        let source = crate::datastore::MemoryStore::new();
        source
            .add(&Application {
                name: "app1".to_string(),
                description: "newApp".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let target = check_constrained_store();
        let tables = select_tables(&default_registry(), &["vela_application".to_string()]);

        let err = migrate(&source, &target, DuplicatePolicy::Skip, &tables)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MigrationError::TargetWrite {
                table: "vela_application",
                ..
            }
        ));
        assert!(target
            .list(&Application::default(), None)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_put_upserts() {
        let store = SqliteStore::open_in_memory(&default_registry()).unwrap();
        store.put(&project("p1", "alice")).await.unwrap();
        store.put(&project("p1", "bob")).await.unwrap();

        let rows = store.list(&Project::default(), None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].downcast_ref::<Project>().unwrap().owner, "bob");
    }

    #[tokio::test]
    async fn test_delete_reports_missing_row() {
        let store = SqliteStore::open_in_memory(&default_registry()).unwrap();
        store.add(&project("p1", "alice")).await.unwrap();

        store.delete(&project("p1", "")).await.unwrap();
        let err = store.delete(&project("p1", "")).await.unwrap_err();
        assert!(matches!(err, StoreError::RecordNotExist));
    }

    #[tokio::test]
    async fn test_rows_persist_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vela.db");
        let location = format!("sqlite://{}", path.display());

        {
            let store = SqliteStore::open(&location, &default_registry()).unwrap();
            store
                .add(&Application {
                    name: "app1".to_string(),
                    ..Default::default()
                })
                .await
                .unwrap();
        }

        let store = SqliteStore::open(&location, &default_registry()).unwrap();
        let rows = store.list(&Application::default(), None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].primary_key(), "app1");
    }

    #[tokio::test]
    async fn test_paged_list_orders_by_key() {
        let store = SqliteStore::open_in_memory(&default_registry()).unwrap();
        for name in ["b", "d", "a", "c"] {
            store.add(&project(name, "")).await.unwrap();
        }

        let page = store
            .list(&Project::default(), Some(&ListOptions::page(2, 2)))
            .await
            .unwrap();
        let keys: Vec<String> = page.iter().map(|row| row.primary_key()).collect();
        assert_eq!(keys, vec!["c", "d"]);
    }

    #[test]
    fn test_open_requires_location() {
        assert!(SqliteStore::open("", &default_registry()).is_err());
    }
}

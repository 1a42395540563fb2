// ABOUTME: Datastore contract the migration engine drives, plus backend construction
// ABOUTME: Exposes list/add/put/delete over tables and a factory keyed by backend type

pub mod memory;
pub mod mongodb;
pub mod postgres;
pub mod sqlite;

pub use self::memory::MemoryStore;
pub use self::mongodb::MongoStore;
pub use self::postgres::PostgresStore;
pub use self::sqlite::SqliteStore;

use crate::model::{self, Document, Entity, ModelError, TableRegistry};
use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use thiserror::Error;

/// Failure reported by a datastore adapter
///
/// `RecordExist` is the one condition the migrator treats as recoverable, so
/// every adapter must report a primary key conflict on `add` with it rather
/// than a generic backend error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record already exists")]
    RecordExist,
    #[error("record does not exist")]
    RecordNotExist,
    #[error("`{table}` record has an empty primary key")]
    PrimaryKeyEmpty { table: &'static str },
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("{backend} operation failed")]
    Backend {
        backend: &'static str,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl StoreError {
    pub fn backend(
        backend: &'static str,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        StoreError::Backend {
            backend,
            source: source.into(),
        }
    }

    /// True when the failure means the primary key is already taken
    pub fn is_record_exist(&self) -> bool {
        matches!(self, StoreError::RecordExist)
    }
}

/// Paging for `list`; rows always come back ordered by primary key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// 1-based page number
    pub page: usize,
    /// Rows per page, 0 disables paging
    pub page_size: usize,
}

impl ListOptions {
    pub fn page(page: usize, page_size: usize) -> Self {
        Self { page, page_size }
    }

    /// Offset and limit to apply, or None when every row is wanted
    pub fn window(&self) -> Option<(usize, usize)> {
        if self.page_size == 0 {
            return None;
        }
        let page = self.page.max(1);
        Some(((page - 1).saturating_mul(self.page_size), self.page_size))
    }

    /// [`window`](Self::window) clamped to the signed range database drivers take
    pub(crate) fn signed_window(&self) -> Option<(i64, i64)> {
        let clamp = |value: usize| i64::try_from(value).unwrap_or(i64::MAX);
        self.window()
            .map(|(offset, limit)| (clamp(offset), clamp(limit)))
    }
}

/// Keyed record store the migrator reads from and writes to
///
/// Every call is awaited before the next one is issued; adapters do not need
/// to support concurrent use by the engine.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Short backend name used in logs and errors
    fn backend(&self) -> &'static str;

    /// List the rows of the table `table` belongs to
    async fn list(
        &self,
        table: &dyn Entity,
        options: Option<&ListOptions>,
    ) -> Result<Vec<Box<dyn Entity>>, StoreError>;

    /// Insert a record, failing with [`StoreError::RecordExist`] if its key is taken
    async fn add(&self, entity: &dyn Entity) -> Result<(), StoreError>;

    /// Create or overwrite a record by primary key
    async fn put(&self, entity: &dyn Entity) -> Result<(), StoreError>;

    /// Remove a record by primary key
    async fn delete(&self, entity: &dyn Entity) -> Result<(), StoreError>;
}

/// Connection settings for one side of a migration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatastoreConfig {
    /// Backend type: memory, sqlite, mongodb or postgres
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub database: String,
}

/// Open the datastore described by `config`
///
/// SQL backends create one table per registered record type if it is missing.
///
/// # Errors
///
/// Returns an error if the backend type is unknown or the connection fails.
///
/// # Examples
///
/// ```no_run
/// # use vela_migrator::datastore::{connect, DatastoreConfig};
/// # use vela_migrator::model::default_registry;
/// # async fn example() -> anyhow::Result<()> {
/// let config = DatastoreConfig {
///     kind: "sqlite".to_string(),
///     url: "sqlite:///var/lib/vela/source.db".to_string(),
///     database: String::new(),
/// };
/// let store = connect(&config, &default_registry()).await?;
/// println!("Opened {} store", store.backend());
/// # Ok(())
/// # }
/// ```
pub async fn connect(
    config: &DatastoreConfig,
    registry: &TableRegistry,
) -> Result<Box<dyn DataStore>> {
    tracing::info!("Initialising the {} database", config.kind);

    let store: Box<dyn DataStore> = match config.kind.to_ascii_lowercase().as_str() {
        "memory" => Box::new(MemoryStore::new()),
        "sqlite" => {
            let location = if config.url.is_empty() {
                config.database.as_str()
            } else {
                config.url.as_str()
            };
            Box::new(SqliteStore::open(location, registry)?)
        }
        "mongodb" => Box::new(MongoStore::connect(&config.url, &config.database).await?),
        "postgres" | "postgresql" => {
            Box::new(PostgresStore::connect(&config.url, registry).await?)
        }
        "mysql" => bail!(
            "database type is invalid: 'mysql' is not supported, use postgres as the relational backend"
        ),
        other => bail!(
            "database type is invalid: '{}' (expected memory, sqlite, mongodb or postgres)",
            other
        ),
    };

    Ok(store)
}

/// Primary key and stamped document for a record about to be written
pub(crate) fn prepare_write(
    entity: &dyn Entity,
    created: bool,
) -> Result<(String, Document), StoreError> {
    let key = primary_key_of(entity)?;
    let mut document = entity.to_document()?;
    let now = Utc::now();
    if created {
        model::stamp_created(&mut document, now);
    } else {
        model::stamp_updated(&mut document, now);
    }
    Ok((key, document))
}

pub(crate) fn primary_key_of(entity: &dyn Entity) -> Result<String, StoreError> {
    let key = entity.primary_key();
    if key.is_empty() {
        return Err(StoreError::PrimaryKeyEmpty {
            table: entity.table_name(),
        });
    }
    Ok(key)
}

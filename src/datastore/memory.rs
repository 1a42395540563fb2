// ABOUTME: In-process datastore keeping documents in ordered maps
// ABOUTME: Used for dry runs and as the reference backend in tests

use super::{prepare_write, primary_key_of, DataStore, ListOptions, StoreError};
use crate::model::{Document, Entity};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

type Tables = BTreeMap<String, BTreeMap<String, Document>>;

/// Datastore holding every table in memory, ordered by primary key
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently stored for a table
    pub fn count(&self, table_name: &str) -> Result<usize, StoreError> {
        let tables = self.lock()?;
        Ok(tables.get(table_name).map_or(0, BTreeMap::len))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::backend("memory", "table lock poisoned"))
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn list(
        &self,
        table: &dyn Entity,
        options: Option<&ListOptions>,
    ) -> Result<Vec<Box<dyn Entity>>, StoreError> {
        let documents: Vec<Document> = {
            let tables = self.lock()?;
            let Some(rows) = tables.get(table.table_name()) else {
                return Ok(Vec::new());
            };
            match options.and_then(ListOptions::window) {
                Some((offset, limit)) => rows.values().skip(offset).take(limit).cloned().collect(),
                None => rows.values().cloned().collect(),
            }
        };

        documents
            .into_iter()
            .map(|document| table.from_document(document).map_err(StoreError::from))
            .collect()
    }

    async fn add(&self, entity: &dyn Entity) -> Result<(), StoreError> {
        let (key, document) = prepare_write(entity, true)?;
        let mut tables = self.lock()?;
        let rows = tables.entry(entity.table_name().to_string()).or_default();
        if rows.contains_key(&key) {
            return Err(StoreError::RecordExist);
        }
        rows.insert(key, document);
        Ok(())
    }

    async fn put(&self, entity: &dyn Entity) -> Result<(), StoreError> {
        let (key, document) = prepare_write(entity, false)?;
        let mut tables = self.lock()?;
        tables
            .entry(entity.table_name().to_string())
            .or_default()
            .insert(key, document);
        Ok(())
    }

    async fn delete(&self, entity: &dyn Entity) -> Result<(), StoreError> {
        let key = primary_key_of(entity)?;
        let mut tables = self.lock()?;
        let removed = tables
            .get_mut(entity.table_name())
            .and_then(|rows| rows.remove(&key));
        match removed {
            Some(_) => Ok(()),
            None => Err(StoreError::RecordNotExist),
        }
    }
}

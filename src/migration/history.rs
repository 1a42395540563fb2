// ABOUTME: Per-run record of every effect applied to the target store
// ABOUTME: Consumed by rollback to delete inserted rows and restore overwritten ones

use crate::model::Entity;
use std::collections::HashMap;

/// Effects of one migration run, grouped by table in the order they happened
#[derive(Debug, Default)]
pub struct History {
    inserted: HashMap<&'static str, Vec<Box<dyn Entity>>>,
    overwritten: HashMap<&'static str, Vec<Box<dyn Entity>>>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember a row that was newly added to the target
    pub fn record_insert(&mut self, entity: Box<dyn Entity>) {
        self.inserted
            .entry(entity.table_name())
            .or_default()
            .push(entity);
    }

    /// Remember a row that replaced an existing target row
    ///
    /// The snapshot is the value that was written, not the value it replaced.
    pub fn record_overwrite(&mut self, entity: Box<dyn Entity>) {
        self.overwritten
            .entry(entity.table_name())
            .or_default()
            .push(entity);
    }

    pub fn inserted(&self, table: &str) -> &[Box<dyn Entity>] {
        self.inserted.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn overwritten(&self, table: &str) -> &[Box<dyn Entity>] {
        self.overwritten.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.inserted.values().all(Vec::is_empty) && self.overwritten.values().all(Vec::is_empty)
    }
}

// ABOUTME: Registry of the tables known to the migrator
// ABOUTME: Maps table names to the prototype records adapters decode rows into

use super::records::{
    Application, ApplicationComponent, Cluster, Environment, Project, Target, User,
};
use super::{Entity, Model};
use std::sync::Arc;

/// Read-only mapping from table name to a prototype record
///
/// Built once before a run and handed to whatever needs it, in registration
/// order. Registering a second prototype under an existing table name replaces
/// the first one in place.
#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    tables: Vec<Arc<dyn Entity>>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a record type using its default value as the prototype
    pub fn register<T: Model + Default>(&mut self) -> &mut Self {
        self.register_prototype(Arc::new(T::default()))
    }

    pub fn register_prototype(&mut self, prototype: Arc<dyn Entity>) -> &mut Self {
        let name = prototype.table_name();
        match self.tables.iter_mut().find(|t| t.table_name() == name) {
            Some(existing) => *existing = prototype,
            None => self.tables.push(prototype),
        }
        self
    }

    pub fn get(&self, table_name: &str) -> Option<&Arc<dyn Entity>> {
        self.tables.iter().find(|t| t.table_name() == table_name)
    }

    pub fn contains(&self, table_name: &str) -> bool {
        self.get(table_name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Entity>> {
        self.tables.iter()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tables.iter().map(|t| t.table_name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Registry holding every platform record type
pub fn default_registry() -> TableRegistry {
    let mut registry = TableRegistry::new();
    registry
        .register::<Application>()
        .register::<ApplicationComponent>()
        .register::<Project>()
        .register::<Environment>()
        .register::<Target>()
        .register::<Cluster>()
        .register::<User>();
    registry
}

// ABOUTME: Shared helpers for integration tests
// ABOUTME: Fault-injecting datastore wrapper, fixed-row source and table snapshots

#![allow(dead_code)]

use async_trait::async_trait;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Mutex;
use vela_migrator::datastore::{DataStore, ListOptions, MemoryStore, StoreError};
use vela_migrator::model::{strip_volatile, Application, Document, Entity, ModelError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    List,
    Add,
    Put,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: Op,
    pub table: &'static str,
    pub key: Option<String>,
}

#[derive(Debug, Clone)]
struct Fault {
    op: Op,
    table: &'static str,
    key: Option<String>,
}

impl Fault {
    fn matches(&self, call: &Call) -> bool {
        self.op == call.op
            && self.table == call.table
            && (self.key.is_none() || self.key == call.key)
    }
}

/// Memory store that records every call and fails the ones it is told to
#[derive(Debug, Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    faults: Mutex<Vec<Fault>>,
    calls: Mutex<Vec<Call>>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail `op` on `table`, for every key or only for `key`
    pub fn fail_on(&self, op: Op, table: &'static str, key: Option<&str>) {
        self.faults.lock().unwrap().push(Fault {
            op,
            table,
            key: key.map(str::to_string),
        });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of add, put and delete calls received
    pub fn write_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.op != Op::List)
            .count()
    }

    pub fn count(&self, table: &str) -> Result<usize, StoreError> {
        self.inner.count(table)
    }

    fn check(&self, op: Op, table: &'static str, key: Option<String>) -> Result<(), StoreError> {
        let call = Call { op, table, key };
        let failing = self
            .faults
            .lock()
            .unwrap()
            .iter()
            .any(|fault| fault.matches(&call));
        self.calls.lock().unwrap().push(call);
        if failing {
            return Err(StoreError::backend("faulty", format!("injected {:?} failure", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl DataStore for FaultyStore {
    fn backend(&self) -> &'static str {
        "faulty"
    }

    async fn list(
        &self,
        table: &dyn Entity,
        options: Option<&ListOptions>,
    ) -> Result<Vec<Box<dyn Entity>>, StoreError> {
        self.check(Op::List, table.table_name(), None)?;
        self.inner.list(table, options).await
    }

    async fn add(&self, entity: &dyn Entity) -> Result<(), StoreError> {
        self.check(Op::Add, entity.table_name(), Some(entity.primary_key()))?;
        self.inner.add(entity).await
    }

    async fn put(&self, entity: &dyn Entity) -> Result<(), StoreError> {
        self.check(Op::Put, entity.table_name(), Some(entity.primary_key()))?;
        self.inner.put(entity).await
    }

    async fn delete(&self, entity: &dyn Entity) -> Result<(), StoreError> {
        self.check(Op::Delete, entity.table_name(), Some(entity.primary_key()))?;
        self.inner.delete(entity).await
    }
}

type RowFactory = Box<dyn Fn(&str) -> Vec<Box<dyn Entity>> + Send + Sync>;

/// Read-only source that lists whatever rows its factory builds
pub struct RowFactoryStore {
    rows: RowFactory,
}

impl RowFactoryStore {
    pub fn new(rows: impl Fn(&str) -> Vec<Box<dyn Entity>> + Send + Sync + 'static) -> Self {
        Self {
            rows: Box::new(rows),
        }
    }
}

#[async_trait]
impl DataStore for RowFactoryStore {
    fn backend(&self) -> &'static str {
        "factory"
    }

    async fn list(
        &self,
        table: &dyn Entity,
        _options: Option<&ListOptions>,
    ) -> Result<Vec<Box<dyn Entity>>, StoreError> {
        Ok((self.rows)(table.table_name()))
    }

    async fn add(&self, _entity: &dyn Entity) -> Result<(), StoreError> {
        Err(StoreError::backend("factory", "read-only store"))
    }

    async fn put(&self, _entity: &dyn Entity) -> Result<(), StoreError> {
        Err(StoreError::backend("factory", "read-only store"))
    }

    async fn delete(&self, _entity: &dyn Entity) -> Result<(), StoreError> {
        Err(StoreError::backend("factory", "read-only store"))
    }
}

/// Application row that cannot be encoded, so it cannot be cloned
#[derive(Debug)]
pub struct Unencodable {
    pub name: String,
}

impl Entity for Unencodable {
    fn table_name(&self) -> &'static str {
        "vela_application"
    }

    fn primary_key(&self) -> String {
        self.name.clone()
    }

    fn to_document(&self) -> Result<Document, ModelError> {
        Err(ModelError::NotAnObject {
            table: "vela_application",
        })
    }

    fn from_document(&self, _document: Document) -> Result<Box<dyn Entity>, ModelError> {
        Err(ModelError::NotAnObject {
            table: "vela_application",
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub fn app(name: &str, description: &str) -> Application {
    Application {
        name: name.to_string(),
        description: description.to_string(),
        ..Default::default()
    }
}

/// Rows of a table keyed by primary key, with timestamps removed
pub async fn snapshot(store: &dyn DataStore, table: &dyn Entity) -> BTreeMap<String, Document> {
    let rows = store.list(table, None).await.unwrap();
    rows.iter()
        .map(|row| {
            let mut document = row.to_document().unwrap();
            strip_volatile(&mut document);
            (row.primary_key(), document)
        })
        .collect()
}

pub async fn description_of(store: &dyn DataStore, name: &str) -> Option<String> {
    let rows = store.list(&Application::default(), None).await.unwrap();
    rows.iter()
        .filter_map(|row| row.downcast_ref::<Application>())
        .find(|a| a.name == name)
        .map(|a| a.description.clone())
}

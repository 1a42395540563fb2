// ABOUTME: Record model shared by the migration engine and every datastore adapter
// ABOUTME: Defines the Entity contract, the Model helper trait and timestamp stamping

pub mod records;
pub mod registry;

pub use records::{
    Application, ApplicationComponent, Cluster, ClusterTarget, Environment, Project, Target, User,
};
pub use registry::{default_registry, TableRegistry};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::any::Any;
use std::fmt;
use thiserror::Error;

/// Field-level representation of a record as stored by the adapters
pub type Document = serde_json::Map<String, JsonValue>;

/// Document field holding the creation timestamp
pub const CREATE_TIME_FIELD: &str = "createTime";
/// Document field holding the last update timestamp
pub const UPDATE_TIME_FIELD: &str = "updateTime";

/// Failure to move a record between its typed form and its document form
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to encode `{table}` record")]
    Encode {
        table: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("`{table}` record did not encode to an object")]
    NotAnObject { table: &'static str },
    #[error("failed to decode `{table}` record")]
    Decode {
        table: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// A single record belonging to exactly one table
///
/// The migrator never looks inside a record. It only needs the table the
/// record lives in, its primary key, and a way to turn it into a document and
/// back. A value registered in the [`TableRegistry`] doubles as the prototype
/// adapters use to materialise the rows they read.
pub trait Entity: fmt::Debug + Send + Sync + 'static {
    /// Stable name of the table this record belongs to
    fn table_name(&self) -> &'static str;

    /// Primary key value used for identity comparisons
    fn primary_key(&self) -> String;

    /// Encode the record as a document
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] if the record cannot be represented as a JSON object.
    fn to_document(&self) -> Result<Document, ModelError>;

    /// Build a new record of the same type as `self` from a document
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] if the document does not match the record shape.
    fn from_document(&self, document: Document) -> Result<Box<dyn Entity>, ModelError>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl dyn Entity {
    /// Borrow the concrete record behind a trait object
    pub fn downcast_ref<T: Entity>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Entity>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// Typed record backed by serde
///
/// Implementing `Model` is all a record type needs: the [`Entity`] contract is
/// provided by a blanket implementation that goes through `serde_json`.
pub trait Model: Serialize + DeserializeOwned + fmt::Debug + Send + Sync + 'static {
    /// Name of the table records of this type are stored in
    const TABLE_NAME: &'static str;

    /// Primary key derived from the record fields
    fn key(&self) -> String;
}

impl<T: Model> Entity for T {
    fn table_name(&self) -> &'static str {
        T::TABLE_NAME
    }

    fn primary_key(&self) -> String {
        self.key()
    }

    fn to_document(&self) -> Result<Document, ModelError> {
        let value = serde_json::to_value(self).map_err(|source| ModelError::Encode {
            table: T::TABLE_NAME,
            source,
        })?;
        match value {
            JsonValue::Object(document) => Ok(document),
            _ => Err(ModelError::NotAnObject {
                table: T::TABLE_NAME,
            }),
        }
    }

    fn from_document(&self, document: Document) -> Result<Box<dyn Entity>, ModelError> {
        let record: T =
            serde_json::from_value(JsonValue::Object(document)).map_err(|source| {
                ModelError::Decode {
                    table: T::TABLE_NAME,
                    source,
                }
            })?;
        Ok(Box::new(record))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Timestamps every stored record carries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BaseModel {
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

/// Stamp a document that is about to be created
pub fn stamp_created(document: &mut Document, now: DateTime<Utc>) {
    let stamp = JsonValue::String(now.to_rfc3339());
    document.insert(CREATE_TIME_FIELD.to_string(), stamp.clone());
    document.insert(UPDATE_TIME_FIELD.to_string(), stamp);
}

/// Stamp a document that is about to overwrite an existing row
pub fn stamp_updated(document: &mut Document, now: DateTime<Utc>) {
    document.insert(
        UPDATE_TIME_FIELD.to_string(),
        JsonValue::String(now.to_rfc3339()),
    );
}

/// Drop the timestamp fields, which differ between stores for the same record
pub fn strip_volatile(document: &mut Document) {
    document.remove(CREATE_TIME_FIELD);
    document.remove(UPDATE_TIME_FIELD);
}

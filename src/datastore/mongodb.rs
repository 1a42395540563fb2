// ABOUTME: MongoDB datastore keeping one collection per table with _id as primary key
// ABOUTME: Validates connection strings and maps duplicate key errors to RecordExist

use super::{prepare_write, primary_key_of, DataStore, ListOptions, StoreError};
use crate::model::{Document, Entity};
use ::mongodb::error::{ErrorKind, WriteFailure};
use ::mongodb::options::{ClientOptions, FindOptions, ReplaceOptions};
use ::mongodb::{Client, Collection, Database};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bson::doc;
use futures::stream::TryStreamExt;

const BACKEND: &str = "mongodb";
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Validate a MongoDB connection string
///
/// Only checks the scheme; the full parse happens when connecting.
///
/// # Examples
///
/// ```
/// # use vela_migrator::datastore::mongodb::validate_mongodb_url;
/// assert!(validate_mongodb_url("mongodb://localhost:27017/kubevela").is_ok());
/// assert!(validate_mongodb_url("mongodb+srv://cluster.example.net/kubevela").is_ok());
/// assert!(validate_mongodb_url("postgresql://localhost/db").is_err());
/// ```
pub fn validate_mongodb_url(connection_string: &str) -> Result<()> {
    if connection_string.is_empty() {
        bail!("MongoDB connection string cannot be empty");
    }

    if !connection_string.starts_with("mongodb://")
        && !connection_string.starts_with("mongodb+srv://")
    {
        bail!(
            "Invalid MongoDB connection string '{}'. \
             Must start with 'mongodb://' or 'mongodb+srv://'",
            crate::utils::sanitize_identifier(connection_string)
        );
    }

    Ok(())
}

/// Datastore backed by one MongoDB database
#[derive(Debug, Clone)]
pub struct MongoStore {
    database: Database,
}

impl MongoStore {
    /// Connect and ping the server
    ///
    /// When `database` is empty the database named in the connection string is
    /// used instead.
    pub async fn connect(connection_string: &str, database: &str) -> Result<Self> {
        validate_mongodb_url(connection_string)?;

        tracing::info!("Connecting to MongoDB database");

        let options = ClientOptions::parse(connection_string)
            .await
            .context("Failed to parse MongoDB connection options")?;

        let database_name = if database.is_empty() {
            match options.default_database.clone() {
                Some(name) => name,
                None => bail!(
                    "MongoDB database name is missing. \
                     Set 'database' in the config or include it in the connection string"
                ),
            }
        } else {
            database.to_string()
        };

        let client = Client::with_options(options).context("Failed to create MongoDB client")?;
        client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .context(
                "Failed to ping MongoDB server (connection may be invalid or server unreachable)",
            )?;

        tracing::debug!("Connected to MongoDB database '{}'", database_name);

        Ok(Self {
            database: client.database(&database_name),
        })
    }

    fn collection(&self, entity: &dyn Entity) -> Collection<bson::Document> {
        self.database.collection(entity.table_name())
    }
}

fn is_duplicate_key(err: &::mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY_CODE
        }
        ErrorKind::Command(command_error) => command_error.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}

fn to_bson(key: &str, document: &Document) -> Result<bson::Document, StoreError> {
    let mut encoded = bson::to_document(document).map_err(|e| StoreError::backend(BACKEND, e))?;
    encoded.insert("_id", key);
    Ok(encoded)
}

fn from_bson(mut encoded: bson::Document) -> Result<Document, StoreError> {
    encoded.remove("_id");
    bson::from_document(encoded).map_err(|e| StoreError::backend(BACKEND, e))
}

#[async_trait]
impl DataStore for MongoStore {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn list(
        &self,
        table: &dyn Entity,
        options: Option<&ListOptions>,
    ) -> Result<Vec<Box<dyn Entity>>, StoreError> {
        let mut find_options = FindOptions::default();
        find_options.sort = Some(doc! { "_id": 1 });
        if let Some((offset, limit)) = options.and_then(ListOptions::signed_window) {
            find_options.skip = Some(offset.unsigned_abs());
            find_options.limit = Some(limit);
        }

        let cursor = self
            .collection(table)
            .find(None, find_options)
            .await
            .map_err(|e| StoreError::backend(BACKEND, e))?;
        let encoded: Vec<bson::Document> = cursor
            .try_collect()
            .await
            .map_err(|e| StoreError::backend(BACKEND, e))?;

        let mut rows = Vec::with_capacity(encoded.len());
        for document in encoded {
            rows.push(table.from_document(from_bson(document)?)?);
        }
        Ok(rows)
    }

    async fn add(&self, entity: &dyn Entity) -> Result<(), StoreError> {
        let (key, document) = prepare_write(entity, true)?;
        let encoded = to_bson(&key, &document)?;

        match self.collection(entity).insert_one(encoded, None).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(StoreError::RecordExist),
            Err(e) => Err(StoreError::backend(BACKEND, e)),
        }
    }

    async fn put(&self, entity: &dyn Entity) -> Result<(), StoreError> {
        let (key, document) = prepare_write(entity, false)?;
        let encoded = to_bson(&key, &document)?;
        let options = ReplaceOptions::builder().upsert(true).build();

        self.collection(entity)
            .replace_one(doc! { "_id": key.as_str() }, encoded, options)
            .await
            .map_err(|e| StoreError::backend(BACKEND, e))?;
        Ok(())
    }

    async fn delete(&self, entity: &dyn Entity) -> Result<(), StoreError> {
        let key = primary_key_of(entity)?;

        let result = self
            .collection(entity)
            .delete_one(doc! { "_id": key.as_str() }, None)
            .await
            .map_err(|e| StoreError::backend(BACKEND, e))?;
        if result.deleted_count == 0 {
            return Err(StoreError::RecordNotExist);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Application, User};

    #[test]
    fn test_validate_rejects_other_schemes() {
        for url in [
            "",
            "postgresql://localhost/db",
            "mysql://localhost/db",
            "localhost:27017",
        ] {
            assert!(validate_mongodb_url(url).is_err(), "should reject {}", url);
        }
    }

    #[test]
    fn test_bson_encoding_round_trip_drops_id() {
        let app = Application {
            name: "app1".to_string(),
            description: "newApp".to_string(),
            ..Default::default()
        };
        let document = app.to_document().unwrap();

        let encoded = to_bson("app1", &document).unwrap();
        assert_eq!(encoded.get_str("_id").unwrap(), "app1");
        assert_eq!(encoded.get_str("description").unwrap(), "newApp");

        let decoded = from_bson(encoded).unwrap();
        assert!(!decoded.contains_key("_id"));
        assert_eq!(decoded, document);
    }

    // Requires a running MongoDB reachable through TEST_MONGODB_URL
    #[tokio::test]
    #[ignore]
    async fn test_mongodb_duplicate_detection() {
        let url = std::env::var("TEST_MONGODB_URL")
            .expect("TEST_MONGODB_URL must be set for MongoDB tests");
        let store = MongoStore::connect(&url, "vela_migrator_test").await.unwrap();

        let user = User {
            name: "dup-check".to_string(),
            ..Default::default()
        };
        let _ = store.delete(&user).await;
        store.add(&user).await.unwrap();
        assert!(store.add(&user).await.unwrap_err().is_record_exist());
        store.delete(&user).await.unwrap();
    }
}

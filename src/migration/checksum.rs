// ABOUTME: Data validation utilities using checksums
// ABOUTME: Computes and compares table checksums between source and target stores

use crate::datastore::DataStore;
use crate::model::{strip_volatile, Entity};
use anyhow::{Context, Result};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Result of a checksum comparison between source and target tables
#[derive(Debug, Clone, PartialEq)]
pub struct ChecksumResult {
    pub table: String,
    pub source_checksum: String,
    pub target_checksum: String,
    pub source_row_count: usize,
    pub target_row_count: usize,
    pub matches: bool,
}

impl ChecksumResult {
    /// Returns true if both checksums and row counts match
    pub fn is_valid(&self) -> bool {
        self.matches && self.source_row_count == self.target_row_count
    }
}

/// Compute checksum for a table
///
/// Hashes every row of the table with SHA-256 by:
/// 1. Listing all rows and ordering them by primary key
/// 2. Dropping the create/update timestamps, which each store sets on write
/// 3. Feeding the key and the canonical JSON of each row into the digest
///
/// An empty table yields the checksum `"empty"`.
pub async fn compute_table_checksum(
    store: &dyn DataStore,
    table: &dyn Entity,
) -> Result<(String, usize)> {
    let name = table.table_name();
    tracing::debug!("Computing checksum for {} on {}", name, store.backend());

    let rows = store
        .list(table, None)
        .await
        .with_context(|| format!("Failed to list rows of table {}", name))?;

    if rows.is_empty() {
        return Ok(("empty".to_string(), 0));
    }

    let mut keyed = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut document = row
            .to_document()
            .with_context(|| format!("Failed to encode row {} of {}", row.primary_key(), name))?;
        strip_volatile(&mut document);
        // Field order differs between backends; sort it for a canonical encoding
        let sorted: BTreeMap<&String, &JsonValue> = document.iter().collect();
        let encoded = serde_json::to_string(&sorted)
            .with_context(|| format!("Failed to encode row {} of {}", row.primary_key(), name))?;
        keyed.push((row.primary_key(), encoded));
    }
    keyed.sort_by(|a, b| a.0.cmp(&b.0));

    let mut hasher = Sha256::new();
    for (key, encoded) in &keyed {
        hasher.update(key.as_bytes());
        hasher.update(b"\n");
        hasher.update(encoded.as_bytes());
        hasher.update(b"\n");
    }
    let checksum = hex::encode(hasher.finalize());

    tracing::debug!("Checksum for {}: {} ({} rows)", name, checksum, keyed.len());

    Ok((checksum, keyed.len()))
}

/// Compare a table between source and target stores
pub async fn compare_tables(
    source: &dyn DataStore,
    target: &dyn DataStore,
    table: &dyn Entity,
) -> Result<ChecksumResult> {
    tracing::info!("Comparing table {}", table.table_name());

    let source_future = compute_table_checksum(source, table);
    let target_future = compute_table_checksum(target, table);

    let (source_result, target_result) = tokio::try_join!(source_future, target_future)?;

    let (source_checksum, source_row_count) = source_result;
    let (target_checksum, target_row_count) = target_result;

    let matches = source_checksum == target_checksum;

    Ok(ChecksumResult {
        table: table.table_name().to_string(),
        source_checksum,
        target_checksum,
        source_row_count,
        target_row_count,
        matches,
    })
}

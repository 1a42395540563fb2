// ABOUTME: Verify command implementation - Validate data integrity
// ABOUTME: Compares table checksums between source and target datastores

use crate::config::MigratorConfig;
use crate::datastore;
use crate::migration::{compare_tables, select_tables, ChecksumResult};
use crate::model::TableRegistry;
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};

/// Verify that the migrated tables match between source and target
///
/// Each selected table is checksummed on both sides (up to 4 tables at a
/// time) ignoring the create/update timestamps, which every store sets on
/// write.
///
/// # Errors
///
/// Returns an error if a datastore cannot be reached or any table differs.
///
/// # Examples
///
/// ```no_run
/// # use anyhow::Result;
/// # use std::path::Path;
/// # use vela_migrator::commands::verify;
/// # use vela_migrator::config::load_config;
/// # use vela_migrator::model::default_registry;
/// # async fn example() -> Result<()> {
/// let config = load_config(Path::new("migrator.yaml"))?;
/// verify(&config, &default_registry()).await?;
/// # Ok(())
/// # }
/// ```
pub async fn verify(config: &MigratorConfig, registry: &TableRegistry) -> Result<Vec<ChecksumResult>> {
    tracing::info!("Starting data integrity verification...");
    tracing::info!("");

    tracing::info!("Connecting to source datastore...");
    let source = datastore::connect(&config.source, registry)
        .await
        .context("Failed to connect to source datastore")?;

    tracing::info!("Connecting to target datastore...");
    let target = datastore::connect(&config.target, registry)
        .await
        .context("Failed to connect to target datastore")?;

    let tables = select_tables(registry, &config.tables);
    if tables.is_empty() {
        tracing::warn!("⚠ No tables found to verify");
        return Ok(Vec::new());
    }

    tracing::info!("Found {} tables to verify", tables.len());
    tracing::info!("");

    let source = &*source;
    let target = &*target;
    let verification_results: Vec<_> = stream::iter(tables.iter())
        .map(|table| async move {
            let result = compare_tables(source, target, table.as_ref()).await;
            (table.table_name(), result)
        })
        .buffer_unordered(4)
        .collect()
        .await;

    let mut results: Vec<ChecksumResult> = Vec::new();
    let mut mismatches = 0;
    let mut matches = 0;

    for (name, result) in verification_results {
        match result {
            Ok(checksum_result) => {
                if checksum_result.is_valid() {
                    tracing::info!(
                        "  ✓ {}: Match ({} rows, checksum: {})",
                        name,
                        checksum_result.source_row_count,
                        short(&checksum_result.source_checksum)
                    );
                    matches += 1;
                } else {
                    tracing::error!(
                        "  ✗ {}: MISMATCH: source={} ({}), target={} ({})",
                        name,
                        short(&checksum_result.source_checksum),
                        checksum_result.source_row_count,
                        short(&checksum_result.target_checksum),
                        checksum_result.target_row_count
                    );
                    mismatches += 1;
                }
                results.push(checksum_result);
            }
            Err(e) => {
                tracing::error!("  ✗ ERROR: {}: {:#}", name, e);
                mismatches += 1;
            }
        }
    }
    results.sort_by(|a, b| a.table.cmp(&b.table));

    tracing::info!("");
    tracing::info!("========================================");
    tracing::info!("Verification Summary");
    tracing::info!("========================================");
    tracing::info!("Total tables: {}", tables.len());
    tracing::info!("✓ Matches: {}", matches);
    tracing::info!("✗ Mismatches: {}", mismatches);
    tracing::info!("========================================");
    tracing::info!("");

    if mismatches > 0 {
        tracing::error!("⚠ DATA INTEGRITY ISSUES DETECTED!");
        tracing::error!("  {} table(s) have mismatched data", mismatches);
        tracing::info!("Possible causes:");
        tracing::info!("  - The migration skipped rows that already existed on the target");
        tracing::info!("  - Data was modified on either side after migration");
        anyhow::bail!("{} table(s) failed verification", mismatches);
    }

    tracing::info!("✓ ALL TABLES VERIFIED SUCCESSFULLY!");
    Ok(results)
}

fn short(checksum: &str) -> &str {
    checksum.get(..8).unwrap_or(checksum)
}

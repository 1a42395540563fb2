// ABOUTME: Pre-flight validation command for migration readiness
// ABOUTME: Checks the config, connectivity and row counts on both datastores

use crate::config::MigratorConfig;
use crate::datastore::{self, DataStore};
use crate::migration;
use crate::model::{Entity, TableRegistry};
use anyhow::{bail, Context, Result};

/// Row counts of one table on both sides
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCounts {
    pub table: String,
    pub source_rows: usize,
    pub target_rows: usize,
}

pub async fn validate(config: &MigratorConfig, registry: &TableRegistry) -> Result<Vec<TableCounts>> {
    tracing::info!("Starting validation...");

    tracing::info!("Checking configuration...");
    config.validate()?;
    tracing::info!(
        "✓ Configuration is valid (duplicate policy: {})",
        config.duplicate_policy()
    );

    tracing::info!("Connecting to source datastore...");
    let source = datastore::connect(&config.source, registry)
        .await
        .context("Failed to connect to source datastore")?;
    tracing::info!("✓ Connected to source");

    tracing::info!("Connecting to target datastore...");
    let target = datastore::connect(&config.target, registry)
        .await
        .context("Failed to connect to target datastore")?;
    tracing::info!("✓ Connected to target");

    let tables = migration::select_tables(registry, &config.tables);
    if tables.is_empty() {
        bail!(
            "None of the configured tables are known. Known tables: {}",
            registry.names().join(", ")
        );
    }

    tracing::info!("Counting rows in {} table(s)...", tables.len());
    let mut counts = Vec::with_capacity(tables.len());
    for table in &tables {
        let source_rows = count_rows(source.as_ref(), table.as_ref())
            .await
            .with_context(|| format!("Failed to read table {} from source", table.table_name()))?;
        let target_rows = count_rows(target.as_ref(), table.as_ref())
            .await
            .with_context(|| format!("Failed to read table {} from target", table.table_name()))?;

        if target_rows > 0 {
            tracing::warn!(
                "⚠ {}: {} row(s) to copy, target already holds {} row(s)",
                table.table_name(),
                source_rows,
                target_rows
            );
        } else {
            tracing::info!("  ✓ {}: {} row(s) to copy", table.table_name(), source_rows);
        }

        counts.push(TableCounts {
            table: table.table_name().to_string(),
            source_rows,
            target_rows,
        });
    }

    tracing::info!("✅ Validation complete - ready for migration");
    Ok(counts)
}

async fn count_rows(store: &dyn DataStore, table: &dyn Entity) -> Result<usize> {
    Ok(store.list(table, None).await?.len())
}

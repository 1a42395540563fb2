// ABOUTME: Migrate command implementation - copy records between datastores
// ABOUTME: Connects both sides, confirms the plan and runs the migration engine

use crate::config::MigratorConfig;
use crate::datastore;
use crate::error::MigrationError;
use crate::migration::{self, MigrationReport};
use crate::model::{Entity, TableRegistry};
use anyhow::{bail, Context, Result};
use dialoguer::{theme::ColorfulTheme, Confirm};
use std::sync::Arc;

/// Copy the configured tables from the source datastore to the target
///
/// Steps:
/// 1. Validates the config (both sides present and distinct)
/// 2. Connects to the source and target datastores
/// 3. Resolves the tables to migrate
/// 4. Asks for confirmation unless `skip_confirmation` is set
/// 5. Runs the migration, rolling back the target on failure
///
/// # Errors
///
/// Returns an error if the config is invalid, a datastore cannot be reached,
/// the user declines, or the migration fails. A failed migration whose
/// rollback also failed is reported as such so the operator knows the target
/// may hold partial data.
///
/// # Examples
///
/// ```no_run
/// # use anyhow::Result;
/// # use std::path::Path;
/// # use vela_migrator::commands::migrate;
/// # use vela_migrator::config::load_config;
/// # use vela_migrator::model::default_registry;
/// # async fn example() -> Result<()> {
/// let config = load_config(Path::new("migrator.toml"))?;
/// let report = migrate(&config, &default_registry(), true).await?;
/// println!("{} rows inserted", report.total_inserted());
/// # Ok(())
/// # }
/// ```
pub async fn migrate(
    config: &MigratorConfig,
    registry: &TableRegistry,
    skip_confirmation: bool,
) -> Result<MigrationReport> {
    tracing::info!("Starting migration...");
    config.validate()?;

    tracing::info!("Connecting to source datastore...");
    let source = datastore::connect(&config.source, registry)
        .await
        .context("Failed to connect to source datastore")?;
    tracing::info!("✓ Connected to source ({})", source.backend());

    tracing::info!("Connecting to target datastore...");
    let target = datastore::connect(&config.target, registry)
        .await
        .context("Failed to connect to target datastore")?;
    tracing::info!("✓ Connected to target ({})", target.backend());

    let tables = migration::select_tables(registry, &config.tables);
    if tables.is_empty() {
        tracing::warn!("⚠ No known tables selected, nothing to migrate");
        return Ok(MigrationReport::default());
    }

    let policy = config.duplicate_policy();
    if !skip_confirmation && !confirm_migration(config, &tables)? {
        tracing::warn!("⚠ User cancelled operation");
        bail!("Migration cancelled by user");
    }

    tracing::info!(
        "Migrating {} table(s) with duplicate policy '{}'",
        tables.len(),
        policy
    );

    let report = match migration::migrate(source.as_ref(), target.as_ref(), policy, &tables).await
    {
        Ok(report) => report,
        Err(err) => return Err(describe_failure(err)),
    };

    print_summary(&report);
    tracing::info!("✅ Migration complete");
    Ok(report)
}

fn describe_failure(err: MigrationError) -> anyhow::Error {
    if err.target_consistent() {
        let table = err.table();
        anyhow::Error::new(err).context(format!(
            "Migration failed on table {}; all changes were rolled back",
            table
        ))
    } else {
        anyhow::Error::new(err).context(
            "Migration failed and the rollback did not complete; \
             the target datastore may contain partially migrated data",
        )
    }
}

fn confirm_migration(config: &MigratorConfig, tables: &[Arc<dyn Entity>]) -> Result<bool> {
    println!();
    println!("========================================");
    println!("Migration Plan");
    println!("========================================");
    println!("Source:       {}", config.source.kind);
    println!("Target:       {}", config.target.kind);
    println!("On duplicate: {}", config.duplicate_policy());
    println!("Tables:");
    for table in tables {
        println!("  • {}", table.table_name());
    }
    println!("========================================");
    println!();

    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt("Proceed with this migration?")
        .default(false)
        .interact()
        .context("Failed to get confirmation")
}

fn print_summary(report: &MigrationReport) {
    println!();
    println!(
        "{:<30} {:>10} {:>10} {:>12}",
        "Table", "Inserted", "Skipped", "Overwritten"
    );
    println!("{}", "─".repeat(65));
    for table in &report.tables {
        println!(
            "{:<30} {:>10} {:>10} {:>12}",
            table.table, table.inserted, table.skipped, table.overwritten
        );
    }
    println!("{}", "─".repeat(65));
    println!(
        "{:<30} {:>10} {:>10} {:>12}",
        "Total",
        report.total_inserted(),
        report.total_skipped(),
        report.total_overwritten()
    );
    println!();
}

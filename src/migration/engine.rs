// ABOUTME: Copies rows table by table from a source store into a target store
// ABOUTME: Applies the duplicate policy per row and rolls back on any failure

use super::clone::clone_entity;
use super::history::History;
use super::rollback::rollback;
use crate::datastore::{DataStore, StoreError};
use crate::error::{MigrationError, RollbackError, WriteOperation};
use crate::model::Entity;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// What to do when a row's primary key already exists in the target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Keep the target row untouched
    Skip,
    /// Overwrite the target row with the source row
    Update,
    /// Abort the run and roll back
    #[default]
    Error,
}

impl DuplicatePolicy {
    /// Parse a policy name
    ///
    /// Matching ignores case and surrounding whitespace. Anything other than
    /// `skip` or `update`, including an empty string, selects [`DuplicatePolicy::Error`].
    ///
    /// # Examples
    ///
    /// ```
    /// # use vela_migrator::migration::DuplicatePolicy;
    /// assert_eq!(DuplicatePolicy::parse("Update"), DuplicatePolicy::Update);
    /// assert_eq!(DuplicatePolicy::parse(""), DuplicatePolicy::Error);
    /// ```
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "skip" => DuplicatePolicy::Skip,
            "update" => DuplicatePolicy::Update,
            _ => DuplicatePolicy::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicatePolicy::Skip => "skip",
            DuplicatePolicy::Update => "update",
            DuplicatePolicy::Error => "error",
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final state of a single row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    Inserted,
    SkippedDuplicate,
    OverwrittenDuplicate,
}

/// Row counts for one migrated table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableReport {
    pub table: String,
    pub inserted: usize,
    pub skipped: usize,
    pub overwritten: usize,
}

impl TableReport {
    fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            ..Default::default()
        }
    }

    fn record(&mut self, outcome: RowOutcome) {
        match outcome {
            RowOutcome::Inserted => self.inserted += 1,
            RowOutcome::SkippedDuplicate => self.skipped += 1,
            RowOutcome::OverwrittenDuplicate => self.overwritten += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.inserted + self.skipped + self.overwritten
    }
}

/// Summary of a completed migration run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub tables: Vec<TableReport>,
}

impl MigrationReport {
    pub fn table(&self, name: &str) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.table == name)
    }

    pub fn total_inserted(&self) -> usize {
        self.tables.iter().map(|t| t.inserted).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.tables.iter().map(|t| t.skipped).sum()
    }

    pub fn total_overwritten(&self) -> usize {
        self.tables.iter().map(|t| t.overwritten).sum()
    }
}

/// Copy every row of `tables` from `source` into `target`
///
/// Tables are processed one after another in the given order and rows in the
/// order the source lists them. Only `list` is ever called on `source`.
///
/// When a row's key already exists in the target, `policy` decides whether it
/// is skipped, overwritten or aborts the run. On any failure every effect of
/// the run is reversed before the error is returned; if that reversal fails
/// too, the result is [`MigrationError::Rollback`] wrapping both errors.
///
/// # Examples
///
/// ```no_run
/// # use vela_migrator::datastore::MemoryStore;
/// # use vela_migrator::migration::{migrate, select_tables, DuplicatePolicy};
/// # use vela_migrator::model::default_registry;
/// # async fn example() -> anyhow::Result<()> {
/// let registry = default_registry();
/// let (source, target) = (MemoryStore::new(), MemoryStore::new());
/// let tables = select_tables(&registry, &[]);
/// let report = migrate(&source, &target, DuplicatePolicy::Skip, &tables).await?;
/// println!("Inserted {} rows", report.total_inserted());
/// # Ok(())
/// # }
/// ```
pub async fn migrate(
    source: &dyn DataStore,
    target: &dyn DataStore,
    policy: DuplicatePolicy,
    tables: &[Arc<dyn Entity>],
) -> Result<MigrationReport, MigrationError> {
    tracing::info!("Initiating migration...");

    let mut history = History::new();
    match copy_tables(source, target, policy, tables, &mut history).await {
        Ok(report) => {
            tracing::info!("All tables are migrated");
            Ok(report)
        }
        Err(err) => Err(abort(target, tables, &history, err).await),
    }
}

async fn copy_tables(
    source: &dyn DataStore,
    target: &dyn DataStore,
    policy: DuplicatePolicy,
    tables: &[Arc<dyn Entity>],
    history: &mut History,
) -> Result<MigrationReport, MigrationError> {
    let mut report = MigrationReport::default();

    for table in tables {
        let name = table.table_name();
        tracing::info!("Migrating {} table...", name);

        let rows = source
            .list(table.as_ref(), None)
            .await
            .map_err(|source| MigrationError::SourceRead {
                table: name,
                source,
            })?;

        let mut table_report = TableReport::new(name);
        for row in &rows {
            let outcome = copy_row(target, policy, row.as_ref(), history).await?;
            table_report.record(outcome);
        }

        tracing::info!(
            "✓ Migrated table {} ({} inserted, {} skipped, {} overwritten)",
            name,
            table_report.inserted,
            table_report.skipped,
            table_report.overwritten
        );
        report.tables.push(table_report);
    }

    Ok(report)
}

async fn copy_row(
    target: &dyn DataStore,
    policy: DuplicatePolicy,
    row: &dyn Entity,
    history: &mut History,
) -> Result<RowOutcome, MigrationError> {
    let table = row.table_name();
    let snapshot = clone_entity(row)?;

    let err = match target.add(row).await {
        Ok(()) => {
            tracing::debug!("Inserted row {} into {}", snapshot.primary_key(), table);
            history.record_insert(snapshot);
            return Ok(RowOutcome::Inserted);
        }
        Err(err) => err,
    };

    if !err.is_record_exist() {
        return Err(target_write(row, WriteOperation::Add, err));
    }

    match policy {
        DuplicatePolicy::Skip => {
            tracing::debug!("Row {} already exists in {}, skipping", row.primary_key(), table);
            Ok(RowOutcome::SkippedDuplicate)
        }
        DuplicatePolicy::Update => {
            target
                .put(snapshot.as_ref())
                .await
                .map_err(|err| target_write(row, WriteOperation::Put, err))?;
            tracing::debug!("Row {} already exists in {}, updated it", row.primary_key(), table);
            history.record_overwrite(snapshot);
            Ok(RowOutcome::OverwrittenDuplicate)
        }
        DuplicatePolicy::Error => Err(MigrationError::DuplicateRecord {
            table,
            key: row.primary_key(),
        }),
    }
}

fn target_write(row: &dyn Entity, operation: WriteOperation, source: StoreError) -> MigrationError {
    MigrationError::TargetWrite {
        table: row.table_name(),
        key: row.primary_key(),
        operation,
        source,
    }
}

/// Roll back after `cause` and pick the error to surface
async fn abort(
    target: &dyn DataStore,
    tables: &[Arc<dyn Entity>],
    history: &History,
    cause: MigrationError,
) -> MigrationError {
    tracing::error!("Migration failed on table {}: {}", cause.table(), cause);

    match rollback(target, tables, history).await {
        Ok(report) => {
            tracing::info!(
                "Rolled back {} inserted and {} overwritten rows",
                report.deleted,
                report.restored
            );
            cause
        }
        Err(failure) => {
            tracing::error!("Rollback failed, the target may hold partial data: {}", failure);
            MigrationError::Rollback(RollbackError::new(failure, cause))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::MemoryStore;
    use crate::migration::select_tables;
    use crate::model::{default_registry, Application, Project};

    fn app(name: &str, description: &str) -> Application {
        Application {
            name: name.to_string(),
            description: description.to_string(),
            ..Default::default()
        }
    }

    async fn description_of(store: &MemoryStore, name: &str) -> String {
        let rows = store.list(&Application::default(), None).await.unwrap();
        rows.iter()
            .filter_map(|r| r.downcast_ref::<Application>())
            .find(|a| a.name == name)
            .map(|a| a.description.clone())
            .unwrap_or_default()
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(DuplicatePolicy::parse("skip"), DuplicatePolicy::Skip);
        assert_eq!(DuplicatePolicy::parse(" SKIP "), DuplicatePolicy::Skip);
        assert_eq!(DuplicatePolicy::parse("update"), DuplicatePolicy::Update);
        assert_eq!(DuplicatePolicy::parse(""), DuplicatePolicy::Error);
        assert_eq!(DuplicatePolicy::parse("overwrite"), DuplicatePolicy::Error);
        assert_eq!(DuplicatePolicy::default(), DuplicatePolicy::Error);
        assert_eq!(DuplicatePolicy::Update.to_string(), "update");
    }

    #[tokio::test]
    async fn test_duplicate_policies_on_existing_application() {
        let registry = default_registry();
        let tables = select_tables(&registry, &["vela_application".to_string()]);

        for (policy, expected) in [
            (DuplicatePolicy::Update, "newApp"),
            (DuplicatePolicy::Skip, "oldApp"),
            (DuplicatePolicy::Error, "oldApp"),
        ] {
            let source = MemoryStore::new();
            let target = MemoryStore::new();
            source.add(&app("app1", "newApp")).await.unwrap();
            target.add(&app("app1", "oldApp")).await.unwrap();

            let result = migrate(&source, &target, policy, &tables).await;
            match policy {
                DuplicatePolicy::Error => assert!(matches!(
                    result,
                    Err(MigrationError::DuplicateRecord { table: "vela_application", ref key }) if key == "app1"
                )),
                _ => assert!(result.is_ok(), "policy {} failed: {:?}", policy, result),
            }
            assert_eq!(description_of(&target, "app1").await, expected, "policy {}", policy);
        }
    }

    #[tokio::test]
    async fn test_report_counts_outcomes() {
        let registry = default_registry();
        let tables = select_tables(
            &registry,
            &["vela_application".to_string(), "vela_project".to_string()],
        );

        let source = MemoryStore::new();
        let target = MemoryStore::new();
        for name in ["a", "b", "c"] {
            source.add(&app(name, "src")).await.unwrap();
        }
        source
            .add(&Project {
                name: "default".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        target.add(&app("b", "dst")).await.unwrap();

        let report = migrate(&source, &target, DuplicatePolicy::Update, &tables)
            .await
            .unwrap();

        let apps = report.table("vela_application").unwrap();
        assert_eq!((apps.inserted, apps.skipped, apps.overwritten), (2, 0, 1));
        assert_eq!(apps.total(), 3);
        assert_eq!(report.table("vela_project").unwrap().inserted, 1);
        assert_eq!(report.total_inserted(), 3);
        assert_eq!(report.total_overwritten(), 1);
        assert_eq!(report.total_skipped(), 0);
    }

    #[tokio::test]
    async fn test_strict_conflict_rolls_back_earlier_rows() {
        let registry = default_registry();
        let tables = select_tables(&registry, &["vela_application".to_string()]);

        let source = MemoryStore::new();
        let target = MemoryStore::new();
        for name in ["a", "b", "c"] {
            source.add(&app(name, "src")).await.unwrap();
        }
        target.add(&app("c", "dst")).await.unwrap();

        let err = migrate(&source, &target, DuplicatePolicy::Error, &tables)
            .await
            .unwrap_err();
        assert!(err.target_consistent());
        assert_eq!(target.count("vela_application").unwrap(), 1);
        assert_eq!(description_of(&target, "c").await, "dst");
    }

    #[tokio::test]
    async fn test_empty_selection_is_a_no_op() {
        let source = MemoryStore::new();
        let target = MemoryStore::new();
        source.add(&app("a", "")).await.unwrap();

        let report = migrate(&source, &target, DuplicatePolicy::Skip, &[])
            .await
            .unwrap();
        assert!(report.tables.is_empty());
        assert_eq!(target.count("vela_application").unwrap(), 0);
    }
}

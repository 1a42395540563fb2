// ABOUTME: Undoes the effects of a failed migration run on the target store
// ABOUTME: Deletes inserted rows then restores overwritten rows, table by table

use super::history::History;
use crate::datastore::DataStore;
use crate::error::{RollbackAction, RollbackFailure};
use crate::model::Entity;
use std::sync::Arc;

/// Counts of compensating actions applied by a successful rollback
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollbackReport {
    pub deleted: usize,
    pub restored: usize,
}

/// Reverse every effect recorded in `history`
///
/// Tables are processed in the order given. Within a table the inserted rows
/// are deleted first, then the overwritten rows are written back with `put`.
/// The first failing call stops the rollback; nothing is retried.
pub async fn rollback(
    target: &dyn DataStore,
    tables: &[Arc<dyn Entity>],
    history: &History,
) -> Result<RollbackReport, RollbackFailure> {
    tracing::info!("Initiating rollback...");
    let mut report = RollbackReport::default();

    for table in tables {
        let name = table.table_name();

        let inserted = history.inserted(name);
        for entity in inserted {
            if let Err(source) = target.delete(entity.as_ref()).await {
                tracing::error!(
                    "Failed to delete row {} of table {}: {}",
                    entity.primary_key(),
                    name,
                    source
                );
                return Err(RollbackFailure {
                    table: name,
                    key: entity.primary_key(),
                    action: RollbackAction::Delete,
                    source,
                });
            }
            report.deleted += 1;
        }
        if !inserted.is_empty() {
            tracing::info!("Deleted the entries of {} table", name);
        }

        let overwritten = history.overwritten(name);
        for entity in overwritten {
            if let Err(source) = target.put(entity.as_ref()).await {
                tracing::error!(
                    "Failed to restore row {} of table {}: {}",
                    entity.primary_key(),
                    name,
                    source
                );
                return Err(RollbackFailure {
                    table: name,
                    key: entity.primary_key(),
                    action: RollbackAction::Restore,
                    source,
                });
            }
            report.restored += 1;
        }
        if !overwritten.is_empty() {
            tracing::info!("Restored the entries of {} table", name);
        }
    }

    tracing::info!("All changes are rolled back");
    Ok(report)
}

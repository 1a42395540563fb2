// ABOUTME: Error taxonomy of a migration run and of its rollback
// ABOUTME: Every variant names the table and the operation that failed

use crate::datastore::StoreError;
use crate::model::ModelError;
use std::fmt;
use thiserror::Error;

/// Write issued against the target store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOperation {
    Add,
    Put,
}

impl fmt::Display for WriteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteOperation::Add => f.write_str("add"),
            WriteOperation::Put => f.write_str("put"),
        }
    }
}

/// Compensating action issued during rollback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackAction {
    /// Remove a row the run inserted
    Delete,
    /// Write back a row the run overwrote
    Restore,
}

impl fmt::Display for RollbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollbackAction::Delete => f.write_str("delete"),
            RollbackAction::Restore => f.write_str("restore"),
        }
    }
}

/// A row could not be copied into an independent snapshot
#[derive(Debug, Error)]
#[error("failed to clone row `{key}` of table {table}")]
pub struct CloneError {
    pub table: &'static str,
    pub key: String,
    #[source]
    pub source: ModelError,
}

/// The first compensating action that failed during rollback
#[derive(Debug, Error)]
#[error("failed to {action} row `{key}` of table {table} during rollback")]
pub struct RollbackFailure {
    pub table: &'static str,
    pub key: String,
    pub action: RollbackAction,
    #[source]
    pub source: StoreError,
}

/// Rollback failed after the run had already failed
///
/// Carries both the rollback failure and the error that triggered the
/// rollback. The target may hold a partial copy when this is returned.
#[derive(Debug, Error)]
#[error("rollback failed after migration error ({cause}): {failure}")]
pub struct RollbackError {
    #[source]
    failure: RollbackFailure,
    cause: Box<MigrationError>,
}

impl RollbackError {
    pub fn new(failure: RollbackFailure, cause: MigrationError) -> Self {
        Self {
            failure,
            cause: Box::new(cause),
        }
    }

    /// The compensating action that failed
    pub fn failure(&self) -> &RollbackFailure {
        &self.failure
    }

    /// The migration error that triggered the rollback
    pub fn cause(&self) -> &MigrationError {
        &self.cause
    }

    pub fn into_cause(self) -> MigrationError {
        *self.cause
    }
}

/// Reason a migration run ended without completing
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("failed to list rows of table {table} from the source")]
    SourceRead {
        table: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("row `{key}` already exists in table {table} of the target")]
    DuplicateRecord { table: &'static str, key: String },

    #[error("failed to {operation} row `{key}` into table {table} of the target")]
    TargetWrite {
        table: &'static str,
        key: String,
        operation: WriteOperation,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Clone(#[from] CloneError),

    #[error(transparent)]
    Rollback(#[from] RollbackError),
}

impl MigrationError {
    /// Table being processed when the run failed
    pub fn table(&self) -> &'static str {
        match self {
            MigrationError::SourceRead { table, .. }
            | MigrationError::DuplicateRecord { table, .. }
            | MigrationError::TargetWrite { table, .. } => table,
            MigrationError::Clone(err) => err.table,
            MigrationError::Rollback(err) => err.cause().table(),
        }
    }

    /// False when rollback itself failed and the target may hold partial data
    pub fn target_consistent(&self) -> bool {
        !matches!(self, MigrationError::Rollback(_))
    }
}

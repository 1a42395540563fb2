// ABOUTME: Migration core: table selection, row cloning, copying and rollback
// ABOUTME: Also provides checksum comparison used to verify a finished run

pub mod checksum;
mod clone;
mod engine;
mod history;
mod rollback;
mod tables;

pub use checksum::{compare_tables, compute_table_checksum, ChecksumResult};
pub use clone::clone_entity;
pub use engine::{migrate, DuplicatePolicy, MigrationReport, RowOutcome, TableReport};
pub use history::History;
pub use rollback::{rollback, RollbackReport};
pub use tables::select_tables;

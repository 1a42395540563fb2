// ABOUTME: Library module for vela-migrator
// ABOUTME: Exports all core functionality for use in binary and tests

pub mod commands;
pub mod config;
pub mod datastore;
pub mod error;
pub mod migration;
pub mod model;
pub mod utils;

pub use error::{CloneError, MigrationError, RollbackError, RollbackFailure};

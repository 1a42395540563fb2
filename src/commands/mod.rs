// ABOUTME: Command implementations for each CLI subcommand
// ABOUTME: Exports migrate, validate, verify and tables commands

pub mod migrate;
pub mod tables;
pub mod validate;
pub mod verify;

pub use migrate::migrate;
pub use tables::tables;
pub use validate::validate;
pub use verify::verify;

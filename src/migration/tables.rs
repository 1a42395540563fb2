// ABOUTME: Resolves which registered tables a migration run covers
// ABOUTME: Keeps requested order, drops unknown names with a warning

use crate::model::{Entity, TableRegistry};
use std::sync::Arc;

/// Resolve the tables to migrate
///
/// An empty request selects every registered table in registry order.
/// Otherwise the registered tables named in `requested` are returned in the
/// order they were requested; unknown names are skipped and a name given
/// twice is selected once.
pub fn select_tables(registry: &TableRegistry, requested: &[String]) -> Vec<Arc<dyn Entity>> {
    if requested.is_empty() {
        return registry.iter().cloned().collect();
    }

    let mut selected: Vec<Arc<dyn Entity>> = Vec::with_capacity(requested.len());
    for name in requested {
        let name = name.trim();
        match registry.get(name) {
            Some(table) => {
                if !selected.iter().any(|t| t.table_name() == table.table_name()) {
                    selected.push(Arc::clone(table));
                }
            }
            None => tracing::warn!("Table {} is not a known table, skipping it", name),
        }
    }
    selected
}

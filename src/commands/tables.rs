// ABOUTME: Tables command implementation - list the tables the migrator knows
// ABOUTME: Prints each registered table name in migration order

use crate::model::TableRegistry;

pub fn tables(registry: &TableRegistry) -> Vec<&'static str> {
    let names = registry.names();
    for name in &names {
        println!("{}", name);
    }
    names
}

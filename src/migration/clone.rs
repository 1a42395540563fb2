// ABOUTME: Produces independent copies of records through their document form
// ABOUTME: A record that cannot round-trip surfaces as a CloneError

use crate::error::CloneError;
use crate::model::Entity;

/// Deep copy a record
///
/// The copy is rebuilt from the record's document, so it shares no state with
/// the original and has the same concrete type.
pub fn clone_entity(entity: &dyn Entity) -> Result<Box<dyn Entity>, CloneError> {
    let fail = |source| CloneError {
        table: entity.table_name(),
        key: entity.primary_key(),
        source,
    };

    let document = entity.to_document().map_err(fail)?;
    entity.from_document(document).map_err(fail)
}

#![forbid(unsafe_code)]

use super::UndoEntry;
use tg_core::ids::{RecordId, TableName};
use tg_core::{CellValue, Position, Row};

/// Extension points invoked by the engine. Every method has a no-op default.
///
/// `before_delete` and `on_copy` run inside the operation's transaction, and
/// a `before_delete` error aborts the operation before anything is written.
/// The `after_*` hooks run once the transaction has committed.
pub trait MutationObserver {
    fn before_delete(&self, _table: &TableName, _id: RecordId, _row: &Row) -> Result<(), String> {
        Ok(())
    }

    fn after_delete(&self, _table: &TableName, _id: RecordId, _undo_id: i64) {}

    fn on_copy(&self, _table: &TableName, _source_id: RecordId, _new_id: RecordId) {}

    fn after_copy(&self, _table: &TableName, _source_id: RecordId, _new_id: RecordId) {}

    fn after_move(&self, _table: &TableName, _id: RecordId, _position: &Position) {}

    fn after_restore(&self, _entry: &UndoEntry, _success: bool) {}
}

/// Encrypts default values written into encryption-flagged columns.
pub trait FieldCipher {
    fn encrypt(&self, value: &CellValue) -> CellValue;
}

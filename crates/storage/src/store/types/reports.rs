#![forbid(unsafe_code)]

use tg_core::ids::{RecordId, TableName};
use tg_core::{ClipboardMode, Position};

/// A single row that could not be written during a cascade.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowFailure {
    pub table: TableName,
    pub id: RecordId,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CopiedRow {
    pub table: TableName,
    pub source_id: RecordId,
    pub new_id: RecordId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CopyReport {
    pub new_id: RecordId,
    pub position: Position,
    /// Descendant rows copied along with the root, in cascade order.
    pub copied: Vec<CopiedRow>,
    pub failures: Vec<RowFailure>,
    /// Descendants left out because an ancestor copy failed.
    pub skipped: usize,
}

impl CopyReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.skipped == 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteReport {
    pub undo_id: i64,
    /// Every removed row, root first.
    pub deleted: Vec<(TableName, RecordId)>,
    pub failures: Vec<RowFailure>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PastedRecord {
    pub source_id: RecordId,
    /// Same as `source_id` for cut modes, the new record for copy modes.
    pub id: RecordId,
    pub position: Position,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PasteReport {
    pub table: TableName,
    pub mode: ClipboardMode,
    pub placed: Vec<PastedRecord>,
    pub failures: Vec<RowFailure>,
}

#![forbid(unsafe_code)]

use super::super::support::ts_ms_to_rfc3339;
use std::collections::BTreeMap;
use tg_core::Row;
use tg_core::ids::{ActorId, RecordId, TableName};

/// Snapshot of everything one delete removed.
#[derive(Clone, Debug, PartialEq)]
pub struct UndoEntry {
    pub id: i64,
    pub actor_id: ActorId,
    pub created_at_ms: i64,
    pub source_table: TableName,
    pub record_id: RecordId,
    pub description: String,
    pub affected_rows: usize,
    /// Table name to full rows, captured before deletion.
    pub snapshot: BTreeMap<String, Vec<Row>>,
}

impl UndoEntry {
    pub fn created_at_rfc3339(&self) -> String {
        ts_ms_to_rfc3339(self.created_at_ms)
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.snapshot.keys().map(String::as_str)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestoreResult {
    pub success: bool,
    pub restored: Vec<(String, RecordId)>,
    pub failed_tables: Vec<String>,
}

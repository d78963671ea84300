#![forbid(unsafe_code)]

use tg_core::ids::{RecordId, TableName};
use tg_core::{Placement, Row};

#[derive(Clone, Debug, PartialEq)]
pub struct CreateRequest {
    pub table: TableName,
    pub fields: Row,
    pub placement: Option<Placement>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveRequest {
    pub table: TableName,
    pub id: RecordId,
    pub placement: Placement,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DuplicateRequest {
    pub table: TableName,
    pub source_id: RecordId,
    /// `None` places the copy right after its source.
    pub placement: Option<Placement>,
    /// Batch duplication suffixes unique columns instead of clearing them.
    pub batch: bool,
    /// Also copy self-referencing descendants of the source.
    pub include_children: bool,
}

impl DuplicateRequest {
    pub fn new(table: TableName, source_id: RecordId) -> Self {
        Self {
            table,
            source_id,
            placement: None,
            batch: false,
            include_children: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteRequest {
    pub table: TableName,
    pub id: RecordId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PasteRequest {
    pub table: TableName,
    pub placement: Placement,
}

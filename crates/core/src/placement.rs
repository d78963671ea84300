#![forbid(unsafe_code)]

use crate::ids::{RecordId, TableName};
use serde::{Deserialize, Serialize};

/// Where a record should land relative to a reference record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Become the next sibling of `reference`.
    After { reference: RecordId },
    /// Become the first child of `pid`. `ptable` names the owning table for
    /// child tables whose parent table is stored per row.
    Into {
        pid: RecordId,
        ptable: Option<TableName>,
    },
}

impl Placement {
    pub fn after(reference: RecordId) -> Self {
        Self::After { reference }
    }

    pub fn inside(pid: RecordId) -> Self {
        Self::Into { pid, ptable: None }
    }

    pub fn inside_table(ptable: TableName, pid: RecordId) -> Self {
        Self::Into {
            pid,
            ptable: Some(ptable),
        }
    }
}

/// Resolved placement values. A `None` field means the table has no such
/// column (or the column keeps its current value).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub pid: Option<RecordId>,
    pub sorting: Option<i64>,
    pub ptable: Option<TableName>,
}

impl Position {
    pub fn is_empty(&self) -> bool {
        self.pid.is_none() && self.sorting.is_none() && self.ptable.is_none()
    }
}

#![forbid(unsafe_code)]

use crate::ids::TableName;
use crate::value::CellValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Why a cascade is being walked; decides which opt-out flag applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CascadeIntent {
    Copy,
    Delete,
}

/// Parent table of a child table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ParentTable {
    Static(TableName),
    /// The parent table name is stored per row in the `ptable` column.
    Dynamic,
}

impl TryFrom<String> for ParentTable {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim().eq_ignore_ascii_case("dynamic") {
            return Ok(Self::Dynamic);
        }
        TableName::try_new(value.trim())
            .map(Self::Static)
            .map_err(|err| err.to_string())
    }
}

impl From<ParentTable> for String {
    fn from(value: ParentTable) -> Self {
        match value {
            ParentTable::Static(name) => name.into_string(),
            ParentTable::Dynamic => "dynamic".to_string(),
        }
    }
}

/// Copy policy of a single column.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FieldPolicy {
    pub password: bool,
    pub unique: bool,
    pub do_not_copy: bool,
    /// Only one row of the table may carry the flag at a time.
    pub fallback: bool,
    pub encrypt: bool,
    pub default: Option<CellValue>,
}

impl FieldPolicy {
    pub fn password() -> Self {
        Self {
            password: true,
            ..Self::default()
        }
    }

    pub fn unique() -> Self {
        Self {
            unique: true,
            ..Self::default()
        }
    }

    pub fn do_not_copy(default: Option<CellValue>) -> Self {
        Self {
            do_not_copy: true,
            default,
            ..Self::default()
        }
    }

    pub fn fallback(default: Option<CellValue>) -> Self {
        Self {
            fallback: true,
            default,
            ..Self::default()
        }
    }

    pub fn encrypted(mut self) -> Self {
        self.encrypt = true;
        self
    }

    /// True when a copied row must not inherit the source value.
    pub fn resets_on_copy(&self) -> bool {
        self.do_not_copy || self.fallback
    }
}

/// Structure of one table as far as the mutation engine is concerned.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TableShape {
    #[serde(rename = "pid")]
    pub has_pid: bool,
    #[serde(rename = "sorting")]
    pub has_sorting: bool,
    pub parent: Option<ParentTable>,
    #[serde(rename = "children")]
    pub child_tables: Vec<TableName>,
    pub do_not_copy: bool,
    pub do_not_delete: bool,
    /// Child rows of a dynamic-parent table with an empty `ptable` belong to
    /// this table.
    pub legacy_owner: bool,
    pub fields: BTreeMap<String, FieldPolicy>,
}

impl TableShape {
    /// Self-referencing tree: `pid` and `sorting`, no parent table.
    pub fn tree() -> Self {
        Self::default().with_pid().with_sorting()
    }

    /// Ordered child rows of `parent`.
    pub fn child_of(parent: ParentTable) -> Self {
        let mut shape = Self::tree();
        shape.parent = Some(parent);
        shape
    }

    /// Flat list ordered by `sorting` only.
    pub fn ordered_list() -> Self {
        Self::default().with_sorting()
    }

    pub fn with_pid(mut self) -> Self {
        self.has_pid = true;
        self
    }

    pub fn with_sorting(mut self) -> Self {
        self.has_sorting = true;
        self
    }

    pub fn with_child(mut self, child: TableName) -> Self {
        if !self.child_tables.contains(&child) {
            self.child_tables.push(child);
        }
        self
    }

    pub fn with_field(mut self, column: impl Into<String>, policy: FieldPolicy) -> Self {
        self.fields.insert(column.into(), policy);
        self
    }

    pub fn no_copy(mut self) -> Self {
        self.do_not_copy = true;
        self
    }

    pub fn no_delete(mut self) -> Self {
        self.do_not_delete = true;
        self
    }

    pub fn owning_legacy_rows(mut self) -> Self {
        self.legacy_owner = true;
        self
    }

    /// `pid` points at rows of the same table.
    pub fn is_self_referencing(&self) -> bool {
        self.has_pid && self.parent.is_none()
    }

    pub fn has_dynamic_parent(&self) -> bool {
        matches!(self.parent, Some(ParentTable::Dynamic))
    }

    pub fn field(&self, column: &str) -> Option<&FieldPolicy> {
        self.fields.get(column)
    }

    /// True when cascades with `intent` must not enter this table.
    pub fn opts_out(&self, intent: CascadeIntent) -> bool {
        match intent {
            CascadeIntent::Copy => self.do_not_copy,
            CascadeIntent::Delete => self.do_not_delete,
        }
    }
}

#![forbid(unsafe_code)]

use super::shape::{ParentTable, TableShape};
use crate::ids::TableName;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Read-only lookup of table shapes, loaded once per process.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaCatalog {
    tables: BTreeMap<TableName, TableShape>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CatalogError {
    UnknownChild { table: TableName, child: TableName },
    ChildWithoutPid { child: TableName },
    ParentMismatch { table: TableName, child: TableName },
    ChildCycle { table: TableName },
}

impl CatalogError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::UnknownChild { .. } => "child table is not declared in the catalog",
            Self::ChildWithoutPid { .. } => "child table has no pid column",
            Self::ParentMismatch { .. } => "child table names a different parent table",
            Self::ChildCycle { .. } => "child tables form a cycle",
        }
    }
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownChild { table, child } | Self::ParentMismatch { table, child } => {
                write!(f, "{} ({table} -> {child})", self.message())
            }
            Self::ChildWithoutPid { child } => write!(f, "{} ({child})", self.message()),
            Self::ChildCycle { table } => write!(f, "{} (through {table})", self.message()),
        }
    }
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: TableName, shape: TableShape) -> Self {
        self.tables.insert(name, shape);
        self
    }

    pub fn insert(&mut self, name: TableName, shape: TableShape) {
        self.tables.insert(name, shape);
    }

    pub fn shape_of(&self, table: &TableName) -> Option<&TableShape> {
        self.tables.get(table)
    }

    pub fn contains(&self, table: &TableName) -> bool {
        self.tables.contains_key(table)
    }

    pub fn tables(&self) -> impl Iterator<Item = (&TableName, &TableShape)> {
        self.tables.iter()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Tables that declare `child` among their child tables.
    pub fn owners_of(&self, child: &TableName) -> Vec<&TableName> {
        self.tables
            .iter()
            .filter(|(_, shape)| shape.child_tables.contains(child))
            .map(|(name, _)| name)
            .collect()
    }

    /// Checks that the declared parent/child graph is consistent and acyclic.
    pub fn validate(&self) -> Result<(), CatalogError> {
        for (table, shape) in &self.tables {
            for child in &shape.child_tables {
                let Some(child_shape) = self.tables.get(child) else {
                    return Err(CatalogError::UnknownChild {
                        table: table.clone(),
                        child: child.clone(),
                    });
                };
                if !child_shape.has_pid {
                    return Err(CatalogError::ChildWithoutPid {
                        child: child.clone(),
                    });
                }
                match &child_shape.parent {
                    Some(ParentTable::Dynamic) => {}
                    Some(ParentTable::Static(parent)) if parent == table => {}
                    _ => {
                        return Err(CatalogError::ParentMismatch {
                            table: table.clone(),
                            child: child.clone(),
                        });
                    }
                }
            }
        }

        let mut done = BTreeSet::new();
        for table in self.tables.keys() {
            let mut on_path = BTreeSet::new();
            self.check_acyclic(table, &mut on_path, &mut done)?;
        }
        Ok(())
    }

    fn check_acyclic<'a>(
        &'a self,
        table: &'a TableName,
        on_path: &mut BTreeSet<&'a TableName>,
        done: &mut BTreeSet<&'a TableName>,
    ) -> Result<(), CatalogError> {
        if done.contains(table) {
            return Ok(());
        }
        if !on_path.insert(table) {
            return Err(CatalogError::ChildCycle {
                table: table.clone(),
            });
        }
        if let Some(shape) = self.tables.get(table) {
            for child in &shape.child_tables {
                self.check_acyclic(child, on_path, done)?;
            }
        }
        on_path.remove(table);
        done.insert(table);
        Ok(())
    }
}

#![forbid(unsafe_code)]

use super::support::{PtableFilter, child_ids, read_row};
use super::{Engine, SqliteStore, StoreError};
use rusqlite::Connection;
use std::collections::BTreeSet;
use tg_core::ids::{RecordId, TableName};
use tg_core::{CascadeIntent, CellValue};

const MAX_ANCESTRY_DEPTH: usize = 1024;

/// One row reached by a cascade, with the row it was reached from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CascadeNode {
    pub table: TableName,
    pub id: RecordId,
    pub parent_table: TableName,
    pub parent_id: RecordId,
}

impl SqliteStore {
    /// Every row a cascade rooted at `table.id` reaches, excluding the root,
    /// in depth-first display order.
    pub fn cascade(
        &self,
        table: &TableName,
        id: RecordId,
        intent: CascadeIntent,
        include_self_children: bool,
    ) -> Result<Vec<CascadeNode>, StoreError> {
        walk_tx(&self.conn, &self.engine, table, id, intent, include_self_children)
    }

    /// True when `candidate` sits somewhere below `ancestor` in the
    /// self-referencing tree of `table`.
    pub fn is_descendant(
        &self,
        table: &TableName,
        ancestor: RecordId,
        candidate: RecordId,
    ) -> Result<bool, StoreError> {
        is_descendant_tx(&self.conn, table, ancestor, candidate)
    }
}

pub(super) fn walk_tx(
    conn: &Connection,
    engine: &Engine,
    table: &TableName,
    id: RecordId,
    intent: CascadeIntent,
    include_self_children: bool,
) -> Result<Vec<CascadeNode>, StoreError> {
    engine.shape(table)?;

    let mut out = Vec::new();
    let mut seen = BTreeSet::new();
    seen.insert((table.clone(), id));
    let mut stack: Vec<(TableName, RecordId, Option<CascadeNode>)> =
        vec![(table.clone(), id, None)];

    while let Some((current_table, current_id, node)) = stack.pop() {
        if let Some(node) = node {
            out.push(node);
        }
        let shape = engine.shape(&current_table)?;
        let mut found = Vec::new();

        if include_self_children && shape.is_self_referencing() {
            let ids = child_ids(conn, &current_table, current_id, PtableFilter::Any, shape.has_sorting)?;
            found.extend(ids.into_iter().map(|child| (current_table.clone(), child)));
        }

        for child_table in &shape.child_tables {
            let child_shape = engine.shape(child_table)?;
            if child_shape.opts_out(intent) {
                tracing::debug!(table = %child_table, ?intent, "cascade skips opted-out table");
                continue;
            }
            let filter = if child_shape.has_dynamic_parent() {
                PtableFilter::Owner {
                    table: current_table.as_str(),
                    include_empty: shape.legacy_owner,
                }
            } else {
                PtableFilter::Any
            };
            let ids = child_ids(conn, child_table, current_id, filter, child_shape.has_sorting)?;
            found.extend(ids.into_iter().map(|child| (child_table.clone(), child)));
        }

        let mut next = Vec::with_capacity(found.len());
        for (child_table, child_id) in found {
            if !seen.insert((child_table.clone(), child_id)) {
                continue;
            }
            let node = CascadeNode {
                table: child_table.clone(),
                id: child_id,
                parent_table: current_table.clone(),
                parent_id: current_id,
            };
            next.push((child_table, child_id, Some(node)));
        }
        // Reversed so that siblings pop in display order.
        stack.extend(next.into_iter().rev());
    }

    Ok(out)
}

pub(super) fn is_descendant_tx(
    conn: &Connection,
    table: &TableName,
    ancestor: RecordId,
    candidate: RecordId,
) -> Result<bool, StoreError> {
    let mut visited = BTreeSet::new();
    let mut current = candidate;
    for _ in 0..MAX_ANCESTRY_DEPTH {
        if current <= 0 || !visited.insert(current) {
            return Ok(false);
        }
        let Some(row) = read_row(conn, table, current)? else {
            return Ok(false);
        };
        let pid = row.get("pid").and_then(CellValue::as_i64).unwrap_or(0);
        if pid == ancestor {
            return Ok(true);
        }
        current = pid;
    }
    Ok(false)
}

#![forbid(unsafe_code)]

use super::support::{quote_ident, read_row, update_columns};
use super::{Engine, SqliteStore, StoreError};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params_from_iter};
use tg_core::ids::{RecordId, TableName};
use tg_core::ordering::{
    self, RebalancePlan, SORTING_STEP, SlotDecision, first_slot, slot_after,
};
use tg_core::{CellValue, Placement, Position, Row, TableShape};

impl SqliteStore {
    /// Computes `pid`/`sorting` for `subject` (or a new record when `None`)
    /// at `placement`. Rebalancing writes are committed with the result.
    pub fn resolve_position(
        &mut self,
        table: &TableName,
        subject: Option<RecordId>,
        placement: Option<&Placement>,
    ) -> Result<Position, StoreError> {
        let tx = self.conn.transaction()?;
        let position = resolve_position_tx(&tx, &self.engine, table, subject, placement)?;
        tx.commit()?;
        self.cache.invalidate_table(table);
        Ok(position)
    }
}

/// Sibling group a sorting value is unique within.
#[derive(Clone, Debug, PartialEq, Eq)]
struct SiblingGroup {
    /// `None` for flat tables ordered by `sorting` alone.
    pid: Option<RecordId>,
    /// Owner filter for dynamic-parent tables.
    ptable: Option<String>,
}

impl SiblingGroup {
    fn whole_table() -> Self {
        Self {
            pid: None,
            ptable: None,
        }
    }

    fn where_clause(&self, values: &mut Vec<Value>) -> String {
        let mut clauses = Vec::new();
        if let Some(pid) = self.pid {
            values.push(Value::Integer(pid));
            clauses.push(format!("pid=?{}", values.len()));
        }
        if let Some(ptable) = &self.ptable {
            values.push(Value::Text(ptable.clone()));
            clauses.push(format!("ptable=?{}", values.len()));
        }
        if clauses.is_empty() {
            "1=1".to_string()
        } else {
            clauses.join(" AND ")
        }
    }
}

pub(super) fn resolve_position_tx(
    conn: &Connection,
    engine: &Engine,
    table: &TableName,
    subject: Option<RecordId>,
    placement: Option<&Placement>,
) -> Result<Position, StoreError> {
    let shape = engine.shape(table)?;
    match (shape.has_pid, shape.has_sorting) {
        (true, true) => resolve_ordered_tree(conn, table, shape, subject, placement),
        (true, false) => resolve_parent_only(conn, table, shape, placement),
        (false, true) => resolve_flat(conn, table, subject),
        (false, false) => Ok(Position::default()),
    }
}

fn resolve_ordered_tree(
    conn: &Connection,
    table: &TableName,
    shape: &TableShape,
    subject: Option<RecordId>,
    placement: Option<&Placement>,
) -> Result<Position, StoreError> {
    let placement = match (placement, subject) {
        (Some(placement), _) => placement.clone(),
        (None, Some(subject)) => Placement::after(subject),
        (None, None) => Placement::inside(0),
    };

    match placement {
        Placement::Into { pid, ptable } => {
            place_first_child(conn, table, pid, owner_for(shape, ptable)?)
        }
        Placement::After { reference } if reference <= 0 => {
            place_first_child(conn, table, 0, owner_for(shape, None)?)
        }
        Placement::After { reference } => {
            let Some(anchor) = read_anchor(conn, table, reference)? else {
                return place_first_child(conn, table, reference, owner_for(shape, None)?);
            };
            let ptable = if shape.has_dynamic_parent() {
                anchor.ptable.clone()
            } else {
                None
            };
            let group = SiblingGroup {
                pid: Some(anchor.pid),
                ptable: ptable.clone(),
            };
            let sorting = place_after(conn, table, &group, reference, anchor.sorting)?;
            Ok(Position {
                pid: Some(anchor.pid),
                sorting: Some(sorting),
                ptable: ptable.and_then(|name| TableName::try_new(name).ok()),
            })
        }
    }
}

/// Sibling groups of dynamic-parent tables are scoped by owner table, so a
/// first-child placement there must name one.
fn owner_for(
    shape: &TableShape,
    ptable: Option<TableName>,
) -> Result<Option<TableName>, StoreError> {
    if !shape.has_dynamic_parent() {
        return Ok(None);
    }
    ptable.map(Some).ok_or(StoreError::InvalidInput(
        "placement into a dynamic-parent table needs an owner table",
    ))
}

fn place_first_child(
    conn: &Connection,
    table: &TableName,
    pid: RecordId,
    ptable: Option<TableName>,
) -> Result<Position, StoreError> {
    let group = SiblingGroup {
        pid: Some(pid),
        ptable: ptable.as_ref().map(|name| name.to_string()),
    };
    let current_min = aggregate_sorting(conn, table, &group, "MIN", None)?;
    let sorting = match first_slot(current_min) {
        SlotDecision::Use(slot) => slot,
        SlotDecision::Rebalance => {
            let siblings = sibling_ids(conn, table, &group)?;
            let plan = ordering::rebalance_for_first(&siblings).ok_or(StoreError::InvalidInput(
                "sibling group exceeds the sorting domain",
            ))?;
            apply_rebalance(conn, table, &group, &plan)?
        }
    };
    Ok(Position {
        pid: Some(pid),
        sorting: Some(sorting),
        ptable,
    })
}

/// Slot directly after `reference` (whose sorting is `current`) in `group`.
fn place_after(
    conn: &Connection,
    table: &TableName,
    group: &SiblingGroup,
    reference: RecordId,
    current: i64,
) -> Result<i64, StoreError> {
    let next = aggregate_sorting(conn, table, group, "MIN", Some(current))?;
    match slot_after(current, next) {
        SlotDecision::Use(slot) => Ok(slot),
        SlotDecision::Rebalance => {
            let siblings = sibling_ids(conn, table, group)?;
            let plan = ordering::rebalance_after(&siblings, reference).ok_or(
                StoreError::InvalidInput("sibling group exceeds the sorting domain"),
            )?;
            apply_rebalance(conn, table, group, &plan)
        }
    }
}

fn resolve_parent_only(
    conn: &Connection,
    table: &TableName,
    shape: &TableShape,
    placement: Option<&Placement>,
) -> Result<Position, StoreError> {
    match placement {
        None => Ok(Position::default()),
        Some(Placement::Into { pid, ptable }) => Ok(Position {
            pid: Some(*pid),
            sorting: None,
            ptable: ptable.clone().filter(|_| shape.has_dynamic_parent()),
        }),
        Some(Placement::After { reference }) => {
            let anchor = if *reference > 0 {
                read_anchor(conn, table, *reference)?
            } else {
                None
            };
            let Some(anchor) = anchor else {
                return Ok(Position {
                    pid: Some((*reference).max(0)),
                    sorting: None,
                    ptable: None,
                });
            };
            let ptable = anchor
                .ptable
                .filter(|_| shape.has_dynamic_parent())
                .and_then(|name| TableName::try_new(name).ok());
            Ok(Position {
                pid: Some(anchor.pid),
                sorting: None,
                ptable,
            })
        }
    }
}

/// Flat ordered lists ignore the target: the record goes right after its own
/// current slot, or to the end when it is new.
fn resolve_flat(
    conn: &Connection,
    table: &TableName,
    subject: Option<RecordId>,
) -> Result<Position, StoreError> {
    let group = SiblingGroup::whole_table();
    let current = match subject {
        Some(id) => read_anchor(conn, table, id)?.map(|anchor| (id, anchor.sorting)),
        None => None,
    };

    let sorting = match current {
        Some((id, sorting)) => place_after(conn, table, &group, id, sorting)?,
        None => {
            let max = aggregate_sorting(conn, table, &group, "MAX", None)?;
            match ordering::append_slot(max) {
                SlotDecision::Use(slot) => slot,
                SlotDecision::Rebalance => {
                    let siblings = sibling_ids(conn, table, &group)?;
                    let plan = ordering::rebalance_after(&siblings, 0).ok_or(
                        StoreError::InvalidInput("table exceeds the sorting domain"),
                    )?;
                    apply_rebalance(conn, table, &group, &plan)?
                }
            }
        }
    };

    Ok(Position {
        pid: None,
        sorting: Some(sorting),
        ptable: None,
    })
}

/// Placement-relevant columns of a reference record.
struct Anchor {
    pid: RecordId,
    sorting: i64,
    ptable: Option<String>,
}

fn read_anchor(
    conn: &Connection,
    table: &TableName,
    id: RecordId,
) -> Result<Option<Anchor>, StoreError> {
    let Some(row) = read_row(conn, table, id)? else {
        return Ok(None);
    };
    let int = |column: &str| row.get(column).and_then(CellValue::as_i64).unwrap_or(0);
    Ok(Some(Anchor {
        pid: int("pid"),
        sorting: int("sorting"),
        ptable: row
            .get("ptable")
            .and_then(CellValue::as_str)
            .map(str::to_string)
            .filter(|value| !value.is_empty()),
    }))
}

/// `MIN`/`MAX` of `sorting` within `group`, optionally above `greater_than`.
fn aggregate_sorting(
    conn: &Connection,
    table: &TableName,
    group: &SiblingGroup,
    aggregate: &'static str,
    greater_than: Option<i64>,
) -> Result<Option<i64>, StoreError> {
    let mut values = Vec::new();
    let mut clause = group.where_clause(&mut values);
    if let Some(floor) = greater_than {
        values.push(Value::Integer(floor));
        clause.push_str(&format!(" AND sorting>?{}", values.len()));
    }
    let sql = format!(
        "SELECT {aggregate}(sorting) FROM {} WHERE {clause}",
        quote_ident(table.as_str())
    );
    let value = conn
        .query_row(&sql, params_from_iter(values), |row| {
            row.get::<_, Option<i64>>(0)
        })
        .optional()?;
    Ok(value.flatten())
}

fn sibling_ids(
    conn: &Connection,
    table: &TableName,
    group: &SiblingGroup,
) -> Result<Vec<RecordId>, StoreError> {
    let mut values = Vec::new();
    let clause = group.where_clause(&mut values);
    let sql = format!(
        "SELECT id FROM {} WHERE {clause} ORDER BY sorting ASC, id ASC",
        quote_ident(table.as_str())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values), |row| row.get::<_, i64>(0))?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn apply_rebalance(
    conn: &Connection,
    table: &TableName,
    group: &SiblingGroup,
    plan: &RebalancePlan,
) -> Result<i64, StoreError> {
    for (id, sorting) in &plan.assignments {
        let mut changes = Row::new();
        changes.insert("sorting".to_string(), CellValue::Integer(*sorting));
        update_columns(conn, table, *id, &changes)?;
    }
    tracing::debug!(
        table = %table,
        pid = ?group.pid,
        ptable = ?group.ptable,
        siblings = plan.assignments.len(),
        slot = plan.slot,
        step = SORTING_STEP,
        "rebalanced sibling sorting"
    );
    Ok(plan.slot)
}

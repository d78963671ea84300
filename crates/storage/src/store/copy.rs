#![forbid(unsafe_code)]

use super::cascade::{is_descendant_tx, walk_tx};
use super::position::resolve_position_tx;
use super::support::{
    ColumnInfo, has_column, insert_row, now_ms, read_row, require_row, table_columns,
    tstamp_from_ms, value_exists, with_row_savepoint,
};
use super::{
    CopiedRow, CopyReport, DuplicateRequest, Engine, RowFailure, SqliteStore, StoreError,
    validate_record_id,
};
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use tg_core::ids::{RecordId, TableName};
use tg_core::{CascadeIntent, CellValue, Placement, Position, Row, Session};

const MAX_UNIQUE_ATTEMPTS: u32 = 16;

impl SqliteStore {
    /// Duplicates a record (and its eligible descendants) and returns the
    /// new root id together with any per-row failures below it.
    pub fn duplicate(
        &mut self,
        session: &mut Session,
        request: DuplicateRequest,
    ) -> Result<CopyReport, StoreError> {
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;
        let report = duplicate_tx(&tx, &self.engine, &request, now_ms)?;
        tx.commit()?;

        let touched = report
            .copied
            .iter()
            .map(|row| row.table.clone())
            .chain(std::iter::once(request.table.clone()))
            .collect::<BTreeSet<_>>();
        self.invalidate_tables(&touched);
        session.clear_clipboard(&request.table);
        for observer in &self.engine.observers {
            observer.after_copy(&request.table, request.source_id, report.new_id);
        }

        tracing::info!(
            table = %request.table,
            source_id = request.source_id,
            new_id = report.new_id,
            descendants = report.copied.len(),
            failures = report.failures.len(),
            "record duplicated"
        );
        Ok(report)
    }
}

/// Rejects placements that would put a copy or a moved record inside its
/// own subtree.
pub(super) fn ensure_not_circular(
    conn: &Connection,
    engine: &Engine,
    table: &TableName,
    id: RecordId,
    placement: Option<&Placement>,
    allow_after_self: bool,
) -> Result<(), StoreError> {
    let shape = engine.shape(table)?;
    if !shape.is_self_referencing() {
        return Ok(());
    }
    let circular = match placement {
        None => false,
        Some(Placement::Into { pid, .. }) => {
            *pid == id || is_descendant_tx(conn, table, id, *pid)?
        }
        Some(Placement::After { reference }) => {
            if *reference == id {
                !allow_after_self
            } else {
                is_descendant_tx(conn, table, id, *reference)?
            }
        }
    };
    if circular {
        let target = match placement {
            Some(Placement::Into { pid, .. }) => *pid,
            Some(Placement::After { reference }) => *reference,
            None => id,
        };
        return Err(StoreError::CircularReference {
            table: table.to_string(),
            record_id: id,
            target,
        });
    }
    Ok(())
}

pub(super) fn duplicate_tx(
    conn: &Connection,
    engine: &Engine,
    request: &DuplicateRequest,
    now_ms: i64,
) -> Result<CopyReport, StoreError> {
    let table = &request.table;
    let source_id = validate_record_id(request.source_id)?;
    let shape = engine.shape(table)?;
    let source = require_row(conn, table, source_id)?;
    ensure_not_circular(conn, engine, table, source_id, request.placement.as_ref(), true)?;

    // Collected before the root copy exists so the new row is never part of
    // its own cascade.
    let include_self = request.include_children && shape.is_self_referencing();
    let nodes = if shape.child_tables.is_empty() && !include_self {
        Vec::new()
    } else {
        walk_tx(conn, engine, table, source_id, CascadeIntent::Copy, include_self)?
    };

    let position = resolve_position_tx(conn, engine, table, Some(source_id), request.placement.as_ref())?;
    let mut root_overrides = Row::new();
    apply_position(&mut root_overrides, &position);
    let new_id = copy_row_tx(
        conn,
        engine,
        CopyRowArgs {
            table,
            source_id,
            source: &source,
            overrides: &root_overrides,
        },
        request.batch,
        now_ms,
    )?;

    let mut mapping = BTreeMap::new();
    mapping.insert((table.clone(), source_id), new_id);
    let mut copied = Vec::new();
    let mut failures = Vec::new();
    let mut skipped = 0usize;

    for node in nodes {
        if node.table == *table && node.id == new_id {
            continue;
        }
        let Some(parent_new_id) = mapping
            .get(&(node.parent_table.clone(), node.parent_id))
            .copied()
        else {
            skipped += 1;
            continue;
        };
        let Some(row) = read_row(conn, &node.table, node.id)? else {
            continue;
        };

        let mut overrides = Row::new();
        overrides.insert("pid".to_string(), CellValue::Integer(parent_new_id));
        let result = with_row_savepoint(conn, || {
            copy_row_tx(
                conn,
                engine,
                CopyRowArgs {
                    table: &node.table,
                    source_id: node.id,
                    source: &row,
                    overrides: &overrides,
                },
                request.batch,
                now_ms,
            )
        });
        match result {
            Ok(child_new_id) => {
                mapping.insert((node.table.clone(), node.id), child_new_id);
                copied.push(CopiedRow {
                    table: node.table.clone(),
                    source_id: node.id,
                    new_id: child_new_id,
                });
            }
            Err(err) => {
                tracing::warn!(
                    table = %node.table,
                    id = node.id,
                    error = %err,
                    "row copy failed; subtree skipped"
                );
                failures.push(RowFailure {
                    table: node.table.clone(),
                    id: node.id,
                    message: err.to_string(),
                });
            }
        }
    }

    Ok(CopyReport {
        new_id,
        position,
        copied,
        failures,
        skipped,
    })
}

pub(super) fn apply_position(row: &mut Row, position: &Position) {
    if let Some(pid) = position.pid {
        row.insert("pid".to_string(), CellValue::Integer(pid));
    }
    if let Some(sorting) = position.sorting {
        row.insert("sorting".to_string(), CellValue::Integer(sorting));
    }
    if let Some(ptable) = &position.ptable {
        row.insert("ptable".to_string(), CellValue::text(ptable.as_str()));
    }
}

struct CopyRowArgs<'a> {
    table: &'a TableName,
    source_id: RecordId,
    source: &'a Row,
    overrides: &'a Row,
}

/// Inserts a copy of `source` with the per-column copy policy applied and
/// `overrides` written over the result.
fn copy_row_tx(
    conn: &Connection,
    engine: &Engine,
    args: CopyRowArgs<'_>,
    batch: bool,
    now_ms: i64,
) -> Result<RecordId, StoreError> {
    let CopyRowArgs {
        table,
        source_id,
        source,
        overrides,
    } = args;
    let shape = engine.shape(table)?;
    let columns = table_columns(conn, table.as_str())?;

    let mut row = Row::new();
    for column in &columns {
        if column.primary_key || column.name == "id" {
            continue;
        }
        let value = source.get(&column.name).cloned().unwrap_or_default();
        let value = match shape.field(&column.name) {
            Some(policy) if policy.password => column.empty_value(),
            Some(policy) if policy.unique => {
                if batch {
                    unique_copy_value(conn, table, column, &value)?
                } else {
                    column.empty_value()
                }
            }
            Some(policy) if policy.resets_on_copy() => {
                let default = policy
                    .default
                    .clone()
                    .or_else(|| column.declared_default())
                    .unwrap_or_else(|| column.empty_value());
                match engine.cipher() {
                    Some(cipher) if policy.encrypt => cipher.encrypt(&default),
                    _ => default,
                }
            }
            _ => value,
        };
        row.insert(column.name.clone(), value);
    }

    for (column, value) in overrides {
        if has_column(&columns, column) {
            row.insert(column.clone(), value.clone());
        }
    }
    if has_column(&columns, "tstamp") {
        row.insert("tstamp".to_string(), CellValue::Integer(tstamp_from_ms(now_ms)));
    }

    let new_id = insert_row(conn, table.as_str(), &row)?;
    for observer in &engine.observers {
        observer.on_copy(table, source_id, new_id);
    }
    Ok(new_id)
}

/// Appends a short hash suffix until no row of `table` holds the value.
fn unique_copy_value(
    conn: &Connection,
    table: &TableName,
    column: &ColumnInfo,
    value: &CellValue,
) -> Result<CellValue, StoreError> {
    let Some(base) = value.as_str().filter(|base| !base.is_empty()) else {
        return Ok(column.empty_value());
    };
    for attempt in 0..MAX_UNIQUE_ATTEMPTS {
        let candidate = CellValue::Text(format!("{base}-{}", suffix(table, &column.name, base, attempt)));
        if !value_exists(conn, table, &column.name, &candidate)? {
            return Ok(candidate);
        }
    }
    Err(StoreError::UniqueExhausted {
        table: table.to_string(),
        column: column.name.clone(),
    })
}

fn suffix(table: &TableName, column: &str, base: &str, attempt: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(table.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(column.as_bytes());
    hasher.update([0u8]);
    hasher.update(base.as_bytes());
    hasher.update(attempt.to_le_bytes());
    let digest = hasher.finalize();

    let mut out = String::with_capacity(6);
    for b in digest.iter().take(3) {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

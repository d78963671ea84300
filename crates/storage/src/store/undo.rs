#![forbid(unsafe_code)]

use super::support::{has_column, insert_row, table_columns, with_row_savepoint};
use super::{RestoreResult, SqliteStore, StoreError, UndoEntry};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::{BTreeMap, BTreeSet};
use tg_core::ids::{ActorId, RecordId, TableName};
use tg_core::{CellValue, Row};

const UNDO_COLUMNS: &str =
    "id, actor_id, created_at_ms, source_table, record_id, description, affected_rows, snapshot_json";

impl SqliteStore {
    pub fn undo_get(&self, undo_id: i64) -> Result<Option<UndoEntry>, StoreError> {
        load_undo_tx(&self.conn, undo_id)
    }

    /// Newest entries first, optionally only those recorded for `actor_id`.
    /// Entries whose stored snapshot no longer parses are skipped with a
    /// warning; `undo_get` still reports them as errors.
    pub fn undo_list(
        &self,
        actor_id: Option<ActorId>,
        limit: usize,
    ) -> Result<Vec<UndoEntry>, StoreError> {
        let sql = format!(
            r#"
            SELECT {UNDO_COLUMNS}
            FROM tg_undo
            WHERE (?1 IS NULL OR actor_id=?1)
            ORDER BY id DESC
            LIMIT ?2
            "#
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![actor_id, limit as i64], read_undo_columns)?;
        let raw = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(raw
            .into_iter()
            .filter_map(|row| {
                let undo_id = row.id;
                row.into_entry()
                    .inspect_err(|err| {
                        tracing::warn!(undo_id, error = %err, "unreadable undo entry skipped");
                    })
                    .ok()
            })
            .collect())
    }

    /// Drops entries older than the configured retention period and returns
    /// how many were removed.
    pub fn undo_purge(&mut self, now_ms: i64) -> Result<usize, StoreError> {
        let cutoff = now_ms.saturating_sub(self.engine.undo_period_ms);
        let removed = self
            .conn
            .execute("DELETE FROM tg_undo WHERE created_at_ms < ?1", params![cutoff])?;
        if removed > 0 {
            tracing::info!(removed, cutoff_ms = cutoff, "purged expired undo entries");
        }
        Ok(removed)
    }

    /// Re-inserts every row held by an undo entry under its original id.
    ///
    /// Rows that cannot be written (dropped table, id taken again) stay in
    /// the entry so a later attempt can retry them; the entry disappears
    /// once everything is back.
    pub fn undo_restore(&mut self, undo_id: i64) -> Result<RestoreResult, StoreError> {
        let tx = self.conn.transaction()?;
        let entry = load_undo_tx(&tx, undo_id)?.ok_or(StoreError::UndoUnavailable(undo_id))?;

        let mut restored = Vec::new();
        let mut remaining: BTreeMap<String, Vec<Row>> = BTreeMap::new();
        for (table, rows) in &entry.snapshot {
            let columns = table_columns(&tx, table)?;
            for row in rows {
                let id = row.get("id").and_then(CellValue::as_i64).unwrap_or(0);
                let result = if columns.is_empty() {
                    Err(StoreError::UnknownTable(table.clone()))
                } else {
                    let values = row
                        .iter()
                        .filter(|(column, _)| has_column(&columns, column))
                        .map(|(column, value)| (column.clone(), value.clone()))
                        .collect::<Row>();
                    with_row_savepoint(&tx, || insert_row(&tx, table, &values))
                };
                match result {
                    Ok(_) => restored.push((table.clone(), id)),
                    Err(err) => {
                        tracing::warn!(undo_id, table = %table, id, error = %err, "row restore failed");
                        remaining.entry(table.clone()).or_default().push(row.clone());
                    }
                }
            }
        }

        let success = remaining.is_empty();
        if success {
            tx.execute("DELETE FROM tg_undo WHERE id=?1", params![undo_id])?;
        } else {
            rewrite_undo_snapshot_tx(&tx, undo_id, &remaining)?;
        }
        tx.commit()?;

        let touched = restored
            .iter()
            .filter_map(|(table, _)| TableName::try_new(table.as_str()).ok())
            .collect::<BTreeSet<_>>();
        self.invalidate_tables(&touched);
        for observer in &self.engine.observers {
            observer.after_restore(&entry, success);
        }

        tracing::info!(
            undo_id,
            restored = restored.len(),
            pending = remaining.values().map(Vec::len).sum::<usize>(),
            "undo entry restored"
        );
        Ok(RestoreResult {
            success,
            restored,
            failed_tables: remaining.into_keys().collect(),
        })
    }
}

pub(super) struct NewUndoEntry<'a> {
    pub(super) actor_id: ActorId,
    pub(super) created_at_ms: i64,
    pub(super) source_table: &'a TableName,
    pub(super) record_id: RecordId,
    pub(super) description: &'a str,
    pub(super) snapshot: &'a BTreeMap<String, Vec<Row>>,
}

pub(super) fn insert_undo_entry_tx(
    conn: &Connection,
    args: NewUndoEntry<'_>,
) -> Result<i64, StoreError> {
    let NewUndoEntry {
        actor_id,
        created_at_ms,
        source_table,
        record_id,
        description,
        snapshot,
    } = args;
    let affected_rows = snapshot.values().map(Vec::len).sum::<usize>();
    conn.execute(
        r#"
        INSERT INTO tg_undo(actor_id, created_at_ms, source_table, record_id, description, affected_rows, snapshot_json)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            actor_id,
            created_at_ms,
            source_table.as_str(),
            record_id,
            description,
            affected_rows as i64,
            serde_json::to_string(snapshot)?
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Replaces the rows held by an entry, keeping its identity and metadata.
pub(super) fn rewrite_undo_snapshot_tx(
    conn: &Connection,
    undo_id: i64,
    snapshot: &BTreeMap<String, Vec<Row>>,
) -> Result<(), StoreError> {
    let affected_rows = snapshot.values().map(Vec::len).sum::<usize>();
    conn.execute(
        "UPDATE tg_undo SET snapshot_json=?2, affected_rows=?3 WHERE id=?1",
        params![undo_id, serde_json::to_string(snapshot)?, affected_rows as i64],
    )?;
    Ok(())
}

pub(super) fn load_undo_tx(conn: &Connection, undo_id: i64) -> Result<Option<UndoEntry>, StoreError> {
    let sql = format!("SELECT {UNDO_COLUMNS} FROM tg_undo WHERE id=?1");
    let raw = conn
        .query_row(&sql, params![undo_id], read_undo_columns)
        .optional()?;
    raw.map(RawUndoRow::into_entry).transpose()
}

struct RawUndoRow {
    id: i64,
    actor_id: ActorId,
    created_at_ms: i64,
    source_table: String,
    record_id: RecordId,
    description: String,
    affected_rows: i64,
    snapshot_json: String,
}

impl RawUndoRow {
    fn into_entry(self) -> Result<UndoEntry, StoreError> {
        let source_table = TableName::try_new(self.source_table)
            .map_err(|err| StoreError::Config(format!("undo entry {}: {}", self.id, err.message())))?;
        Ok(UndoEntry {
            id: self.id,
            actor_id: self.actor_id,
            created_at_ms: self.created_at_ms,
            source_table,
            record_id: self.record_id,
            description: self.description,
            affected_rows: usize::try_from(self.affected_rows).unwrap_or(0),
            snapshot: serde_json::from_str(&self.snapshot_json)?,
        })
    }
}

fn read_undo_columns(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawUndoRow> {
    Ok(RawUndoRow {
        id: row.get(0)?,
        actor_id: row.get(1)?,
        created_at_ms: row.get(2)?,
        source_table: row.get(3)?,
        record_id: row.get(4)?,
        description: row.get(5)?,
        affected_rows: row.get(6)?,
        snapshot_json: row.get(7)?,
    })
}


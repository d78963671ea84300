#![forbid(unsafe_code)]

use super::copy::{apply_position, ensure_not_circular};
use super::position::resolve_position_tx;
use super::support::{
    has_column, now_ms, require_row, table_columns, tstamp_from_ms, update_columns,
};
use super::{Engine, MoveRequest, SqliteStore, StoreError, validate_record_id};
use rusqlite::Connection;
use tg_core::ids::{RecordId, TableName};
use tg_core::{CellValue, Placement, Position, Row, Session};

impl SqliteStore {
    /// Moves a record to `placement` and returns where it landed.
    pub fn move_record(
        &mut self,
        session: &mut Session,
        request: MoveRequest,
    ) -> Result<Position, StoreError> {
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;
        let position = move_tx(
            &tx,
            &self.engine,
            &request.table,
            request.id,
            &request.placement,
            now_ms,
        )?;
        tx.commit()?;

        self.cache.invalidate_table(&request.table);
        session.clear_clipboard(&request.table);
        for observer in &self.engine.observers {
            observer.after_move(&request.table, request.id, &position);
        }
        tracing::info!(
            table = %request.table,
            id = request.id,
            pid = ?position.pid,
            sorting = ?position.sorting,
            "record moved"
        );
        Ok(position)
    }
}

pub(super) fn move_tx(
    conn: &Connection,
    engine: &Engine,
    table: &TableName,
    id: RecordId,
    placement: &Placement,
    now_ms: i64,
) -> Result<Position, StoreError> {
    let id = validate_record_id(id)?;
    engine.shape(table)?;
    require_row(conn, table, id)?;
    ensure_not_circular(conn, engine, table, id, Some(placement), true)?;

    let position = resolve_position_tx(conn, engine, table, Some(id), Some(placement))?;
    let mut changes = Row::new();
    apply_position(&mut changes, &position);
    let columns = table_columns(conn, table.as_str())?;
    if has_column(&columns, "tstamp") {
        changes.insert("tstamp".to_string(), CellValue::Integer(tstamp_from_ms(now_ms)));
    }
    changes.retain(|column, _| has_column(&columns, column));
    update_columns(conn, table, id, &changes)?;
    Ok(position)
}

#![forbid(unsafe_code)]

use super::copy::apply_position;
use super::position::resolve_position_tx;
use super::support::{
    PtableFilter, child_ids, has_column, insert_row, now_ms, read_row, table_columns,
    tstamp_from_ms,
};
use super::{CreateRequest, SqliteStore, StoreError, validate_record_id};
use tg_core::ids::{RecordId, TableName};
use tg_core::{CellValue, Placement, Row, Session};

impl SqliteStore {
    /// Inserts a new record. Without a placement, a `pid` given in `fields`
    /// (with `ptable` for dynamic-parent tables) puts the record first under
    /// that parent; otherwise it goes to the root.
    pub fn create(
        &mut self,
        session: &mut Session,
        request: CreateRequest,
    ) -> Result<RecordId, StoreError> {
        let CreateRequest {
            table,
            mut fields,
            placement,
        } = request;
        fields.remove("id");
        let placement = placement.or_else(|| {
            let pid = fields.get("pid").and_then(CellValue::as_i64)?;
            let owner = fields
                .get("ptable")
                .and_then(CellValue::as_str)
                .and_then(|name| TableName::try_new(name).ok());
            Some(match owner {
                Some(owner) => Placement::inside_table(owner, pid),
                None => Placement::inside(pid),
            })
        });
        let now_ms = now_ms();

        let tx = self.conn.transaction()?;
        let columns = table_columns(&tx, table.as_str())?;
        if columns.is_empty() {
            return Err(StoreError::UnknownTable(table.to_string()));
        }
        let position = resolve_position_tx(&tx, &self.engine, &table, None, placement.as_ref())?;
        apply_position(&mut fields, &position);
        if has_column(&columns, "tstamp") {
            fields.insert("tstamp".to_string(), CellValue::Integer(tstamp_from_ms(now_ms)));
        }
        let id = insert_row(&tx, table.as_str(), &fields)?;
        tx.commit()?;

        self.cache.invalidate_table(&table);
        session.clear_clipboard(&table);
        tracing::info!(table = %table, id, pid = ?position.pid, sorting = ?position.sorting, "record created");
        Ok(id)
    }

    pub fn get_record(&self, table: &TableName, id: RecordId) -> Result<Option<Row>, StoreError> {
        self.engine.shape(table)?;
        read_row(&self.conn, table, validate_record_id(id)?)
    }

    /// Children of `pid` in display order. `ptable` narrows dynamic-parent
    /// tables to one owner.
    pub fn list_children(
        &self,
        table: &TableName,
        pid: RecordId,
        ptable: Option<&TableName>,
    ) -> Result<Vec<Row>, StoreError> {
        let shape = self.engine.shape(table)?;
        if !shape.has_pid {
            return Err(StoreError::InvalidInput("table has no pid column"));
        }
        let filter = match ptable {
            Some(owner) => PtableFilter::Owner {
                table: owner.as_str(),
                include_empty: false,
            },
            None => PtableFilter::Any,
        };
        let ids = child_ids(&self.conn, table, pid, filter, shape.has_sorting)?;
        let mut rows = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(row) = read_row(&self.conn, table, id)? {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    /// Number of children of `pid`, memoized until the table is next written
    /// through the engine.
    pub fn count_children(
        &mut self,
        table: &TableName,
        pid: RecordId,
        ptable: Option<&TableName>,
    ) -> Result<usize, StoreError> {
        let owner = ptable.map(TableName::as_str);
        if let Some(count) = self.cache.get(table, pid, owner) {
            return Ok(count);
        }
        let count = self.list_children(table, pid, ptable)?.len();
        self.cache.put(table, pid, owner, count);
        Ok(count)
    }
}

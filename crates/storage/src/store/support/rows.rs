#![forbid(unsafe_code)]

use super::super::StoreError;
use super::sql::{SqlCell, cell_from_ref, parse_default_sql, quote_ident};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use tg_core::ids::{RecordId, TableName};
use tg_core::{CellValue, Row};

#[derive(Clone, Debug, PartialEq)]
pub(in crate::store) struct ColumnInfo {
    pub(in crate::store) name: String,
    pub(in crate::store) decl_type: String,
    pub(in crate::store) default_sql: Option<String>,
    pub(in crate::store) primary_key: bool,
}

impl ColumnInfo {
    /// Empty value of the column's type affinity.
    pub(in crate::store) fn empty_value(&self) -> CellValue {
        let ty = self.decl_type.to_ascii_uppercase();
        if ty.contains("INT") {
            CellValue::Integer(0)
        } else if ty.contains("CHAR") || ty.contains("CLOB") || ty.contains("TEXT") {
            CellValue::Text(String::new())
        } else if ty.is_empty() || ty.contains("BLOB") {
            CellValue::Null
        } else if ty.contains("REAL") || ty.contains("FLOA") || ty.contains("DOUB") {
            CellValue::Real(0.0)
        } else {
            CellValue::Integer(0)
        }
    }

    pub(in crate::store) fn declared_default(&self) -> Option<CellValue> {
        self.default_sql.as_deref().and_then(parse_default_sql)
    }
}

/// Current columns of `table`; empty when the table does not exist.
pub(in crate::store) fn table_columns(
    conn: &Connection,
    table: &str,
) -> Result<Vec<ColumnInfo>, StoreError> {
    let mut stmt =
        conn.prepare("SELECT name, type, dflt_value, pk FROM pragma_table_info(?1) ORDER BY cid")?;
    let rows = stmt.query_map(params![table], |row| {
        Ok(ColumnInfo {
            name: row.get(0)?,
            decl_type: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            default_sql: row.get(2)?,
            primary_key: row.get::<_, i64>(3)? != 0,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub(in crate::store) fn has_column(columns: &[ColumnInfo], name: &str) -> bool {
    columns.iter().any(|column| column.name == name)
}

pub(in crate::store) fn read_row(
    conn: &Connection,
    table: &TableName,
    id: RecordId,
) -> Result<Option<Row>, StoreError> {
    let sql = format!("SELECT * FROM {} WHERE id=?1", quote_ident(table.as_str()));
    let mut stmt = conn.prepare(&sql)?;
    let names = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let row = stmt
        .query_row(params![id], |row| {
            let mut out = Row::new();
            for (index, name) in names.iter().enumerate() {
                out.insert(name.clone(), cell_from_ref(row.get_ref(index)?));
            }
            Ok(out)
        })
        .optional()?;
    Ok(row)
}

pub(in crate::store) fn require_row(
    conn: &Connection,
    table: &TableName,
    id: RecordId,
) -> Result<Row, StoreError> {
    read_row(conn, table, id)?.ok_or_else(|| StoreError::RecordNotFound {
        table: table.to_string(),
        id,
    })
}

/// Inserts `row` and returns the id of the new record.
pub(in crate::store) fn insert_row(
    conn: &Connection,
    table: &str,
    row: &Row,
) -> Result<RecordId, StoreError> {
    if row.is_empty() {
        conn.execute(
            &format!("INSERT INTO {} DEFAULT VALUES", quote_ident(table)),
            [],
        )?;
        return Ok(conn.last_insert_rowid());
    }

    let columns = row
        .keys()
        .map(|column| quote_ident(column))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=row.len())
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO {} ({columns}) VALUES ({placeholders})",
        quote_ident(table)
    );
    conn.execute(&sql, params_from_iter(row.values().map(SqlCell)))?;
    Ok(conn.last_insert_rowid())
}

pub(in crate::store) fn update_columns(
    conn: &Connection,
    table: &TableName,
    id: RecordId,
    changes: &Row,
) -> Result<usize, StoreError> {
    if changes.is_empty() {
        return Ok(0);
    }
    let assignments = changes
        .keys()
        .enumerate()
        .map(|(index, column)| format!("{}=?{}", quote_ident(column), index + 1))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE {} SET {assignments} WHERE id=?{}",
        quote_ident(table.as_str()),
        changes.len() + 1
    );
    let id = CellValue::Integer(id);
    let values = changes.values().chain(std::iter::once(&id)).map(SqlCell);
    Ok(conn.execute(&sql, params_from_iter(values))?)
}

pub(in crate::store) fn delete_row(
    conn: &Connection,
    table: &TableName,
    id: RecordId,
) -> Result<usize, StoreError> {
    let sql = format!("DELETE FROM {} WHERE id=?1", quote_ident(table.as_str()));
    Ok(conn.execute(&sql, params![id])?)
}

pub(in crate::store) fn value_exists(
    conn: &Connection,
    table: &TableName,
    column: &str,
    value: &CellValue,
) -> Result<bool, StoreError> {
    let sql = format!(
        "SELECT 1 FROM {} WHERE {}=?1 LIMIT 1",
        quote_ident(table.as_str()),
        quote_ident(column)
    );
    let found = conn
        .query_row(&sql, [SqlCell(value)], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

/// How child rows of a dynamic-parent table are matched against their owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(in crate::store) enum PtableFilter<'a> {
    Any,
    Owner {
        table: &'a str,
        include_empty: bool,
    },
}

/// Ids of rows in `table` whose `pid` is `pid`, in display order.
pub(in crate::store) fn child_ids(
    conn: &Connection,
    table: &TableName,
    pid: RecordId,
    filter: PtableFilter<'_>,
    ordered_by_sorting: bool,
) -> Result<Vec<RecordId>, StoreError> {
    let mut sql = format!("SELECT id FROM {} WHERE pid=?1", quote_ident(table.as_str()));
    let mut values = vec![Value::Integer(pid)];
    if let PtableFilter::Owner {
        table: owner,
        include_empty,
    } = filter
    {
        if include_empty {
            sql.push_str(" AND (ptable=?2 OR ptable='' OR ptable IS NULL)");
        } else {
            sql.push_str(" AND ptable=?2");
        }
        values.push(Value::Text(owner.to_string()));
    }
    if ordered_by_sorting {
        sql.push_str(" ORDER BY sorting ASC, id ASC");
    } else {
        sql.push_str(" ORDER BY id ASC");
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values), |row| row.get::<_, i64>(0))?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

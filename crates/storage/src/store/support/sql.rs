#![forbid(unsafe_code)]

use rusqlite::ToSql;
use rusqlite::types::{ToSqlOutput, ValueRef};
use tg_core::CellValue;

/// Quotes an identifier for interpolation into a statement.
pub(in crate::store) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Binds a cell with its own storage class; raw text goes back as TEXT.
pub(in crate::store) struct SqlCell<'a>(pub(in crate::store) &'a CellValue);

impl ToSql for SqlCell<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Borrowed(match self.0 {
            CellValue::Null => ValueRef::Null,
            CellValue::Integer(value) => ValueRef::Integer(*value),
            CellValue::Real(value) => ValueRef::Real(*value),
            CellValue::Text(value) => ValueRef::Text(value.as_bytes()),
            CellValue::RawText(value) => ValueRef::Text(value),
            CellValue::Blob(value) => ValueRef::Blob(value),
        }))
    }
}

pub(in crate::store) fn cell_from_ref(value: ValueRef<'_>) -> CellValue {
    match value {
        ValueRef::Null => CellValue::Null,
        ValueRef::Integer(value) => CellValue::Integer(value),
        ValueRef::Real(value) => CellValue::Real(value),
        ValueRef::Text(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => CellValue::Text(text.to_owned()),
            Err(_) => CellValue::RawText(bytes.to_vec()),
        },
        ValueRef::Blob(bytes) => CellValue::Blob(bytes.to_vec()),
    }
}

/// Parses a column default as reported by `PRAGMA table_info`.
///
/// Only literal defaults are understood; expressions such as
/// `CURRENT_TIMESTAMP` yield `None`.
pub(in crate::store) fn parse_default_sql(raw: &str) -> Option<CellValue> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("null") {
        return Some(CellValue::Null);
    }
    if let Some(inner) = trimmed
        .strip_prefix('(')
        .and_then(|value| value.strip_suffix(')'))
    {
        return parse_default_sql(inner);
    }
    if trimmed.len() >= 2 && trimmed.starts_with('\'') && trimmed.ends_with('\'') {
        let inner = &trimmed[1..trimmed.len() - 1];
        return Some(CellValue::Text(inner.replace("''", "'")));
    }
    if let Ok(value) = trimmed.parse::<i64>() {
        return Some(CellValue::Integer(value));
    }
    if let Ok(value) = trimmed.parse::<f64>() {
        return Some(CellValue::Real(value));
    }
    None
}

#![forbid(unsafe_code)]

use super::super::StoreError;
use rusqlite::Connection;

/// Runs one row-level write inside a savepoint so that a failure rolls back
/// only that row and leaves the surrounding transaction usable.
pub(in crate::store) fn with_row_savepoint<T>(
    conn: &Connection,
    write: impl FnOnce() -> Result<T, StoreError>,
) -> Result<T, StoreError> {
    conn.execute_batch("SAVEPOINT tg_row")?;
    match write() {
        Ok(value) => {
            conn.execute_batch("RELEASE tg_row")?;
            Ok(value)
        }
        Err(err) => {
            conn.execute_batch("ROLLBACK TO tg_row; RELEASE tg_row")?;
            Err(err)
        }
    }
}

#![forbid(unsafe_code)]

use super::super::StoreError;
use rusqlite::{Connection, params};

const ENGINE_SCHEMA_VERSION: &str = "1";

const SQL: &str = r#"
        CREATE TABLE IF NOT EXISTS tg_meta (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tg_undo (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          actor_id INTEGER NOT NULL,
          created_at_ms INTEGER NOT NULL,
          source_table TEXT NOT NULL,
          record_id INTEGER NOT NULL,
          description TEXT NOT NULL,
          affected_rows INTEGER NOT NULL,
          snapshot_json TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS tg_undo_actor_created
          ON tg_undo(actor_id, created_at_ms);
"#;

pub(in crate::store) fn install_engine_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO tg_meta(key, value) VALUES (?1, ?2)",
        params!["schema_version", ENGINE_SCHEMA_VERSION],
    )?;
    Ok(())
}

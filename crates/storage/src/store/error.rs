#![forbid(unsafe_code)]

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config: {0}")]
    Config(String),
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("unknown table: {0}")]
    UnknownTable(String),
    #[error("record not found ({table}.id={id})")]
    RecordNotFound { table: String, id: i64 },
    #[error("circular reference ({table}.id={target} is {record_id} or one of its descendants)")]
    CircularReference {
        table: String,
        record_id: i64,
        target: i64,
    },
    #[error("records of {0} must not be deleted")]
    DeleteForbidden(String),
    #[error("could not derive a unique value for {table}.{column}")]
    UniqueExhausted { table: String, column: String },
    #[error("undo entry {0} is unknown or already restored")]
    UndoUnavailable(i64),
    #[error("observer rejected the operation: {0}")]
    Observer(String),
}

impl StoreError {
    /// Validation failures are raised before anything is written.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_)
                | Self::UnknownTable(_)
                | Self::RecordNotFound { .. }
                | Self::CircularReference { .. }
                | Self::DeleteForbidden(_)
        )
    }
}

#![forbid(unsafe_code)]

pub mod clipboard;
pub mod ordering;
pub mod placement;
pub mod schema;
pub mod value;

pub use clipboard::{Clipboard, ClipboardEntry, ClipboardError, ClipboardMode, Session};
pub use placement::{Placement, Position};
pub use schema::{
    CascadeIntent, CatalogError, FieldPolicy, ParentTable, SchemaCatalog, TableShape,
};
pub use value::{CellValue, Row};

pub mod ids {
    use serde::{Deserialize, Serialize};

    /// Store-assigned primary key of a record.
    pub type RecordId = i64;

    /// Identifier of the actor a mutation is attributed to.
    pub type ActorId = i64;

    /// A validated SQL table name.
    ///
    /// Table names end up inside dynamically built statements, so only
    /// identifiers made of ASCII alphanumerics and `_` are accepted.
    #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(try_from = "String", into = "String")]
    pub struct TableName(String);

    impl TableName {
        pub fn as_str(&self) -> &str {
            &self.0
        }

        pub fn into_string(self) -> String {
            self.0
        }

        pub fn try_new(value: impl Into<String>) -> Result<Self, TableNameError> {
            let value = value.into();
            validate_table_name(&value)?;
            Ok(Self(value))
        }
    }

    impl std::fmt::Display for TableName {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(&self.0)
        }
    }

    impl TryFrom<String> for TableName {
        type Error = TableNameError;

        fn try_from(value: String) -> Result<Self, Self::Error> {
            Self::try_new(value)
        }
    }

    impl From<TableName> for String {
        fn from(value: TableName) -> Self {
            value.0
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum TableNameError {
        Empty,
        TooLong,
        InvalidFirstChar,
        InvalidChar { ch: char, index: usize },
    }

    impl TableNameError {
        pub fn message(&self) -> &'static str {
            match self {
                Self::Empty => "table name must not be empty",
                Self::TooLong => "table name is too long",
                Self::InvalidFirstChar => "table name must start with a letter or '_'",
                Self::InvalidChar { .. } => "table name may only contain [A-Za-z0-9_]",
            }
        }
    }

    impl std::fmt::Display for TableNameError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Self::InvalidChar { ch, index } => {
                    write!(f, "{} (found {ch:?} at {index})", self.message())
                }
                _ => f.write_str(self.message()),
            }
        }
    }

    fn validate_table_name(value: &str) -> Result<(), TableNameError> {
        if value.is_empty() {
            return Err(TableNameError::Empty);
        }
        if value.len() > 64 {
            return Err(TableNameError::TooLong);
        }
        let Some(first) = value.chars().next() else {
            return Err(TableNameError::Empty);
        };
        if !(first.is_ascii_alphabetic() || first == '_') {
            return Err(TableNameError::InvalidFirstChar);
        }
        for (index, ch) in value.chars().enumerate().skip(1) {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                continue;
            }
            return Err(TableNameError::InvalidChar { ch, index });
        }
        Ok(())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn table_name_validation() {
            assert_eq!(TableName::try_new("").unwrap_err(), TableNameError::Empty);
            assert_eq!(
                TableName::try_new("1page").unwrap_err(),
                TableNameError::InvalidFirstChar
            );
            assert_eq!(
                TableName::try_new("tl_page; DROP").unwrap_err(),
                TableNameError::InvalidChar { ch: ';', index: 7 }
            );
            assert_eq!(
                TableName::try_new("x".repeat(65)).unwrap_err(),
                TableNameError::TooLong
            );
            assert!(TableName::try_new("tl_page").is_ok());
            assert!(TableName::try_new("_shadow").is_ok());
        }
    }
}

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One column value, mirroring the SQLite storage classes.
///
/// The serde representation is externally tagged (`{"text": "..."}`,
/// `{"integer": 5}`, `"null"`), which keeps snapshots self-describing even
/// after the column set of a table has changed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellValue {
    #[default]
    Null,
    Integer(i64),
    Real(#[serde(with = "real")] f64),
    Text(String),
    /// TEXT whose bytes are not valid UTF-8, kept verbatim.
    RawText(Vec<u8>),
    Blob(Vec<u8>),
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::Text(value) => value.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// True for NULL and for the empty string.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(value) => value.is_empty(),
            Self::RawText(value) | Self::Blob(value) => value.is_empty(),
            _ => false,
        }
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Option<i64>> for CellValue {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Self::Null, Self::Integer)
    }
}

/// Full column-name to value mapping of one record.
pub type Row = BTreeMap<String, CellValue>;

/// JSON has no literal for infinities or NaN, so those travel as strings.
mod real {
    use serde::de::{self, Unexpected, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub(super) fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("nan")
        } else if value.is_sign_positive() {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        deserializer.deserialize_any(RealVisitor)
    }

    struct RealVisitor;

    impl Visitor<'_> for RealVisitor {
        type Value = f64;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a number or one of \"inf\", \"-inf\", \"nan\"")
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<f64, E> {
            Ok(value)
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<f64, E> {
            Ok(value as f64)
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<f64, E> {
            Ok(value as f64)
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<f64, E> {
            match value {
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                "nan" => Ok(f64::NAN),
                other => Err(E::invalid_value(Unexpected::Str(other), &self)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_json_keeps_value_kinds() {
        let mut row = Row::new();
        row.insert("id".to_string(), CellValue::Integer(7));
        row.insert("title".to_string(), CellValue::text("Home"));
        row.insert("ratio".to_string(), CellValue::Real(0.5));
        row.insert("settings".to_string(), CellValue::Blob(vec![0, 159, 255]));
        row.insert("alias".to_string(), CellValue::Null);

        let json = serde_json::to_string(&row).expect("serialize row");
        assert!(json.contains(r#""title":{"text":"Home"}"#), "{json}");
        assert!(json.contains(r#""alias":"null""#), "{json}");

        let parsed: Row = serde_json::from_str(&json).expect("parse row");
        assert_eq!(parsed, row);
    }

    #[test]
    fn non_finite_reals_and_raw_text_survive_json() {
        let mut row = Row::new();
        row.insert("up".to_string(), CellValue::Real(f64::INFINITY));
        row.insert("down".to_string(), CellValue::Real(f64::NEG_INFINITY));
        row.insert("tiny".to_string(), CellValue::Real(-0.0));
        row.insert("title".to_string(), CellValue::RawText(vec![65, 255, 66]));

        let json = serde_json::to_string(&row).expect("serialize row");
        assert!(json.contains(r#""up":{"real":"inf"}"#), "{json}");
        assert!(json.contains(r#""down":{"real":"-inf"}"#), "{json}");

        let parsed: Row = serde_json::from_str(&json).expect("parse row");
        assert_eq!(parsed, row);

        let nan = serde_json::to_string(&CellValue::Real(f64::NAN)).expect("serialize nan");
        let parsed: CellValue = serde_json::from_str(&nan).expect("parse nan");
        assert!(matches!(parsed, CellValue::Real(value) if value.is_nan()));
        assert!(serde_json::from_str::<CellValue>(r#"{"real":"lots"}"#).is_err());
    }

    #[test]
    fn blank_and_integer_views() {
        assert!(CellValue::Null.is_blank());
        assert!(CellValue::text("").is_blank());
        assert!(!CellValue::Integer(0).is_blank());
        assert_eq!(CellValue::text(" 42 ").as_i64(), Some(42));
        assert_eq!(CellValue::Real(1.0).as_i64(), None);
    }
}

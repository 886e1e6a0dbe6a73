use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt};

/// Semantic type of a column, resolved once from the declared type name.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Text,
    Date,
    DateTime,
    Integer,
    Float,
    Decimal,
    Binary,
    Other,
}

lazy_static! {
    static ref TYPE_MAP: HashMap<&'static str, ColumnType> = build_type_map();
}

impl ColumnType {
    /// Resolves a free-text type name as reported by a driver or written in a
    /// dataset definition. Matching is case-insensitive and ignores any
    /// length/precision suffix such as `varchar(255)` or `numeric(6,2)`.
    pub fn from_type_name(type_name: &str) -> Self {
        let normalized = Self::normalize_type_name(type_name);

        if normalized == "DATE" {
            return ColumnType::Date;
        }
        if normalized.contains("DATETIME") || normalized.starts_with("TIMESTAMP") {
            return ColumnType::DateTime;
        }

        TYPE_MAP
            .get(normalized.as_str())
            .copied()
            .unwrap_or(ColumnType::Other)
    }

    /// Types whose values are rendered between quotes (and whose nulls render
    /// as a quoted empty field).
    pub fn is_quotable(&self) -> bool {
        matches!(
            self,
            ColumnType::Text | ColumnType::Date | ColumnType::DateTime
        )
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, ColumnType::Date | ColumnType::DateTime)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Date => "date",
            ColumnType::DateTime => "datetime",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Decimal => "decimal",
            ColumnType::Binary => "binary",
            ColumnType::Other => "other",
        }
    }

    fn normalize_type_name(type_name: &str) -> String {
        let base = match type_name.find('(') {
            Some(idx) => &type_name[..idx],
            None => type_name,
        };
        base.trim().to_uppercase()
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn build_type_map() -> HashMap<&'static str, ColumnType> {
    use ColumnType::*;

    let entries = [
        ("TEXT", Text),
        ("NTEXT", Text),
        ("STRING", Text),
        ("VARCHAR", Text),
        ("NVARCHAR", Text),
        ("CHARACTER VARYING", Text),
        ("CHAR", Text),
        ("NCHAR", Text),
        ("CHARACTER", Text),
        ("BPCHAR", Text),
        ("NAME", Text),
        ("CITEXT", Text),
        ("JSON", Text),
        ("JSONB", Text),
        ("XML", Text),
        ("SMALLINT", Integer),
        ("TINYINT", Integer),
        ("INT", Integer),
        ("INTEGER", Integer),
        ("BIGINT", Integer),
        ("INT2", Integer),
        ("INT4", Integer),
        ("INT8", Integer),
        ("SMALLSERIAL", Integer),
        ("SERIAL", Integer),
        ("BIGSERIAL", Integer),
        ("OID", Integer),
        ("REAL", Float),
        ("FLOAT", Float),
        ("FLOAT4", Float),
        ("FLOAT8", Float),
        ("DOUBLE", Float),
        ("DOUBLE PRECISION", Float),
        ("NUMERIC", Decimal),
        ("DECIMAL", Decimal),
        ("MONEY", Decimal),
        ("SMALLMONEY", Decimal),
        ("BYTEA", Binary),
        ("BINARY", Binary),
        ("VARBINARY", Binary),
        ("BLOB", Binary),
        ("IMAGE", Binary),
    ];

    let mut map = HashMap::new();
    for (name, column_type) in entries {
        map.insert(name, column_type);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_matches_exact_name_only() {
        assert_eq!(ColumnType::from_type_name("DAte"), ColumnType::Date);
        assert_eq!(ColumnType::from_type_name("date"), ColumnType::Date);
        assert_eq!(ColumnType::from_type_name("daterange"), ColumnType::Other);
    }

    #[test]
    fn test_datetime_variants() {
        for name in [
            "DAteTIME",
            "datetime2",
            "smalldatetime",
            "datetimeoffset",
            "timestamp",
            "timestamptz",
            "timestamp without time zone",
        ] {
            assert_eq!(
                ColumnType::from_type_name(name),
                ColumnType::DateTime,
                "{name}"
            );
        }
    }

    #[test]
    fn test_suffixes_are_ignored() {
        assert_eq!(ColumnType::from_type_name("varchar(255)"), ColumnType::Text);
        assert_eq!(
            ColumnType::from_type_name("numeric(6,2)"),
            ColumnType::Decimal
        );
        assert_eq!(ColumnType::from_type_name(" Float8 "), ColumnType::Float);
    }

    #[test]
    fn test_unknown_names_resolve_to_other() {
        assert_eq!(ColumnType::from_type_name("uuid"), ColumnType::Other);
        assert_eq!(ColumnType::from_type_name("bool"), ColumnType::Other);
        assert_eq!(ColumnType::from_type_name(""), ColumnType::Other);
    }

    #[test]
    fn test_quotable_types() {
        assert!(ColumnType::Text.is_quotable());
        assert!(ColumnType::Date.is_quotable());
        assert!(ColumnType::DateTime.is_quotable());
        assert!(!ColumnType::Decimal.is_quotable());
        assert!(!ColumnType::Binary.is_quotable());
    }
}

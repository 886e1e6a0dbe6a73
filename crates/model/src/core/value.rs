use crate::core::utils::encode_hex_dump;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A single cell as read from a cursor or held in a [`DataTable`](crate::records::table::DataTable).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i64),
    Real(f32),
    Float(f64),
    Decimal(Decimal),
    String(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Uuid(Uuid),
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_empty_string(&self) -> bool {
        matches!(self, Value::String(s) if s.is_empty())
    }

    /// The calendar date/time carried by a temporal value. Dates resolve to
    /// midnight so they can be rendered with a date-time pattern.
    pub fn as_naive_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Date(d) => Some(d.and_time(NaiveTime::MIN)),
            Value::Timestamp(ts) => Some(*ts),
            Value::TimestampTz(ts) => Some(ts.naive_utc()),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Int(_) => "int",
            Value::Real(_) => "real",
            Value::Float(_) => "float",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Timestamp(_) => "timestamp",
            Value::TimestampTz(_) => "timestamptz",
            Value::Uuid(_) => "uuid",
            Value::Json(_) => "json",
        }
    }
}

/// Plain, locale-invariant string conversion. `Null` renders as an empty string.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Real(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Decimal(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
            Value::Bytes(v) => f.write_str(&encode_hex_dump(v)),
            Value::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            Value::Time(v) => write!(f, "{}", v.format("%H:%M:%S%.f")),
            Value::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%.f")),
            Value::TimestampTz(v) => f.write_str(&v.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::Uuid(v) => write!(f, "{v}"),
            Value::Json(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_display_is_invariant() {
        assert_eq!(Value::Real(3000.212).to_string(), "3000.212");
        assert_eq!(Value::Float(1234.543).to_string(), "1234.543");
        assert_eq!(Value::Float(1234.0).to_string(), "1234");
        assert_eq!(
            Value::Decimal(Decimal::from_str("1523.25").unwrap()).to_string(),
            "1523.25"
        );
        assert_eq!(Value::Int(-42).to_string(), "-42");
        assert_eq!(Value::Null.to_string(), "");
    }

    #[test]
    fn test_temporal_display() {
        let date = NaiveDate::from_ymd_opt(2018, 12, 31).unwrap();
        let ts = date.and_hms_opt(11, 22, 33).unwrap();
        assert_eq!(Value::Date(date).to_string(), "2018-12-31");
        assert_eq!(Value::Timestamp(ts).to_string(), "2018-12-31 11:22:33");
        assert_eq!(
            Value::TimestampTz(ts.and_utc()).to_string(),
            "2018-12-31T11:22:33Z"
        );
    }

    #[test]
    fn test_date_as_naive_datetime_is_midnight() {
        let date = NaiveDate::from_ymd_opt(2020, 2, 29).unwrap();
        let dt = Value::Date(date).as_naive_datetime().unwrap();
        assert_eq!(dt, date.and_hms_opt(0, 0, 0).unwrap());
        assert!(Value::Int(1).as_naive_datetime().is_none());
    }

    #[test]
    fn test_empty_string_detection() {
        assert!(Value::String(String::new()).is_empty_string());
        assert!(!Value::String(" ".to_string()).is_empty_string());
        assert!(!Value::Null.is_empty_string());
    }
}

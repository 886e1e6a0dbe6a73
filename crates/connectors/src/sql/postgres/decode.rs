use crate::sql::postgres::wire::{self, BoxError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use model::core::value::Value;
use rust_decimal::Decimal;
use tokio_postgres::{
    Row as PgRow,
    types::{FromSql, Json as PgJson, Kind, Type},
};
use uuid::Uuid;

/// How cells of one result column are read, resolved once from the column's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellDecoder {
    Bool,
    Int2,
    Int4,
    Int8,
    Oid,
    Float4,
    Float8,
    /// Exact: a decimal when it fits, otherwise its text (`NaN`, `1e40`, ...).
    Numeric,
    Money,
    Text,
    Bytes,
    Date,
    Time,
    TimeTz,
    Timestamp,
    TimestampTz,
    Interval,
    Inet,
    Uuid,
    Json,
    /// Enum labels travel as text.
    Enum,
    Array,
    Range,
    /// Any other type: its wire bytes.
    Opaque,
}

impl CellDecoder {
    pub fn for_type(ty: &Type) -> Self {
        let by_type = [
            (Type::BOOL, CellDecoder::Bool),
            (Type::INT2, CellDecoder::Int2),
            (Type::INT4, CellDecoder::Int4),
            (Type::INT8, CellDecoder::Int8),
            (Type::OID, CellDecoder::Oid),
            (Type::FLOAT4, CellDecoder::Float4),
            (Type::FLOAT8, CellDecoder::Float8),
            (Type::NUMERIC, CellDecoder::Numeric),
            (Type::MONEY, CellDecoder::Money),
            (Type::TEXT, CellDecoder::Text),
            (Type::VARCHAR, CellDecoder::Text),
            (Type::BPCHAR, CellDecoder::Text),
            (Type::NAME, CellDecoder::Text),
            (Type::UNKNOWN, CellDecoder::Text),
            (Type::XML, CellDecoder::Text),
            (Type::BYTEA, CellDecoder::Bytes),
            (Type::DATE, CellDecoder::Date),
            (Type::TIME, CellDecoder::Time),
            (Type::TIMETZ, CellDecoder::TimeTz),
            (Type::TIMESTAMP, CellDecoder::Timestamp),
            (Type::TIMESTAMPTZ, CellDecoder::TimestampTz),
            (Type::INTERVAL, CellDecoder::Interval),
            (Type::INET, CellDecoder::Inet),
            (Type::CIDR, CellDecoder::Inet),
            (Type::UUID, CellDecoder::Uuid),
            (Type::JSON, CellDecoder::Json),
            (Type::JSONB, CellDecoder::Json),
        ];

        if let Some((_, decoder)) = by_type.iter().find(|(t, _)| t == ty) {
            return *decoder;
        }

        match ty.kind() {
            Kind::Domain(inner) => Self::for_type(inner),
            Kind::Enum(_) => CellDecoder::Enum,
            Kind::Array(_) => CellDecoder::Array,
            Kind::Range(_) => CellDecoder::Range,
            // citext and friends send plain UTF-8.
            _ if ty.name() == "citext" => CellDecoder::Text,
            _ => CellDecoder::Opaque,
        }
    }

    pub fn decode(&self, row: &PgRow, idx: usize) -> Result<Value, tokio_postgres::Error> {
        let value = match self {
            CellDecoder::Bool => row.try_get::<_, Option<bool>>(idx)?.map(Value::Boolean),
            CellDecoder::Int2 => row
                .try_get::<_, Option<i16>>(idx)?
                .map(|v| Value::Int(v.into())),
            CellDecoder::Int4 => row
                .try_get::<_, Option<i32>>(idx)?
                .map(|v| Value::Int(v.into())),
            CellDecoder::Int8 => row.try_get::<_, Option<i64>>(idx)?.map(Value::Int),
            CellDecoder::Oid => row
                .try_get::<_, Option<u32>>(idx)?
                .map(|v| Value::Int(v.into())),
            CellDecoder::Float4 => row.try_get::<_, Option<f32>>(idx)?.map(Value::Real),
            CellDecoder::Float8 => row.try_get::<_, Option<f64>>(idx)?.map(Value::Float),
            CellDecoder::Date => row.try_get::<_, Option<NaiveDate>>(idx)?.map(Value::Date),
            CellDecoder::Time => row.try_get::<_, Option<NaiveTime>>(idx)?.map(Value::Time),
            CellDecoder::Timestamp => row
                .try_get::<_, Option<NaiveDateTime>>(idx)?
                .map(Value::Timestamp),
            CellDecoder::TimestampTz => row
                .try_get::<_, Option<DateTime<Utc>>>(idx)?
                .map(Value::TimestampTz),
            CellDecoder::Uuid => row.try_get::<_, Option<Uuid>>(idx)?.map(Value::Uuid),
            CellDecoder::Json => row
                .try_get::<_, Option<PgJson<serde_json::Value>>>(idx)?
                .map(|json| Value::Json(json.0)),
            _ => row.try_get::<_, Option<WireCell>>(idx)?.map(|cell| cell.0),
        };

        Ok(value.unwrap_or(Value::Null))
    }

    /// Decodes one non-null binary cell of type `ty`.
    pub fn from_wire(&self, ty: &Type, raw: &[u8]) -> Result<Value, BoxError> {
        let value = match self {
            CellDecoder::Bool => Value::Boolean(bool::from_sql(ty, raw)?),
            CellDecoder::Int2 => Value::Int(i16::from_sql(ty, raw)?.into()),
            CellDecoder::Int4 => Value::Int(i32::from_sql(ty, raw)?.into()),
            CellDecoder::Int8 => Value::Int(i64::from_sql(ty, raw)?),
            CellDecoder::Oid => Value::Int(u32::from_sql(ty, raw)?.into()),
            CellDecoder::Float4 => Value::Real(f32::from_sql(ty, raw)?),
            CellDecoder::Float8 => Value::Float(f64::from_sql(ty, raw)?),
            CellDecoder::Numeric => numeric_value(wire::numeric_text(raw)?),
            CellDecoder::Money => Value::Decimal(Decimal::new(wire::money_cents(raw)?, 2)),
            CellDecoder::Text | CellDecoder::Enum => Value::String(std::str::from_utf8(raw)?.to_string()),
            CellDecoder::Bytes | CellDecoder::Opaque => Value::Bytes(raw.to_vec()),
            CellDecoder::Date => Value::Date(NaiveDate::from_sql(ty, raw)?),
            CellDecoder::Time => Value::Time(NaiveTime::from_sql(ty, raw)?),
            CellDecoder::TimeTz => Value::String(wire::timetz_text(raw)?),
            CellDecoder::Timestamp => Value::Timestamp(NaiveDateTime::from_sql(ty, raw)?),
            CellDecoder::TimestampTz => Value::TimestampTz(DateTime::<Utc>::from_sql(ty, raw)?),
            CellDecoder::Interval => Value::String(wire::interval_text(raw)?),
            CellDecoder::Inet => Value::String(wire::inet_text(raw)?),
            CellDecoder::Uuid => Value::Uuid(Uuid::from_sql(ty, raw)?),
            CellDecoder::Json => Value::Json(PgJson::<serde_json::Value>::from_sql(ty, raw)?.0),
            CellDecoder::Array => {
                let element = element_type(ty)?;
                let decoder = CellDecoder::for_type(element);
                Value::String(wire::array_text(raw, |bytes| {
                    Ok(decoder.from_wire(element, bytes)?.to_string())
                })?)
            }
            CellDecoder::Range => {
                let element = element_type(ty)?;
                let decoder = CellDecoder::for_type(element);
                Value::String(wire::range_text(raw, |bytes| {
                    Ok(decoder.from_wire(element, bytes)?.to_string())
                })?)
            }
        };

        Ok(value)
    }
}

fn element_type(ty: &Type) -> Result<&Type, BoxError> {
    match ty.kind() {
        Kind::Array(element) | Kind::Range(element) => Ok(element),
        Kind::Domain(inner) => element_type(inner),
        _ => Err(format!("type {} has no element type", ty.name()).into()),
    }
}

/// A `Decimal` when the text round-trips through one unchanged.
fn numeric_value(text: String) -> Value {
    match Decimal::from_str_exact(&text) {
        Ok(decimal) if decimal.to_string() == text => Value::Decimal(decimal),
        _ => Value::String(text),
    }
}

/// Accepts any type and decodes it with the decoder its type resolves to.
struct WireCell(Value);

impl<'a> FromSql<'a> for WireCell {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        CellDecoder::for_type(ty).from_wire(ty, raw).map(WireCell)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn numeric(weight: i16, sign: u16, dscale: u16, digits: &[i16]) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&(digits.len() as i16).to_be_bytes());
        raw.extend_from_slice(&weight.to_be_bytes());
        raw.extend_from_slice(&sign.to_be_bytes());
        raw.extend_from_slice(&dscale.to_be_bytes());
        for d in digits {
            raw.extend_from_slice(&d.to_be_bytes());
        }
        raw
    }

    fn wire(ty: &Type, raw: &[u8]) -> Value {
        WireCell::from_sql(ty, raw).unwrap().0
    }

    #[test]
    fn test_decoder_resolution() {
        assert_eq!(CellDecoder::for_type(&Type::INT4), CellDecoder::Int4);
        assert_eq!(CellDecoder::for_type(&Type::VARCHAR), CellDecoder::Text);
        assert_eq!(CellDecoder::for_type(&Type::JSONB), CellDecoder::Json);
        assert_eq!(CellDecoder::for_type(&Type::TIMESTAMPTZ), CellDecoder::TimestampTz);
        assert_eq!(CellDecoder::for_type(&Type::INET), CellDecoder::Inet);
        assert_eq!(CellDecoder::for_type(&Type::INTERVAL), CellDecoder::Interval);
        assert_eq!(CellDecoder::for_type(&Type::INT4_ARRAY), CellDecoder::Array);
        assert_eq!(CellDecoder::for_type(&Type::INT4_RANGE), CellDecoder::Range);
        assert_eq!(CellDecoder::for_type(&Type::POINT), CellDecoder::Opaque);
    }

    #[test]
    fn test_inet_payload() {
        assert_eq!(
            wire(&Type::INET, &[2, 32, 0, 4, 10, 0, 0, 1]),
            Value::String("10.0.0.1".into())
        );
        assert_eq!(
            wire(&Type::CIDR, &[2, 8, 1, 4, 10, 0, 0, 0]),
            Value::String("10.0.0.0/8".into())
        );
    }

    #[test]
    fn test_interval_payload() {
        // '1 day': 0 microseconds, 1 day, 0 months.
        let raw: [u8; 16] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0];
        assert_eq!(wire(&Type::INTERVAL, &raw), Value::String("1 day".into()));
    }

    #[test]
    fn test_money_payload() {
        assert_eq!(
            wire(&Type::MONEY, &12345i64.to_be_bytes()),
            Value::Decimal(Decimal::from_str("123.45").unwrap())
        );
    }

    #[test]
    fn test_timetz_payload() {
        let mut raw = (8 * 3_600_000_000i64).to_be_bytes().to_vec();
        raw.extend_from_slice(&0i32.to_be_bytes());
        assert_eq!(wire(&Type::TIMETZ, &raw), Value::String("08:00:00+00".into()));
    }

    #[test]
    fn test_numeric_fits_decimal() {
        assert_eq!(
            wire(&Type::NUMERIC, &numeric(0, 0x4000, 2, &[1523, 2500])),
            Value::Decimal(Decimal::from_str("-1523.25").unwrap())
        );
    }

    #[test]
    fn test_numeric_nan_and_large_values_keep_their_text() {
        assert_eq!(
            wire(&Type::NUMERIC, &numeric(0, 0xC000, 0, &[])),
            Value::String("NaN".into())
        );

        let big = wire(&Type::NUMERIC, &numeric(10, 0x0000, 0, &[1]));
        assert_eq!(big, Value::String(format!("1{}", "0".repeat(40))));

        // 9.0000000000000000000000000001 needs 29 significant digits.
        let precise = wire(
            &Type::NUMERIC,
            &numeric(0, 0x0000, 28, &[9, 0, 0, 0, 0, 0, 0, 1]),
        );
        assert_eq!(precise, Value::String(format!("9.{}1", "0".repeat(27))));
    }

    #[test]
    fn test_int_array_payload() {
        let mut raw = Vec::new();
        for v in [1i32, 1, 23, 3, 1] {
            raw.extend_from_slice(&v.to_be_bytes());
        }
        for item in [Some(1i32), None, Some(3)] {
            match item {
                Some(v) => {
                    raw.extend_from_slice(&4i32.to_be_bytes());
                    raw.extend_from_slice(&v.to_be_bytes());
                }
                None => raw.extend_from_slice(&(-1i32).to_be_bytes()),
            }
        }
        assert_eq!(wire(&Type::INT4_ARRAY, &raw), Value::String("{1,NULL,3}".into()));
    }

    #[test]
    fn test_text_array_payload() {
        let mut raw = Vec::new();
        for v in [1i32, 0, 25, 2, 1] {
            raw.extend_from_slice(&v.to_be_bytes());
        }
        for item in ["a b", "c"] {
            raw.extend_from_slice(&(item.len() as i32).to_be_bytes());
            raw.extend_from_slice(item.as_bytes());
        }
        assert_eq!(wire(&Type::TEXT_ARRAY, &raw), Value::String("{\"a b\",c}".into()));
    }

    #[test]
    fn test_unknown_types_keep_bytes_not_text() {
        // A point (1, 2): two float8s, not text.
        let mut raw = 1f64.to_be_bytes().to_vec();
        raw.extend_from_slice(&2f64.to_be_bytes());
        assert_eq!(wire(&Type::POINT, &raw), Value::Bytes(raw.clone()));
    }

    #[test]
    fn test_malformed_payload_is_an_error() {
        assert!(WireCell::from_sql(&Type::INET, &[2, 32, 0]).is_err());
        assert!(WireCell::from_sql(&Type::INTERVAL, &[0; 4]).is_err());
    }
}

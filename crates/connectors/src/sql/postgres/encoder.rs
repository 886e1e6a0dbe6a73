use crate::sql::base::encoder::CopyValueEncoder;
use chrono::SecondsFormat;
use model::core::{
    utils::{encode_bytea, escape_csv_string},
    value::Value,
};

/// Encodes values as fields of `COPY ... WITH (FORMAT csv, NULL '\N')`.
///
/// Text-like values are always quoted so an empty string can never be read
/// back as NULL.
pub struct PgCopyValueEncoder;

impl PgCopyValueEncoder {
    pub fn new() -> Self {
        Self
    }

    fn encode_float(value: f64) -> String {
        if value.is_nan() {
            "NaN".to_string()
        } else if value.is_infinite() {
            if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
        } else {
            ryu::Buffer::new().format_finite(value).to_string()
        }
    }

    fn encode_real(value: f32) -> String {
        if value.is_finite() {
            ryu::Buffer::new().format_finite(value).to_string()
        } else {
            Self::encode_float(value as f64)
        }
    }
}

impl Default for PgCopyValueEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CopyValueEncoder for PgCopyValueEncoder {
    fn encode_value(&self, value: &Value) -> String {
        match value {
            Value::Null => self.encode_null(),
            Value::String(s) => escape_csv_string(s),
            Value::Json(v) => escape_csv_string(&v.to_string()),
            Value::Bytes(bytes) => escape_csv_string(&encode_bytea(bytes)),
            Value::Boolean(v) => v.to_string(),
            Value::Int(v) => v.to_string(),
            Value::Real(v) => Self::encode_real(*v),
            Value::Float(v) => Self::encode_float(*v),
            Value::Decimal(v) => v.to_string(),
            Value::Uuid(v) => v.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::Time(t) => t.format("%H:%M:%S%.f").to_string(),
            Value::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            Value::TimestampTz(ts) => ts.to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }

    fn encode_null(&self) -> String {
        "\\N".to_string()
    }
}

use crate::sql::base::{error::QueryError, params::SqlParameter};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use tokio_postgres::types::{Json as PgJson, Kind, ToSql, Type};
use uuid::Uuid;

pub struct PgParam(Box<dyn ToSql + Sync + Send>);

impl PgParam {
    /// Converts a textual parameter to the Rust type matching the server's
    /// declared type for its placeholder.
    pub fn from_text(param: &SqlParameter, ty: &Type) -> Result<Self, QueryError> {
        let raw = param.value.as_str();
        let text = raw.trim();
        let invalid = |message: String| QueryError::InvalidParameter {
            name: param.bare_name().to_string(),
            type_name: ty.name().to_string(),
            value: raw.to_string(),
            message,
        };

        let boxed: Box<dyn ToSql + Sync + Send> = if *ty == Type::INT2 {
            Box::new(text.parse::<i16>().map_err(|e| invalid(e.to_string()))?)
        } else if *ty == Type::INT4 {
            Box::new(text.parse::<i32>().map_err(|e| invalid(e.to_string()))?)
        } else if *ty == Type::INT8 {
            Box::new(text.parse::<i64>().map_err(|e| invalid(e.to_string()))?)
        } else if *ty == Type::OID {
            Box::new(text.parse::<u32>().map_err(|e| invalid(e.to_string()))?)
        } else if *ty == Type::FLOAT4 {
            Box::new(text.parse::<f32>().map_err(|e| invalid(e.to_string()))?)
        } else if *ty == Type::FLOAT8 {
            Box::new(text.parse::<f64>().map_err(|e| invalid(e.to_string()))?)
        } else if *ty == Type::NUMERIC {
            let decimal = Decimal::from_str(text)
                .or_else(|_| Decimal::from_scientific(text))
                .map_err(|e| invalid(e.to_string()))?;
            Box::new(decimal)
        } else if *ty == Type::BOOL {
            Box::new(parse_bool(text).ok_or_else(|| invalid("expected true or false".into()))?)
        } else if *ty == Type::DATE {
            Box::new(
                NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|e| invalid(e.to_string()))?,
            )
        } else if *ty == Type::TIMESTAMP {
            Box::new(parse_naive_datetime(text).ok_or_else(|| invalid("expected a date-time".into()))?)
        } else if *ty == Type::TIMESTAMPTZ {
            Box::new(parse_utc_datetime(text).ok_or_else(|| invalid("expected a date-time".into()))?)
        } else if *ty == Type::UUID {
            Box::new(Uuid::parse_str(text).map_err(|e| invalid(e.to_string()))?)
        } else if *ty == Type::JSON || *ty == Type::JSONB {
            let json: serde_json::Value =
                serde_json::from_str(raw).map_err(|e| invalid(e.to_string()))?;
            Box::new(PgJson(json))
        } else if is_textual(ty) {
            Box::new(raw.to_string())
        } else {
            return Err(QueryError::UnsupportedParameterType {
                name: param.bare_name().to_string(),
                type_name: ty.name().to_string(),
            });
        };

        Ok(PgParam(boxed))
    }
}

impl AsRef<dyn ToSql + Sync> for PgParam {
    fn as_ref(&self) -> &(dyn ToSql + Sync + 'static) {
        &*self.0
    }
}

pub struct PgParamStore {
    pub params: Vec<PgParam>,
}

impl PgParamStore {
    /// Binds `parameters` to a prepared statement's placeholders. `order[n]`
    /// is the parameter for placeholder `$n+1` and `types[n]` its type.
    pub fn bind(
        parameters: &[SqlParameter],
        order: &[usize],
        types: &[Type],
    ) -> Result<Self, QueryError> {
        let params = order
            .iter()
            .zip(types)
            .map(|(index, ty)| PgParam::from_text(&parameters[*index], ty))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { params })
    }

    pub fn as_refs(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params
            .iter()
            .map(|param| param.as_ref())
            .collect::<Vec<_>>()
    }
}

fn is_textual(ty: &Type) -> bool {
    [Type::TEXT, Type::VARCHAR, Type::BPCHAR, Type::NAME, Type::UNKNOWN].contains(ty)
        || matches!(ty.kind(), Kind::Domain(inner) if is_textual(inner))
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "on" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn parse_naive_datetime(text: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// RFC 3339 text keeps its offset; text without one is read as UTC.
fn parse_utc_datetime(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| parse_naive_datetime(text).map(|dt| dt.and_utc()))
}

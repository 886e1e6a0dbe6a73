use crate::{
    core::{column::ColumnDescriptor, data_type::ColumnType, utils::decode_hex, value::Value},
    error::ModelError,
    records::row::Row,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::str::FromStr;

/// An in-memory tabular dataset: named, typed columns plus ordered rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    columns: Vec<ColumnDescriptor>,
    rows: Vec<Row>,
}

#[derive(Debug, Deserialize)]
struct TableDocument {
    columns: Vec<ColumnDocument>,
    #[serde(default)]
    rows: Vec<JsonValue>,
}

#[derive(Debug, Deserialize)]
struct ColumnDocument {
    name: String,
    #[serde(rename = "type", default = "default_type_name")]
    type_name: String,
}

fn default_type_name() -> String {
    "text".to_string()
}

impl DataTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column. Names are unique ignoring ASCII case.
    pub fn add_column(
        &mut self,
        name: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Result<&mut Self, ModelError> {
        let name = name.into();
        if self.column_index(&name).is_some() {
            return Err(ModelError::DuplicateColumn(name));
        }

        let ordinal = self.columns.len();
        self.columns
            .push(ColumnDescriptor::new(name, type_name, ordinal));
        Ok(self)
    }

    pub fn add_row(&mut self, values: Vec<Value>) -> Result<&mut Self, ModelError> {
        if values.len() != self.columns.len() {
            return Err(ModelError::RowArity {
                row: self.rows.len(),
                expected: self.columns.len(),
                actual: values.len(),
            });
        }

        self.rows.push(Row::new(values));
        Ok(self)
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column, preferring an exact match over a case-insensitive one.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .or_else(|| self.columns.iter().position(|c| c.matches(name)))
    }

    /// Builds a table from a JSON document of the form
    /// `{"columns": [{"name": "id", "type": "int"}], "rows": [[1], {"id": 2}]}`.
    ///
    /// Rows may be positional arrays or objects keyed by column name; keys
    /// missing from an object read as null. Cells are converted according to
    /// the column's resolved type.
    pub fn from_json(document: &str) -> Result<Self, ModelError> {
        let doc: TableDocument = serde_json::from_str(document)?;

        let mut table = DataTable::new();
        for column in doc.columns {
            table.add_column(column.name, column.type_name)?;
        }

        for (index, raw) in doc.rows.iter().enumerate() {
            let cells = table.json_row_cells(index, raw)?;
            let values = table
                .columns
                .iter()
                .zip(cells)
                .map(|(column, cell)| json_to_value(column, cell))
                .collect::<Result<Vec<_>, _>>()?;
            table.add_row(values)?;
        }

        Ok(table)
    }

    fn json_row_cells<'a>(
        &self,
        index: usize,
        raw: &'a JsonValue,
    ) -> Result<Vec<&'a JsonValue>, ModelError> {
        match raw {
            JsonValue::Array(items) => {
                if items.len() != self.columns.len() {
                    return Err(ModelError::RowArity {
                        row: index,
                        expected: self.columns.len(),
                        actual: items.len(),
                    });
                }
                Ok(items.iter().collect())
            }
            JsonValue::Object(map) => {
                if let Some(unknown) = map.keys().find(|key| self.column_index(key).is_none()) {
                    return Err(ModelError::UnknownColumn(unknown.clone()));
                }

                Ok(self
                    .columns
                    .iter()
                    .map(|column| {
                        map.get(&column.name)
                            .or_else(|| {
                                map.iter()
                                    .find(|(key, _)| column.matches(key))
                                    .map(|(_, value)| value)
                            })
                            .unwrap_or(&JsonValue::Null)
                    })
                    .collect())
            }
            other => Err(ModelError::InvalidValue {
                column: format!("<row {index}>"),
                message: format!("expected an array or object, got {other}"),
            }),
        }
    }
}

fn json_to_value(column: &ColumnDescriptor, json: &JsonValue) -> Result<Value, ModelError> {
    if json.is_null() {
        return Ok(Value::Null);
    }
    // Blank cells of typed columns stay empty strings so a load can send them as NULL.
    if column.column_type != ColumnType::Text && json.as_str().is_some_and(|s| s.trim().is_empty()) {
        return Ok(Value::String(String::new()));
    }

    let invalid = |message: String| ModelError::InvalidValue {
        column: column.name.clone(),
        message,
    };

    match column.column_type {
        ColumnType::Text => Ok(Value::String(match json {
            JsonValue::String(s) => s.clone(),
            other => other.to_string(),
        })),
        ColumnType::Integer => match json {
            JsonValue::Number(n) => n
                .as_i64()
                .map(Value::Int)
                .ok_or_else(|| invalid(format!("{n} is not an integer"))),
            JsonValue::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| invalid(format!("'{s}': {e}"))),
            other => Err(invalid(format!("expected an integer, got {other}"))),
        },
        ColumnType::Float => match json {
            JsonValue::Number(n) => n
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| invalid(format!("{n} is not a number"))),
            JsonValue::String(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| invalid(format!("'{s}': {e}"))),
            other => Err(invalid(format!("expected a number, got {other}"))),
        },
        ColumnType::Decimal => {
            let text = match json {
                JsonValue::Number(n) => n.to_string(),
                JsonValue::String(s) => s.trim().to_string(),
                other => return Err(invalid(format!("expected a decimal, got {other}"))),
            };
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .map(Value::Decimal)
                .map_err(|e| invalid(format!("'{text}': {e}")))
        }
        ColumnType::Date => {
            let text = json
                .as_str()
                .ok_or_else(|| invalid(format!("expected a date string, got {json}")))?;
            NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
                .map(Value::Date)
                .map_err(|e| invalid(format!("'{text}': {e}")))
        }
        ColumnType::DateTime => {
            let text = json
                .as_str()
                .ok_or_else(|| invalid(format!("expected a date-time string, got {json}")))?;
            parse_datetime(text.trim()).ok_or_else(|| invalid(format!("'{text}' is not a date-time")))
        }
        ColumnType::Binary => match json {
            JsonValue::String(s) => decode_hex(s)
                .map(Value::Bytes)
                .ok_or_else(|| invalid(format!("'{s}' is not hex-encoded"))),
            JsonValue::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_u64()
                        .and_then(|b| u8::try_from(b).ok())
                        .ok_or_else(|| invalid(format!("{item} is not a byte")))
                })
                .collect::<Result<Vec<u8>, _>>()
                .map(Value::Bytes),
            other => Err(invalid(format!("expected bytes, got {other}"))),
        },
        ColumnType::Other => Ok(match json {
            JsonValue::Bool(b) => Value::Boolean(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            JsonValue::String(s) => Value::String(s.clone()),
            other => Value::Json(other.clone()),
        }),
    }
}

fn parse_datetime(text: &str) -> Option<Value> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(Value::TimestampTz(ts.with_timezone(&Utc)));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(Value::Timestamp)
}

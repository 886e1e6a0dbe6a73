use crate::{error::ExportError, pattern::DatePattern};
use model::{
    core::{column::ColumnDescriptor, data_type::ColumnType, utils::encode_hex_dump, value::Value},
    options::format::FormatOptions,
};

const QUOTED_EMPTY: &str = "\"\"";

/// Turns single cells into CSV-safe tokens.
///
/// Date patterns are compiled once when the formatter is built, so a
/// formatter is meant to be created per streaming call and reused for every
/// cell of that call.
#[derive(Debug, Clone)]
pub struct ValueFormatter {
    date: DatePattern,
    date_time: DatePattern,
    quote_dates: bool,
    quote_strings: bool,
}

impl ValueFormatter {
    pub fn new(options: &FormatOptions) -> Result<Self, ExportError> {
        Ok(ValueFormatter {
            date: DatePattern::compile(&options.date_format)?,
            date_time: DatePattern::compile(&options.date_time_format)?,
            quote_dates: options.quote_dates,
            quote_strings: options.quote_strings,
        })
    }

    pub fn format(&self, value: &Value, column: &ColumnDescriptor) -> String {
        self.format_as(value, column.column_type)
    }

    pub fn format_as(&self, value: &Value, column_type: ColumnType) -> String {
        if value.is_null() {
            return if column_type.is_quotable() {
                QUOTED_EMPTY.to_string()
            } else {
                String::new()
            };
        }

        match column_type {
            ColumnType::Text => {
                let text = collapse_line_breaks(&value.to_string());
                if self.quote_strings {
                    quote(&text.replace('"', "\\\""))
                } else {
                    text
                }
            }
            ColumnType::Date => self.format_temporal(value, &self.date),
            ColumnType::DateTime => self.format_temporal(value, &self.date_time),
            ColumnType::Binary => match value {
                Value::Bytes(bytes) => encode_hex_dump(bytes),
                other => other.to_string(),
            },
            ColumnType::Integer | ColumnType::Float | ColumnType::Decimal | ColumnType::Other => {
                value.to_string()
            }
        }
    }

    fn format_temporal(&self, value: &Value, pattern: &DatePattern) -> String {
        let text = match value.as_naive_datetime() {
            Some(dt) => pattern.format(&dt, matches!(value, Value::TimestampTz(_))),
            None => value.to_string(),
        };

        if self.quote_dates { quote(&text) } else { text }
    }
}

fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    out.push_str(text);
    out.push('"');
    out
}

/// Replaces every `\r\n`, `\r` and `\n` with a single space.
fn collapse_line_breaks(text: &str) -> String {
    if !text.contains(['\r', '\n']) {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\r' => {
                chars.next_if_eq(&'\n');
                out.push(' ');
            }
            '\n' => out.push(' '),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn formatter(options: &FormatOptions) -> ValueFormatter {
        ValueFormatter::new(options).unwrap()
    }

    fn column(type_name: &str) -> ColumnDescriptor {
        ColumnDescriptor::new("col", type_name, 0)
    }

    fn sample_timestamp() -> Value {
        Value::Timestamp(
            NaiveDate::from_ymd_opt(2018, 12, 31)
                .unwrap()
                .and_hms_opt(11, 22, 33)
                .unwrap(),
        )
    }

    #[test]
    fn test_text_quotes_are_backslash_escaped() {
        let f = formatter(&FormatOptions::default());
        let value = Value::String("Hello\"semicolon1".to_string());
        assert_eq!(f.format(&value, &column("nvarchar")), r#""Hello\"semicolon1""#);
        let value = Value::String("a\"\"b".to_string());
        assert_eq!(f.format(&value, &column("text")), r#""a\"\"b""#);
    }

    #[test]
    fn test_text_line_breaks_collapse_to_one_space() {
        let f = formatter(&FormatOptions::default());
        let value = Value::String("a\r\nb\rc\nd\n\ne".to_string());
        let token = f.format(&value, &column("varchar(10)"));
        assert_eq!(token, "\"a b c d  e\"");
        assert!(!token.contains(['\r', '\n']));
    }

    #[test]
    fn test_unquoted_strings() {
        let options = FormatOptions {
            quote_strings: false,
            ..Default::default()
        };
        let f = formatter(&options);
        let value = Value::String("say \"hi\"\nthere".to_string());
        assert_eq!(f.format(&value, &column("text")), "say \"hi\" there");
        assert_eq!(f.format(&Value::Null, &column("text")), "\"\"");
    }

    #[test]
    fn test_nulls_follow_column_type() {
        let f = formatter(&FormatOptions::default());
        for quotable in ["nvarchar", "date", "datetime", "timestamptz"] {
            assert_eq!(f.format(&Value::Null, &column(quotable)), "\"\"", "{quotable}");
        }
        for plain in ["float", "double precision", "numeric", "int", "bytea", "uuid"] {
            assert_eq!(f.format(&Value::Null, &column(plain)), "", "{plain}");
        }
    }

    #[test]
    fn test_dates_with_custom_patterns() {
        let options = FormatOptions {
            date_format: "dd-MM_yyyy".to_string(),
            date_time_format: "dd-MM_yyyy HH:mm:ss".to_string(),
            ..Default::default()
        };
        let f = formatter(&options);
        let date = Value::Date(NaiveDate::from_ymd_opt(2018, 12, 31).unwrap());
        assert_eq!(f.format(&date, &column("DAte")), "\"31-12_2018\"");
        assert_eq!(
            f.format(&sample_timestamp(), &column("DAteTIME")),
            "\"31-12_2018 11:22:33\""
        );
    }

    #[test]
    fn test_date_quoting_can_be_disabled() {
        let options = FormatOptions {
            quote_dates: false,
            date_time_format: "MM-dd-yyyy HH:mm:ss".to_string(),
            ..Default::default()
        };
        let f = formatter(&options);
        assert_eq!(
            f.format(&sample_timestamp(), &column("datetime")),
            "12-31-2018 11:22:33"
        );
        // Nulls of date columns stay quoted-empty regardless of the flag.
        assert_eq!(f.format(&Value::Null, &column("date")), "\"\"");
    }

    #[test]
    fn test_numbers_are_invariant_and_unquoted() {
        let f = formatter(&FormatOptions::default());
        assert_eq!(f.format(&Value::Real(3000.212), &column("real")), "3000.212");
        assert_eq!(f.format(&Value::Float(1234.543), &column("float")), "1234.543");
        assert_eq!(
            f.format(&Value::Float(1234.543), &column("double precision")),
            "1234.543"
        );
        assert_eq!(
            f.format(
                &Value::Decimal(Decimal::from_str("1234.543").unwrap()),
                &column("decimal(10,3)")
            ),
            "1234.543"
        );
        assert_eq!(f.format(&Value::Int(1_000_000), &column("bigint")), "1000000");
    }

    #[test]
    fn test_binary_and_other_types() {
        let f = formatter(&FormatOptions::default());
        assert_eq!(
            f.format(&Value::Bytes(vec![0xff, 0xa0, 0x01]), &column("varbinary")),
            "FF-A0-01"
        );
        assert_eq!(f.format(&Value::Boolean(true), &column("bool")), "true");
    }

    #[test]
    fn test_invalid_pattern_is_a_configuration_error() {
        let options = FormatOptions {
            date_format: "'yyyy".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            ValueFormatter::new(&options),
            Err(ExportError::Pattern { .. })
        ));
    }
}

use crate::{error::ModelError, options::normalize_variant};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum FieldDelimiter {
    Comma,
    #[default]
    Semicolon,
    Pipe,
}

impl FieldDelimiter {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldDelimiter::Comma => ",",
            FieldDelimiter::Semicolon => ";",
            FieldDelimiter::Pipe => "|",
        }
    }
}

impl FromStr for FieldDelimiter {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_variant(s).as_str() {
            "comma" | "," => Ok(FieldDelimiter::Comma),
            "semicolon" | ";" => Ok(FieldDelimiter::Semicolon),
            "pipe" | "|" => Ok(FieldDelimiter::Pipe),
            _ => Err(ModelError::UnknownVariant {
                kind: "field delimiter",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for FieldDelimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum LineBreak {
    #[default]
    Crlf,
    Lf,
    Cr,
}

impl LineBreak {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineBreak::Crlf => "\r\n",
            LineBreak::Lf => "\n",
            LineBreak::Cr => "\r",
        }
    }
}

impl FromStr for LineBreak {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_variant(s).as_str() {
            "crlf" => Ok(LineBreak::Crlf),
            "lf" => Ok(LineBreak::Lf),
            "cr" => Ok(LineBreak::Cr),
            _ => Err(ModelError::UnknownVariant {
                kind: "line break",
                value: s.to_string(),
            }),
        }
    }
}

/// Character encoding of a written CSV file.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum FileEncoding {
    #[default]
    Utf8,
    /// Windows-1252.
    Ansi,
    /// 7-bit ASCII; other characters are written as `?`.
    Ascii,
    /// UTF-16 little endian, always with a byte order mark.
    Unicode,
    /// The encoding named by `encoding_name`.
    Other,
}

impl FromStr for FileEncoding {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_variant(s).as_str() {
            "utf8" => Ok(FileEncoding::Utf8),
            "ansi" => Ok(FileEncoding::Ansi),
            "ascii" => Ok(FileEncoding::Ascii),
            "unicode" | "utf16" => Ok(FileEncoding::Unicode),
            "other" => Ok(FileEncoding::Other),
            _ => Err(ModelError::UnknownVariant {
                kind: "file encoding",
                value: s.to_string(),
            }),
        }
    }
}

/// Controls how a result set is rendered as CSV. Every field is optional when
/// deserialized; missing fields take the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FormatOptions {
    /// Columns to emit, in output order. Empty means every column in source order.
    pub columns_to_include: Vec<String>,
    pub field_delimiter: FieldDelimiter,
    pub line_break: LineBreak,
    pub include_headers: bool,
    pub sanitize_headers: bool,
    #[serde(alias = "add_quotes_to_dates")]
    pub quote_dates: bool,
    #[serde(alias = "add_quotes_to_strings")]
    pub quote_strings: bool,
    pub date_format: String,
    pub date_time_format: String,
    pub file_encoding: FileEncoding,
    /// Encoding label (`windows-1257`, `iso-8859-15`, ...) used with [`FileEncoding::Other`].
    #[serde(alias = "encoding_in_string")]
    pub encoding_name: Option<String>,
    /// Start UTF-8 output with a byte order mark. Other encodings ignore it.
    pub enable_bom: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        FormatOptions {
            columns_to_include: Vec::new(),
            field_delimiter: FieldDelimiter::Semicolon,
            line_break: LineBreak::Crlf,
            include_headers: true,
            sanitize_headers: true,
            quote_dates: true,
            quote_strings: true,
            date_format: "yyyy-MM-dd".to_string(),
            date_time_format: "yyyy-MM-dd HH:mm:ss".to_string(),
            file_encoding: FileEncoding::Utf8,
            encoding_name: None,
            enable_bom: false,
        }
    }
}

impl FormatOptions {
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        Ok(serde_json::from_str(json)?)
    }
}

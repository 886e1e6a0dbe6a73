use clap::{Args, Subcommand};
use connectors::sql::base::params::SqlParameter;
use model::options::{
    format::{FieldDelimiter, FileEncoding, FormatOptions, LineBreak},
    load::{IsolationLevel, LoadOptions},
};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run a query and write the result to a CSV file
    Export(ExportArgs),

    /// Bulk-load a JSON dataset into a table
    Load(LoadArgs),

    /// Test a connection string
    TestConn {
        /// Connection string (`${VAR}` references are expanded)
        #[arg(long)]
        conn_str: String,
    },
}

#[derive(Args)]
pub struct ExportArgs {
    /// Connection string (`${VAR}` references are expanded)
    #[arg(long)]
    pub conn_str: String,

    #[arg(long, conflicts_with = "query_file", required_unless_present = "query_file")]
    pub query: Option<String>,

    #[arg(long, help = "Read the query from this file")]
    pub query_file: Option<PathBuf>,

    /// Query parameter as NAME=VALUE; referenced in the query as @NAME
    #[arg(long = "param", value_parser = parse_param)]
    pub params: Vec<SqlParameter>,

    #[arg(long, default_value_t = 30, help = "Statement timeout in seconds, 0 for none")]
    pub timeout_seconds: u64,

    #[arg(long, help = "CSV file to write")]
    pub output: PathBuf,

    #[command(flatten)]
    pub format: FormatArgs,

    #[arg(long, help = "Write the JSON summary to this file instead of stdout")]
    pub summary: Option<PathBuf>,
}

#[derive(Args)]
pub struct FormatArgs {
    #[arg(long, help = "JSON file with format options; flags below override it")]
    pub options: Option<PathBuf>,

    #[arg(long, help = "comma, semicolon or pipe")]
    pub delimiter: Option<FieldDelimiter>,

    #[arg(long, help = "crlf, lf or cr")]
    pub line_break: Option<LineBreak>,

    #[arg(long, value_delimiter = ',', help = "Columns to include, in output order")]
    pub columns: Vec<String>,

    #[arg(long)]
    pub no_headers: bool,

    #[arg(long, help = "Keep header names exactly as returned by the query")]
    pub raw_headers: bool,

    #[arg(long)]
    pub no_date_quotes: bool,

    #[arg(long)]
    pub no_string_quotes: bool,

    #[arg(long)]
    pub date_format: Option<String>,

    #[arg(long)]
    pub date_time_format: Option<String>,

    #[arg(long, help = "utf8, ansi, ascii, unicode or other")]
    pub encoding: Option<FileEncoding>,

    #[arg(long, help = "Encoding label used with --encoding other, e.g. windows-1257")]
    pub encoding_name: Option<String>,

    #[arg(long, help = "Start UTF-8 or UTF-16 output with a byte order mark")]
    pub bom: bool,
}

impl FormatArgs {
    pub fn apply(&self, mut options: FormatOptions) -> FormatOptions {
        if let Some(delimiter) = self.delimiter {
            options.field_delimiter = delimiter;
        }
        if let Some(line_break) = self.line_break {
            options.line_break = line_break;
        }
        if !self.columns.is_empty() {
            options.columns_to_include = self.columns.clone();
        }
        if let Some(format) = &self.date_format {
            options.date_format = format.clone();
        }
        if let Some(format) = &self.date_time_format {
            options.date_time_format = format.clone();
        }
        options.include_headers &= !self.no_headers;
        options.sanitize_headers &= !self.raw_headers;
        options.quote_dates &= !self.no_date_quotes;
        options.quote_strings &= !self.no_string_quotes;
        if let Some(encoding) = self.encoding {
            options.file_encoding = encoding;
        }
        if let Some(name) = &self.encoding_name {
            options.file_encoding = FileEncoding::Other;
            options.encoding_name = Some(name.clone());
        }
        options.enable_bom |= self.bom;
        options
    }
}

#[derive(Args)]
pub struct LoadArgs {
    /// Connection string (`${VAR}` references are expanded)
    #[arg(long)]
    pub conn_str: String,

    #[arg(long, help = "Destination table, optionally schema-qualified")]
    pub table: String,

    #[arg(long, help = "JSON dataset: {\"columns\": [...], \"rows\": [...]}")]
    pub data: PathBuf,

    #[arg(long, help = "JSON file with load options; flags below override it")]
    pub options: Option<PathBuf>,

    #[arg(long)]
    pub timeout_seconds: Option<u64>,

    #[arg(long)]
    pub isolation_level: Option<IsolationLevel>,

    #[arg(long)]
    pub fire_triggers: bool,

    #[arg(long)]
    pub keep_identity: bool,

    #[arg(long)]
    pub empty_as_null: bool,

    #[arg(long, help = "Write the JSON summary to this file instead of stdout")]
    pub summary: Option<PathBuf>,
}

impl LoadArgs {
    pub fn apply(&self, mut options: LoadOptions) -> LoadOptions {
        if let Some(timeout) = self.timeout_seconds {
            options.command_timeout_seconds = timeout;
        }
        if let Some(level) = self.isolation_level {
            options.isolation_level = level;
        }
        options.fire_triggers |= self.fire_triggers;
        options.keep_identity |= self.keep_identity;
        options.convert_empty_to_null |= self.empty_as_null;
        options
    }
}

fn parse_param(raw: &str) -> Result<SqlParameter, String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty parameter name in '{raw}'"));
    }
    Ok(SqlParameter::new(name, value))
}

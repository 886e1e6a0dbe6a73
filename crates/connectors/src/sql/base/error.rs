use std::time::Duration;
use thiserror::Error;

/// Errors happening while opening a session.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Invalid connection string: {0}")]
    InvalidUrl(String),

    #[error("TLS setup failed: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("Postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),
}

/// Errors raised while preparing or running a query.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    #[error("Query failed: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("Parameter '@{0}' is supplied more than once")]
    DuplicateParameter(String),

    #[error("Parameter '@{0}' is not referenced by the query")]
    UnusedParameter(String),

    #[error("Value '{value}' for parameter '@{name}' is not a valid {type_name}: {message}")]
    InvalidParameter {
        name: String,
        type_name: String,
        value: String,
        message: String,
    },

    #[error("Parameter '@{name}' has unsupported type {type_name}; cast it in the query (e.g. @{name}::text)")]
    UnsupportedParameterType { name: String, type_name: String },
}

/// Errors raised by a bulk load. Every variant means nothing can be assumed
/// about the destination beyond what the server committed.
#[derive(Debug, Error)]
pub enum BulkLoadError {
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    #[error("Destination table '{0}' does not exist")]
    UnknownTable(String),

    #[error("Column '{column}' has no counterpart in destination table '{table}'")]
    UnmappedColumn { column: String, table: String },

    #[error("Column '{column}' matches more than one column of '{table}' when case is ignored")]
    AmbiguousColumn { column: String, table: String },

    #[error("No dataset column is left to copy into '{0}'")]
    NoColumns(String),

    #[error("Bulk copy failed: {0}")]
    Copy(#[from] tokio_postgres::Error),

    #[error("Bulk copy timed out after {0:?}")]
    Timeout(Duration),

    #[error("Bulk copy was cancelled")]
    Cancelled,
}

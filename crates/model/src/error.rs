use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    /// A configuration enumerant (delimiter, line break, isolation level) was not recognised.
    #[error("Unknown {kind}: '{value}'")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("Duplicate column name: '{0}'")]
    DuplicateColumn(String),

    #[error("Unknown column: '{0}'")]
    UnknownColumn(String),

    #[error("Row {row} has {actual} values but the table has {expected} columns")]
    RowArity {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid value for column '{column}': {message}")]
    InvalidValue { column: String, message: String },

    #[error("Invalid dataset document: {0}")]
    Json(#[from] serde_json::Error),
}

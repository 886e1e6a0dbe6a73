use model::records::cursor::CursorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    /// A column named in `columns_to_include` does not exist in the result set.
    #[error("Column '{0}' is not present in the result set")]
    UnknownColumn(String),

    #[error("Invalid date pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    /// `encoding_name` is not a known encoding label.
    #[error("Unsupported file encoding '{0}'")]
    UnsupportedEncoding(String),

    /// The cursor failed while rows were being read.
    #[error("Source read failed: {0}")]
    Source(#[from] CursorError),

    #[error("Write failed: {0}")]
    Io(#[from] std::io::Error),
}

use connectors::sql::base::error::{BulkLoadError, QueryError};
use csv_export::ExportError;
use model::error::ModelError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    BulkLoad(#[from] BulkLoadError),

    #[error("Invalid input data: {0}")]
    Dataset(#[from] ModelError),

    #[error("Cannot write '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The export was cancelled; `rows` rows were written and flushed.
    #[error("Export cancelled after {rows} rows")]
    Cancelled { rows: u64 },
}

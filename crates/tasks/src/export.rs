use crate::error::TaskError;
use connectors::sql::postgres::{QueryRequest, QueryRunner};
use csv_export::{CsvEmitter, EncodingWriter, OutputEncoding, PreparedExport};
use model::{options::format::FormatOptions, records::cursor::RowCursor};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportInput {
    #[serde(flatten)]
    pub query: QueryRequest,
    pub output_file_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportOutput {
    pub rows: u64,
    pub path: PathBuf,
}

/// Runs a query and writes its result to a CSV file.
///
/// The query is prepared before the file is touched, so parameter and
/// connection errors leave no file behind.
pub async fn save_query_to_csv(
    input: &ExportInput,
    options: &FormatOptions,
    cancel: &CancellationToken,
) -> Result<ExportOutput, TaskError> {
    let mut cursor = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(TaskError::Cancelled { rows: 0 }),
        cursor = QueryRunner::open(&input.query) => cursor?,
    };

    let result = export_cursor_to_path(&mut cursor, &input.output_file_path, options, cancel).await;
    if matches!(result, Err(TaskError::Cancelled { .. })) {
        cursor.canceller().cancel().await;
    }

    Ok(ExportOutput {
        rows: result?,
        path: input.output_file_path.clone(),
    })
}

/// Validates `options` against `cursor`, then creates (or truncates) `path`,
/// writes the byte order mark the encoding calls for and streams `cursor`
/// into it.
///
/// Option errors leave an existing file untouched. Whatever was written is
/// flushed on every later exit: a failed stream keeps its partial output, and
/// a cancelled one is reported as [`TaskError::Cancelled`].
pub async fn export_cursor_to_path<C>(
    cursor: &mut C,
    path: &Path,
    options: &FormatOptions,
    cancel: &CancellationToken,
) -> Result<u64, TaskError>
where
    C: RowCursor + ?Sized,
{
    let io_error = |source: std::io::Error| TaskError::Io {
        path: path.to_path_buf(),
        source,
    };

    let prepared = PreparedExport::new(cursor.columns(), options)?;
    let encoding = OutputEncoding::resolve(options)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
    }

    let mut file = File::create(path).map_err(io_error)?;
    file.write_all(encoding.preamble(options.enable_bom))
        .map_err(io_error)?;
    debug!(encoding = encoding.name(), path = %path.display(), "Opened CSV output");

    let mut emitter = CsvEmitter::from_options(EncodingWriter::new(file, encoding), options);
    let streamed = prepared.stream(cursor, &mut emitter, cancel).await;

    let closed = emitter.finish().and_then(EncodingWriter::finish);
    if let Err(err) = closed {
        if streamed.is_ok() {
            return Err(io_error(err));
        }
        warn!(%err, path = %path.display(), "Failed to flush partial CSV output");
    }

    let rows = streamed?;
    if cancel.is_cancelled() {
        warn!(rows, path = %path.display(), "CSV export cancelled");
        return Err(TaskError::Cancelled { rows });
    }

    info!(rows, path = %path.display(), "CSV export written");
    Ok(rows)
}

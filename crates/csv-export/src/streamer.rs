use crate::{emitter::CsvEmitter, error::ExportError, header::format_header, value::ValueFormatter};
use model::{
    core::column::ColumnDescriptor, options::format::FormatOptions, records::cursor::RowCursor,
};
use std::io::Write;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Everything about an export that can be checked before any output exists:
/// the date patterns and the column projection.
#[derive(Debug)]
pub struct PreparedExport {
    formatter: ValueFormatter,
    projection: Vec<ColumnDescriptor>,
    include_headers: bool,
    sanitize_headers: bool,
}

impl PreparedExport {
    /// Validates `options` against the result set described by `columns`.
    pub fn new(columns: &[ColumnDescriptor], options: &FormatOptions) -> Result<Self, ExportError> {
        let formatter = ValueFormatter::new(options)?;
        let projection = resolve_projection(columns, &options.columns_to_include)?;

        debug!(
            columns = ?projection.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            "Resolved CSV column projection"
        );

        Ok(PreparedExport {
            formatter,
            projection,
            include_headers: options.include_headers,
            sanitize_headers: options.sanitize_headers,
        })
    }

    pub fn projection(&self) -> &[ColumnDescriptor] {
        &self.projection
    }

    /// Streams every row of `cursor` into `emitter` and returns the number of
    /// data rows written (the header is not counted).
    ///
    /// Only one row is held at a time. Cancellation is checked before each row
    /// and while waiting on the cursor; it stops the stream without writing a
    /// partial record and without an error. Nothing is flushed here: the
    /// caller owns the emitter and decides when output is durable.
    pub async fn stream<C, W>(
        &self,
        cursor: &mut C,
        emitter: &mut CsvEmitter<W>,
        cancel: &CancellationToken,
    ) -> Result<u64, ExportError>
    where
        C: RowCursor + ?Sized,
        W: Write,
    {
        if self.include_headers {
            emitter.write_record(
                self.projection
                    .iter()
                    .map(|column| format_header(&column.name, self.sanitize_headers)),
            )?;
        }

        let mut rows: u64 = 0;
        let mut fields = Vec::with_capacity(self.projection.len());

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                row = cursor.next_row() => row?,
            };

            let Some(row) = next else {
                break;
            };

            fields.clear();
            fields.extend(
                self.projection
                    .iter()
                    .map(|column| self.formatter.format(row.value(column.ordinal), column)),
            );
            emitter.write_record(&fields)?;
            rows += 1;
        }

        info!(
            rows,
            cancelled = cancel.is_cancelled(),
            "CSV stream finished"
        );

        Ok(rows)
    }
}

/// Validates `options` against `cursor` and streams it into `emitter`.
/// See [`PreparedExport::stream`].
pub async fn stream_to_csv<C, W>(
    cursor: &mut C,
    emitter: &mut CsvEmitter<W>,
    options: &FormatOptions,
    cancel: &CancellationToken,
) -> Result<u64, ExportError>
where
    C: RowCursor + ?Sized,
    W: Write,
{
    PreparedExport::new(cursor.columns(), options)?
        .stream(cursor, emitter, cancel)
        .await
}

/// Columns to emit, in output order. An empty allow-list selects every column
/// in source order; otherwise names are matched ignoring case, preferring an
/// exact match.
pub fn resolve_projection(
    columns: &[ColumnDescriptor],
    include: &[String],
) -> Result<Vec<ColumnDescriptor>, ExportError> {
    if include.is_empty() {
        return Ok(columns.to_vec());
    }

    include
        .iter()
        .map(|name| {
            columns
                .iter()
                .find(|c| c.name == *name)
                .or_else(|| columns.iter().find(|c| c.matches(name)))
                .cloned()
                .ok_or_else(|| ExportError::UnknownColumn(name.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use model::{
        core::value::Value,
        options::format::{FieldDelimiter, LineBreak},
        records::{
            cursor::{CursorError, TableCursor},
            row::Row,
            table::DataTable,
        },
    };

    fn sample_table() -> DataTable {
        let mut table = DataTable::new();
        table
            .add_column("COL_StrING", "nvarchar")
            .unwrap()
            .add_column("col_datetime", "datetime")
            .unwrap()
            .add_column("Col_float", "real")
            .unwrap();
        table
            .add_row(vec![
                Value::String("Hello\"world".to_string()),
                Value::Timestamp(
                    NaiveDate::from_ymd_opt(2018, 12, 31)
                        .unwrap()
                        .and_hms_opt(11, 22, 33)
                        .unwrap(),
                ),
                Value::Real(3000.212),
            ])
            .unwrap();
        table
            .add_row(vec![Value::Null, Value::Null, Value::Null])
            .unwrap();
        table
    }

    async fn stream(table: &DataTable, options: &FormatOptions) -> (u64, String) {
        let mut cursor = TableCursor::new(table);
        let mut emitter = CsvEmitter::from_options(Vec::new(), options);
        let rows = stream_to_csv(&mut cursor, &mut emitter, options, &CancellationToken::new())
            .await
            .unwrap();
        let out = String::from_utf8(emitter.finish().unwrap()).unwrap();
        (rows, out)
    }

    #[tokio::test]
    async fn test_headers_and_rows() {
        let options = FormatOptions {
            quote_dates: false,
            date_time_format: "MM-dd-yyyy HH:mm:ss".to_string(),
            ..Default::default()
        };
        let (rows, out) = stream(&sample_table(), &options).await;

        assert_eq!(rows, 2);
        assert_eq!(
            out,
            "col_string;col_datetime;col_float\r\n\
             \"Hello\\\"world\";12-31-2018 11:22:33;3000.212\r\n\
             \"\";\"\";\r\n"
        );
    }

    #[tokio::test]
    async fn test_allow_list_reorders_and_ignores_case() {
        let options = FormatOptions {
            columns_to_include: vec!["col_float".to_string(), "col_string".to_string()],
            field_delimiter: FieldDelimiter::Pipe,
            line_break: LineBreak::Lf,
            sanitize_headers: false,
            ..Default::default()
        };
        let (rows, out) = stream(&sample_table(), &options).await;

        assert_eq!(rows, 2);
        assert_eq!(
            out,
            "Col_float|COL_StrING\n3000.212|\"Hello\\\"world\"\n|\"\"\n"
        );
    }

    #[tokio::test]
    async fn test_full_allow_list_matches_empty_allow_list() {
        let table = sample_table();
        let all = FormatOptions {
            columns_to_include: table.columns().iter().map(|c| c.name.clone()).collect(),
            ..Default::default()
        };
        let (_, with_list) = stream(&table, &all).await;
        let (_, without_list) = stream(&table, &FormatOptions::default()).await;
        assert_eq!(with_list, without_list);
    }

    #[tokio::test]
    async fn test_unknown_column_fails_before_output() {
        let table = sample_table();
        let options = FormatOptions {
            columns_to_include: vec!["missing".to_string()],
            ..Default::default()
        };
        let mut cursor = TableCursor::new(&table);
        let mut emitter = CsvEmitter::from_options(Vec::new(), &options);
        let err = stream_to_csv(&mut cursor, &mut emitter, &options, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ExportError::UnknownColumn(name) if name == "missing"));
        assert!(emitter.finish().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_headers_and_no_rows_writes_nothing() {
        let mut table = DataTable::new();
        table.add_column("a", "text").unwrap();
        let options = FormatOptions {
            include_headers: false,
            ..Default::default()
        };
        let (rows, out) = stream(&table, &options).await;
        assert_eq!(rows, 0);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_headers_disabled() {
        let mut table = DataTable::new();
        table.add_column("a", "text").unwrap();
        table.add_row(vec![Value::String("test".to_string())]).unwrap();
        let options = FormatOptions {
            include_headers: false,
            ..Default::default()
        };
        let (rows, out) = stream(&table, &options).await;
        assert_eq!(rows, 1);
        assert_eq!(out, "\"test\"\r\n");
    }

    #[tokio::test]
    async fn test_cancelled_before_start_writes_only_header() {
        let table = sample_table();
        let options = FormatOptions::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut cursor = TableCursor::new(&table);
        let mut emitter = CsvEmitter::from_options(Vec::new(), &options);
        let rows = stream_to_csv(&mut cursor, &mut emitter, &options, &cancel)
            .await
            .unwrap();
        let out = String::from_utf8(emitter.finish().unwrap()).unwrap();

        assert_eq!(rows, 0);
        assert_eq!(out, "col_string;col_datetime;col_float\r\n");
    }

    /// Yields `limit` rows and cancels the token when asked for the next one.
    struct CancellingCursor {
        columns: Vec<ColumnDescriptor>,
        produced: usize,
        limit: usize,
        cancel: CancellationToken,
    }

    #[async_trait]
    impl RowCursor for CancellingCursor {
        fn columns(&self) -> &[ColumnDescriptor] {
            &self.columns
        }

        async fn next_row(&mut self) -> Result<Option<Row>, CursorError> {
            if self.produced == self.limit {
                self.cancel.cancel();
                return std::future::pending().await;
            }
            self.produced += 1;
            Ok(Some(Row::new(vec![Value::Int(self.produced as i64)])))
        }
    }

    #[tokio::test]
    async fn test_cancellation_while_waiting_on_cursor() {
        let cancel = CancellationToken::new();
        let mut cursor = CancellingCursor {
            columns: vec![ColumnDescriptor::new("n", "int", 0)],
            produced: 0,
            limit: 2,
            cancel: cancel.clone(),
        };
        let options = FormatOptions {
            include_headers: false,
            line_break: LineBreak::Lf,
            ..Default::default()
        };
        let mut emitter = CsvEmitter::from_options(Vec::new(), &options);
        let rows = stream_to_csv(&mut cursor, &mut emitter, &options, &cancel)
            .await
            .unwrap();

        assert_eq!(rows, 2);
        assert_eq!(emitter.finish().unwrap(), b"1\n2\n");
    }

    /// Fails on the second row.
    struct FaultyCursor {
        columns: Vec<ColumnDescriptor>,
        produced: usize,
    }

    #[async_trait]
    impl RowCursor for FaultyCursor {
        fn columns(&self) -> &[ColumnDescriptor] {
            &self.columns
        }

        async fn next_row(&mut self) -> Result<Option<Row>, CursorError> {
            if self.produced == 1 {
                return Err(CursorError::Read {
                    row: self.produced,
                    source: "connection reset".into(),
                });
            }
            self.produced += 1;
            Ok(Some(Row::new(vec![Value::String("ok".to_string())])))
        }
    }

    #[tokio::test]
    async fn test_source_fault_propagates_and_keeps_partial_output() {
        let mut cursor = FaultyCursor {
            columns: vec![ColumnDescriptor::new("s", "text", 0)],
            produced: 0,
        };
        let options = FormatOptions {
            include_headers: false,
            line_break: LineBreak::Lf,
            ..Default::default()
        };
        let mut emitter = CsvEmitter::from_options(Vec::new(), &options);
        let err = stream_to_csv(&mut cursor, &mut emitter, &options, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ExportError::Source(CursorError::Read { row: 1, .. })));
        assert_eq!(emitter.finish().unwrap(), b"\"ok\"\n");
    }

    #[test]
    fn test_prepare_rejects_bad_options_without_a_sink() {
        let table = sample_table();
        let missing = FormatOptions {
            columns_to_include: vec!["col_float".to_string(), "missing".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            PreparedExport::new(table.columns(), &missing),
            Err(ExportError::UnknownColumn(name)) if name == "missing"
        ));

        let prepared = PreparedExport::new(
            table.columns(),
            &FormatOptions {
                columns_to_include: vec!["COL_FLOAT".to_string()],
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(prepared.projection().len(), 1);
        assert_eq!(prepared.projection()[0].name, "Col_float");
    }
}

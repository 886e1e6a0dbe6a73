use crate::{
    core::column::ColumnDescriptor,
    records::{row::Row, table::DataTable},
};
use async_trait::async_trait;
use std::error::Error;
use thiserror::Error;

pub type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum CursorError {
    #[error("Failed to read row {row}: {source}")]
    Read {
        row: usize,
        #[source]
        source: BoxError,
    },

    #[error("Failed to decode column '{column}': {source}")]
    Decode {
        column: String,
        #[source]
        source: BoxError,
    },
}

/// Forward-only source of rows with a fixed column layout.
///
/// Columns are known before the first row is read. A cursor is owned by the
/// caller that opened it and is consumed at most once.
#[async_trait]
pub trait RowCursor: Send {
    fn columns(&self) -> &[ColumnDescriptor];

    /// Next row, or `None` once the source is exhausted.
    async fn next_row(&mut self) -> Result<Option<Row>, CursorError>;
}

/// Cursor over the rows of an in-memory [`DataTable`].
pub struct TableCursor<'a> {
    table: &'a DataTable,
    position: usize,
}

impl<'a> TableCursor<'a> {
    pub fn new(table: &'a DataTable) -> Self {
        TableCursor { table, position: 0 }
    }
}

#[async_trait]
impl RowCursor for TableCursor<'_> {
    fn columns(&self) -> &[ColumnDescriptor] {
        self.table.columns()
    }

    async fn next_row(&mut self) -> Result<Option<Row>, CursorError> {
        let row = self.table.rows().get(self.position).cloned();
        if row.is_some() {
            self.position += 1;
        }
        Ok(row)
    }
}

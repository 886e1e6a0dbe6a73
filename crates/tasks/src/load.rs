use crate::error::TaskError;
use connectors::sql::postgres::bulk_load;
use model::{options::load::LoadOptions, records::table::DataTable};
use tokio_util::sync::CancellationToken;

/// A dataset and where to load it.
#[derive(Debug, Clone)]
pub struct BulkInsertInput {
    pub table_name: String,
    pub connection_string: String,
    pub input_data: DataTable,
}

impl BulkInsertInput {
    /// Builds the input from a JSON dataset document (see [`DataTable::from_json`]).
    pub fn from_json(
        table_name: impl Into<String>,
        connection_string: impl Into<String>,
        document: &str,
    ) -> Result<Self, TaskError> {
        Ok(BulkInsertInput {
            table_name: table_name.into(),
            connection_string: connection_string.into(),
            input_data: DataTable::from_json(document)?,
        })
    }
}

/// Loads the whole dataset in one bulk copy and returns the number of rows inserted.
pub async fn bulk_insert(
    input: &BulkInsertInput,
    options: &LoadOptions,
    cancel: &CancellationToken,
) -> Result<u64, TaskError> {
    let rows = bulk_load(
        &input.input_data,
        &input.table_name,
        &input.connection_string,
        options,
        cancel,
    )
    .await?;
    Ok(rows)
}

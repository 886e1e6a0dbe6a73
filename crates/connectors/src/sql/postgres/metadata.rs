use crate::sql::{base::error::BulkLoadError, postgres::copy::TableRef};
use tokio_postgres::Client;

const QUERY_TABLE_LOOKUP_SQL: &str = include_str!("sql/table_lookup.sql");
const QUERY_TABLE_COLUMNS_SQL: &str = include_str!("sql/table_columns.sql");
const QUERY_TABLE_USER_TRIGGERS_SQL: &str = include_str!("sql/table_user_triggers.sql");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationColumn {
    pub name: String,
    pub data_type: String,
    /// Identity column or a column defaulting to a sequence (`serial`).
    pub is_identity: bool,
}

impl DestinationColumn {
    pub fn new(name: &str, data_type: &str, is_identity: bool) -> Self {
        DestinationColumn {
            name: name.to_string(),
            data_type: data_type.to_string(),
            is_identity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationTable {
    pub table: TableRef,
    pub columns: Vec<DestinationColumn>,
}

/// Resolves `table` the way the server would in a query (search path,
/// quoting rules) and reads its columns in ordinal order.
pub async fn describe_table(client: &Client, table: &str) -> Result<DestinationTable, BulkLoadError> {
    let found = client.query_opt(QUERY_TABLE_LOOKUP_SQL, &[&table]).await?;
    let Some(row) = found else {
        return Err(BulkLoadError::UnknownTable(table.to_string()));
    };

    let schema: String = row.try_get("table_schema")?;
    let name: String = row.try_get("table_name")?;

    let columns = client
        .query(QUERY_TABLE_COLUMNS_SQL, &[&table])
        .await?
        .iter()
        .map(|row| {
            Ok(DestinationColumn {
                name: row.try_get("column_name")?,
                data_type: row.try_get("data_type")?,
                is_identity: row.try_get("is_identity")?,
            })
        })
        .collect::<Result<Vec<_>, tokio_postgres::Error>>()?;

    Ok(DestinationTable {
        table: TableRef::new(Some(&schema), &name),
        columns,
    })
}

/// Whether `table` has triggers other than the internal ones backing constraints.
pub async fn has_user_triggers(client: &Client, table: &str) -> Result<bool, tokio_postgres::Error> {
    let row = client.query_one(QUERY_TABLE_USER_TRIGGERS_SQL, &[&table]).await?;
    row.try_get("has_triggers")
}

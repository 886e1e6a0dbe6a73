use crate::sql::{
    base::{encoder::CopyValueEncoder, error::BulkLoadError},
    postgres::{
        copy::CopyBuilder,
        encoder::PgCopyValueEncoder,
        metadata::{DestinationTable, describe_table, has_user_triggers},
        utils::PgSession,
    },
};
use bytes::Bytes;
use futures_util::{SinkExt, pin_mut};
use model::{
    core::column::ColumnDescriptor,
    options::load::{IsolationLevel, LoadOptions},
    records::{row::Row, table::DataTable},
};
use tokio_postgres::{CopyInSink, IsolationLevel as PgIsolationLevel};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const SUPPRESS_TRIGGERS_SQL: &str = "SET session_replication_role = replica";
const SUPPRESS_TRIGGERS_LOCAL_SQL: &str = "SET LOCAL session_replication_role = replica";

/// A dataset column and the destination column it is copied into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub source: usize,
    pub destination: String,
}

/// Loads every row of `dataset` into `destination_table` with one
/// `COPY ... FROM STDIN` on a dedicated session and returns the number of
/// rows submitted.
///
/// Column mapping is checked before any data is sent. Cancelling `cancel`
/// asks the server to abort the copy and yields [`BulkLoadError::Cancelled`];
/// an open transaction is rolled back when the session closes.
pub async fn bulk_load(
    dataset: &DataTable,
    destination_table: &str,
    connection_target: &str,
    options: &LoadOptions,
    cancel: &CancellationToken,
) -> Result<u64, BulkLoadError> {
    info!(
        table = destination_table,
        rows = dataset.row_count(),
        isolation = %options.isolation_level,
        "Starting bulk load"
    );

    let mut session = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(BulkLoadError::Cancelled),
        session = PgSession::connect(connection_target) => session?,
    };
    let canceller = session.canceller();
    let limit = options.command_timeout();

    let load = run_load(&mut session, dataset, destination_table, options);
    let bounded = async {
        match limit {
            Some(limit) => match tokio::time::timeout(limit, load).await {
                Ok(result) => result,
                Err(_) => Err(BulkLoadError::Timeout(limit)),
            },
            None => load.await,
        }
    };

    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(BulkLoadError::Cancelled),
        result = bounded => result,
    };

    match &result {
        Ok(rows) => info!(table = destination_table, rows, "Bulk load finished"),
        Err(err @ (BulkLoadError::Cancelled | BulkLoadError::Timeout(_))) => {
            warn!(table = destination_table, %err, "Aborting bulk load");
            canceller.cancel().await;
        }
        Err(err) => warn!(table = destination_table, %err, "Bulk load failed"),
    }

    result
}

async fn run_load(
    session: &mut PgSession,
    dataset: &DataTable,
    table: &str,
    options: &LoadOptions,
) -> Result<u64, BulkLoadError> {
    session
        .set_statement_timeout(options.command_timeout())
        .await?;

    let destination = describe_table(session.client(), table).await?;
    let mapping = map_columns(dataset.columns(), &destination, table, options.keep_identity)?;

    if dataset.is_empty() {
        info!(table, "Dataset is empty, skipping COPY");
        return Ok(0);
    }

    let suppress_triggers =
        !options.fire_triggers && has_user_triggers(session.client(), table).await?;
    if suppress_triggers {
        debug!(table, "Suppressing user triggers for the load");
    }

    let names: Vec<&str> = mapping.iter().map(|m| m.destination.as_str()).collect();
    let statement = CopyBuilder::new(destination.table.clone())
        .columns(&names)
        .csv()
        .build()
        .render();
    debug!("COPY statement: {}", statement);

    let empty_as_null = options.convert_empty_to_null;
    let copied = if options.isolation_level.uses_transaction() {
        let mut builder = session.client_mut().build_transaction();
        if let Some(level) = pg_isolation_level(options.isolation_level) {
            builder = builder.isolation_level(level);
        }
        let tx = builder.start().await?;
        if suppress_triggers {
            tx.batch_execute(SUPPRESS_TRIGGERS_LOCAL_SQL).await?;
        }
        let sink = tx.copy_in(&statement).await?;
        let copied = write_rows(sink, dataset, &mapping, empty_as_null).await?;
        tx.commit().await?;
        copied
    } else {
        let client = session.client();
        if suppress_triggers {
            client.batch_execute(SUPPRESS_TRIGGERS_SQL).await?;
        }
        let sink = client.copy_in(&statement).await?;
        write_rows(sink, dataset, &mapping, empty_as_null).await?
    };

    debug!(table, copied, "Server acknowledged COPY");
    Ok(dataset.row_count() as u64)
}

/// Pairs every dataset column with a destination column of the same name:
/// an exact match, otherwise the only match ignoring case. Identity columns
/// are left out unless `keep_identity` is set, so the server assigns them.
pub fn map_columns(
    columns: &[ColumnDescriptor],
    destination: &DestinationTable,
    table: &str,
    keep_identity: bool,
) -> Result<Vec<ColumnMapping>, BulkLoadError> {
    let mut mapping = Vec::with_capacity(columns.len());

    for column in columns {
        let target = match destination.columns.iter().find(|d| d.name == column.name) {
            Some(exact) => exact,
            None => {
                let mut candidates = destination
                    .columns
                    .iter()
                    .filter(|d| d.name.eq_ignore_ascii_case(&column.name));
                match (candidates.next(), candidates.next()) {
                    (Some(only), None) => only,
                    (Some(_), Some(_)) => {
                        return Err(BulkLoadError::AmbiguousColumn {
                            column: column.name.clone(),
                            table: table.to_string(),
                        });
                    }
                    (None, _) => {
                        return Err(BulkLoadError::UnmappedColumn {
                            column: column.name.clone(),
                            table: table.to_string(),
                        });
                    }
                }
            }
        };

        if target.is_identity && !keep_identity {
            debug!(column = %target.name, "Leaving identity column to the server");
            continue;
        }

        mapping.push(ColumnMapping {
            source: column.ordinal,
            destination: target.name.clone(),
        });
    }

    if mapping.is_empty() {
        return Err(BulkLoadError::NoColumns(table.to_string()));
    }

    Ok(mapping)
}

fn pg_isolation_level(level: IsolationLevel) -> Option<PgIsolationLevel> {
    match level {
        IsolationLevel::Default | IsolationLevel::None => None,
        IsolationLevel::ReadCommitted => Some(PgIsolationLevel::ReadCommitted),
        IsolationLevel::ReadUncommitted => Some(PgIsolationLevel::ReadUncommitted),
        IsolationLevel::RepeatableRead | IsolationLevel::Snapshot => {
            Some(PgIsolationLevel::RepeatableRead)
        }
        IsolationLevel::Serializable => Some(PgIsolationLevel::Serializable),
    }
}

/// One CSV line (with trailing newline) for the mapped cells of `row`.
pub(crate) fn encode_row(
    encoder: &PgCopyValueEncoder,
    row: &Row,
    mapping: &[ColumnMapping],
    empty_as_null: bool,
) -> String {
    let mut line = String::new();
    for (i, column) in mapping.iter().enumerate() {
        if i > 0 {
            line.push(',');
        }
        line.push_str(&encoder.encode_cell(row.value(column.source), empty_as_null));
    }
    line.push('\n');
    line
}

async fn write_rows(
    sink: CopyInSink<Bytes>,
    dataset: &DataTable,
    mapping: &[ColumnMapping],
    empty_as_null: bool,
) -> Result<u64, tokio_postgres::Error> {
    let encoder = PgCopyValueEncoder::new();
    pin_mut!(sink);

    for row in dataset.rows() {
        let line = encode_row(&encoder, row, mapping, empty_as_null);
        sink.as_mut().send(Bytes::from(line)).await?;
    }

    sink.as_mut().finish().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::postgres::{copy::TableRef, metadata::DestinationColumn};
    use model::core::value::Value;

    fn destination() -> DestinationTable {
        DestinationTable {
            table: TableRef::new(Some("public"), "people"),
            columns: vec![
                DestinationColumn::new("id", "integer", true),
                DestinationColumn::new("FirstName", "character varying(255)", false),
                DestinationColumn::new("lastname", "character varying(255)", false),
                DestinationColumn::new("Note", "text", false),
                DestinationColumn::new("note", "text", false),
            ],
        }
    }

    fn columns(names: &[&str]) -> Vec<ColumnDescriptor> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| ColumnDescriptor::new(*n, "text", i))
            .collect()
    }

    #[test]
    fn test_exact_then_case_insensitive_match() {
        let mapping =
            map_columns(&columns(&["FirstName", "LastName", "note"]), &destination(), "people", false)
                .unwrap();
        let names: Vec<_> = mapping.iter().map(|m| m.destination.as_str()).collect();
        assert_eq!(names, vec!["FirstName", "lastname", "note"]);
        assert_eq!(mapping[1].source, 1);
    }

    #[test]
    fn test_identity_columns_follow_keep_identity() {
        let cols = columns(&["id", "FirstName"]);
        let without = map_columns(&cols, &destination(), "people", false).unwrap();
        assert_eq!(without.len(), 1);
        assert_eq!(without[0].destination, "FirstName");

        let with = map_columns(&cols, &destination(), "people", true).unwrap();
        assert_eq!(with[0].destination, "id");
        assert_eq!(with.len(), 2);
    }

    #[test]
    fn test_mapping_errors() {
        assert!(matches!(
            map_columns(&columns(&["Salary"]), &destination(), "people", false),
            Err(BulkLoadError::UnmappedColumn { column, .. }) if column == "Salary"
        ));
        assert!(matches!(
            map_columns(&columns(&["NOTE"]), &destination(), "people", false),
            Err(BulkLoadError::AmbiguousColumn { .. })
        ));
        assert!(matches!(
            map_columns(&columns(&["ID"]), &destination(), "people", false),
            Err(BulkLoadError::NoColumns(_))
        ));
    }

    #[test]
    fn test_encode_row_uses_mapping_order_and_null_conversion() {
        let encoder = PgCopyValueEncoder::new();
        let row = Row::new(vec![
            Value::Int(1),
            Value::String("Etu".into()),
            Value::String(String::new()),
        ]);
        let mapping = vec![
            ColumnMapping { source: 2, destination: "c".into() },
            ColumnMapping { source: 0, destination: "a".into() },
            ColumnMapping { source: 1, destination: "b".into() },
        ];

        assert_eq!(encode_row(&encoder, &row, &mapping, true), "\\N,1,\"Etu\"\n");
        assert_eq!(encode_row(&encoder, &row, &mapping, false), "\"\",1,\"Etu\"\n");
    }

    #[test]
    fn test_blank_typed_cells_from_json_become_null() {
        let data = DataTable::from_json(
            r#"{"columns": [{"name": "age", "type": "int"}, {"name": "born", "type": "date"}],
                "rows": [["", " "], [42, "2001-02-03"]]}"#,
        )
        .unwrap();
        let encoder = PgCopyValueEncoder::new();
        let mapping = vec![
            ColumnMapping { source: 0, destination: "age".into() },
            ColumnMapping { source: 1, destination: "born".into() },
        ];

        assert_eq!(encode_row(&encoder, &data.rows()[0], &mapping, true), "\\N,\\N\n");
        assert_eq!(
            encode_row(&encoder, &data.rows()[1], &mapping, true),
            "42,2001-02-03\n"
        );
    }

    #[test]
    fn test_isolation_levels() {
        assert!(pg_isolation_level(IsolationLevel::Default).is_none());
        assert!(matches!(
            pg_isolation_level(IsolationLevel::Snapshot),
            Some(PgIsolationLevel::RepeatableRead)
        ));
        assert!(matches!(
            pg_isolation_level(IsolationLevel::Serializable),
            Some(PgIsolationLevel::Serializable)
        ));
    }
}

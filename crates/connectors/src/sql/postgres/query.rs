use crate::sql::{
    base::{
        error::QueryError,
        params::{SqlParameter, rewrite_named_parameters},
    },
    postgres::{
        decode::CellDecoder,
        params::PgParamStore,
        utils::{PgSession, QueryCanceller},
    },
};
use async_trait::async_trait;
use futures_util::StreamExt;
use model::{
    core::column::ColumnDescriptor,
    records::{
        cursor::{CursorError, RowCursor},
        row::Row,
    },
};
use serde::{Deserialize, Serialize};
use std::{pin::Pin, time::Duration};
use tokio_postgres::{Client, RowStream};
use tracing::debug;

fn default_timeout_seconds() -> u64 {
    30
}

/// What to run and where.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub parameters: Vec<SqlParameter>,
    pub connection_string: String,
    /// Server-side statement timeout; 0 disables it.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>, connection_string: impl Into<String>) -> Self {
        QueryRequest {
            query: query.into(),
            parameters: Vec::new(),
            connection_string: connection_string.into(),
            timeout_seconds: default_timeout_seconds(),
        }
    }

    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push(SqlParameter::new(name, value));
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

pub struct QueryRunner;

impl QueryRunner {
    /// Opens a dedicated session, runs the query and returns a cursor over
    /// its rows. Rows are fetched as the cursor is read.
    pub async fn open(request: &QueryRequest) -> Result<PgRowCursor, QueryError> {
        let positional = rewrite_named_parameters(&request.query, &request.parameters)?;
        debug!(sql = %positional.sql, params = positional.order.len(), "Prepared query");

        let session = PgSession::connect(&request.connection_string).await?;
        session.set_statement_timeout(request.timeout()).await?;
        let canceller = session.canceller();
        let client = session.into_client();

        let statement = client.prepare(&positional.sql).await?;
        let bindings = PgParamStore::bind(&request.parameters, &positional.order, statement.params())?;

        let columns: Vec<ColumnDescriptor> = statement
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| ColumnDescriptor::new(col.name(), col.type_().name(), idx))
            .collect();
        let decoders = statement
            .columns()
            .iter()
            .map(|col| CellDecoder::for_type(col.type_()))
            .collect();

        let stream = client.query_raw(&statement, bindings.as_refs()).await?;

        Ok(PgRowCursor {
            _client: client,
            canceller,
            stream: Box::pin(stream),
            columns,
            decoders,
            position: 0,
        })
    }
}

/// Forward-only cursor over a running query. Owns its connection.
pub struct PgRowCursor {
    _client: Client,
    canceller: QueryCanceller,
    stream: Pin<Box<RowStream>>,
    columns: Vec<ColumnDescriptor>,
    decoders: Vec<CellDecoder>,
    position: usize,
}

impl PgRowCursor {
    pub fn canceller(&self) -> QueryCanceller {
        self.canceller.clone()
    }

    pub fn rows_read(&self) -> usize {
        self.position
    }
}

#[async_trait]
impl RowCursor for PgRowCursor {
    fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    async fn next_row(&mut self) -> Result<Option<Row>, CursorError> {
        let Some(next) = self.stream.next().await else {
            return Ok(None);
        };

        let row = next.map_err(|e| CursorError::Read {
            row: self.position,
            source: Box::new(e),
        })?;

        let values = self
            .decoders
            .iter()
            .enumerate()
            .map(|(idx, decoder)| {
                decoder.decode(&row, idx).map_err(|e| CursorError::Decode {
                    column: self.columns[idx].name.clone(),
                    source: Box::new(e),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.position += 1;
        Ok(Some(Row::new(values)))
    }
}

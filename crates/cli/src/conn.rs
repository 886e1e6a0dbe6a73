use crate::error::CliError;
use async_trait::async_trait;
use connectors::sql::postgres::utils::PgSession;
use tracing::{error, info};

/// Trait for "pinging" a data source
#[async_trait]
pub trait ConnectionPinger {
    /// Attempts to ping; returns Err if unreachable
    async fn ping(&self) -> Result<(), CliError>;
}

/// Postgres pinger
pub struct PostgresConnectionPinger {
    pub conn_str: String,
}

#[async_trait]
impl ConnectionPinger for PostgresConnectionPinger {
    async fn ping(&self) -> Result<(), CliError> {
        info!("Pinging Postgres");

        let session = PgSession::connect(&self.conn_str).await.map_err(|e| {
            error!("Postgres connection failed: {}", e);
            CliError::Connector(e)
        })?;

        let row = session.client().query_one("SELECT 1", &[]).await.map_err(|e| {
            error!("Postgres ping query failed: {}", e);
            CliError::Postgres(e)
        })?;

        let val: i32 = row.try_get(0)?;
        if val != 1 {
            let msg = format!("Postgres ping returned unexpected result: {val}");
            error!("{}", msg);
            return Err(CliError::Unexpected(msg));
        }

        info!("Postgres ping succeeded");
        Ok(())
    }
}

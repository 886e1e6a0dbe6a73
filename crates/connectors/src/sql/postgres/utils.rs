use crate::sql::base::error::ConnectorError;
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use std::time::Duration;
use tokio_postgres::{CancelToken, Client, Config, NoTls, config::SslMode};
use tracing::{error, info, warn};

/// One dedicated connection, owned by a single query or load call and closed
/// when dropped.
pub struct PgSession {
    client: Client,
    tls: bool,
}

impl PgSession {
    pub async fn connect(url: &str) -> Result<Self, ConnectorError> {
        let (client, tls) = connect_client(url).await?;
        Ok(PgSession { client, tls })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut Client {
        &mut self.client
    }

    pub fn into_client(self) -> Client {
        self.client
    }

    pub fn canceller(&self) -> QueryCanceller {
        QueryCanceller {
            token: self.client.cancel_token(),
            tls: self.tls,
        }
    }

    /// Sets the session's `statement_timeout`; `None` removes the limit.
    pub async fn set_statement_timeout(
        &self,
        timeout: Option<Duration>,
    ) -> Result<(), tokio_postgres::Error> {
        let millis = timeout.map_or(0, |t| t.as_millis());
        self.client
            .batch_execute(&format!("SET statement_timeout = {millis}"))
            .await
    }
}

/// Sends an out-of-band cancel request for whatever the session is running.
#[derive(Clone)]
pub struct QueryCanceller {
    token: CancelToken,
    tls: bool,
}

impl QueryCanceller {
    /// Failures are logged, not returned: the caller is already giving up on
    /// the operation.
    pub async fn cancel(&self) {
        let result = if self.tls {
            match TlsConnector::builder().build() {
                Ok(connector) => {
                    self.token
                        .cancel_query(MakeTlsConnector::new(connector))
                        .await
                }
                Err(err) => {
                    warn!(%err, "Could not build TLS connector for cancel request");
                    return;
                }
            }
        } else {
            self.token.cancel_query(NoTls).await
        };

        match result {
            Ok(()) => info!("Sent cancel request to Postgres"),
            Err(err) => warn!(%err, "Postgres cancel request failed"),
        }
    }
}

/// Opens a client, choosing TLS from the connection string's `sslmode`.
/// Returns the client and whether the connection is encrypted.
pub(crate) async fn connect_client(url: &str) -> Result<(Client, bool), ConnectorError> {
    let config = url
        .parse::<Config>()
        .map_err(|e| ConnectorError::InvalidUrl(e.to_string()))?;
    let ssl_mode = config.get_ssl_mode();

    match ssl_mode {
        SslMode::Disable => Ok((connect_without_tls(config).await?, false)),
        SslMode::Prefer => match connect_with_tls(config.clone()).await {
            Ok(client) => Ok((client, true)),
            Err(error) => {
                warn!(%error, "Postgres TLS handshake failed, retrying without TLS");
                Ok((connect_without_tls(config).await?, false))
            }
        },
        _ => Ok((connect_with_tls(config).await?, true)),
    }
}

pub(crate) async fn connect_with_tls(config: Config) -> Result<Client, ConnectorError> {
    let connector = TlsConnector::builder().build()?;
    let tls = MakeTlsConnector::new(connector);
    let (client, connection) = config.connect(tls).await?;
    tokio::spawn(async move {
        if let Err(err) = connection.await {
            error!(%err, "Postgres connection error");
        }
    });
    Ok(client)
}

pub(crate) async fn connect_without_tls(config: Config) -> Result<Client, ConnectorError> {
    let (client, connection) = config.connect(NoTls).await?;
    tokio::spawn(async move {
        if let Err(err) = connection.await {
            error!(%err, "Postgres connection error");
        }
    });
    Ok(client)
}

pub(crate) fn quote_identifier(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

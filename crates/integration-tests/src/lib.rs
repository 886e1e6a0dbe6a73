#![allow(dead_code)]

use connectors::sql::postgres::utils::PgSession;
use std::env;
use tokio_postgres::Client;

pub mod utils;

/// Connection string of the scratch database the tests run against.
const TEST_PG_URL_VAR: &str = "SQLBRIDGE_TEST_PG_URL";

/// Returns the test database URL, or `None` (after printing a notice) when
/// the variable is unset so that database tests are skipped.
fn pg_url() -> Option<String> {
    match env::var(TEST_PG_URL_VAR) {
        Ok(url) if !url.trim().is_empty() => Some(url),
        _ => {
            println!("{TEST_PG_URL_VAR} is not set, skipping database test");
            None
        }
    }
}

async fn pg_client(url: &str) -> Client {
    PgSession::connect(url)
        .await
        .expect("connect postgres")
        .into_client()
}

/// Drops and recreates `table` from `ddl`, leaving it empty.
async fn reset_table(url: &str, table: &str, ddl: &str) {
    let client = pg_client(url).await;
    client
        .batch_execute(&format!("DROP TABLE IF EXISTS {table} CASCADE; {ddl}"))
        .await
        .expect("reset table");
}

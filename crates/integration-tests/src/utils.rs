#![allow(dead_code)]

use crate::pg_client;
use model::{core::value::Value, records::table::DataTable};
use std::path::Path;
use tokio_postgres::Row;

/// Destination with an identity key, used by the bulk load scenarios.
pub fn people_table_ddl(table: &str) -> String {
    format!(
        r#"CREATE TABLE {table} (
  id INTEGER GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY,
  "FirstName" VARCHAR(255),
  lastname VARCHAR(255),
  age INTEGER,
  note TEXT
);"#
    )
}

/// Source table covering the column kinds the CSV export renders differently.
pub fn typed_table_ddl(table: &str) -> String {
    format!(
        r#"CREATE TABLE {table} (
  id INTEGER PRIMARY KEY,
  col_string VARCHAR(100),
  col_int INTEGER,
  col_float DOUBLE PRECISION,
  col_numeric NUMERIC(10,2),
  col_date DATE,
  col_datetime TIMESTAMP
);"#
    )
}

/// Three-row dataset shaped like the `people` destination.
pub fn people_dataset() -> DataTable {
    let mut table = DataTable::new();
    table
        .add_column("FirstName", "nvarchar")
        .unwrap()
        .add_column("LastName", "nvarchar")
        .unwrap()
        .add_column("Age", "int")
        .unwrap();

    for (first, last, age) in [("Etu", "Sukunimi", 23), ("Toka", "Sukunimi", 34), ("Kolmas", "", 45)] {
        table
            .add_row(vec![
                Value::String(first.to_string()),
                Value::String(last.to_string()),
                Value::Int(age),
            ])
            .unwrap();
    }
    table
}

pub async fn execute(url: &str, sql: &str) {
    pg_client(url).await.batch_execute(sql).await.expect("execute sql");
}

pub async fn fetch_rows(url: &str, sql: &str) -> Vec<Row> {
    pg_client(url).await.query(sql, &[]).await.expect("fetch rows")
}

pub async fn get_row_count(url: &str, table: &str) -> i64 {
    let rows = fetch_rows(url, &format!("SELECT COUNT(*) FROM {table}")).await;
    rows[0].get(0)
}

/// Lines of a CSV file split on the given line break, without the trailing
/// empty element.
pub fn read_csv_lines(path: &Path, line_break: &str) -> Vec<String> {
    let content = std::fs::read_to_string(path).expect("read csv output");
    let mut lines: Vec<String> = content.split(line_break).map(str::to_string).collect();
    if lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

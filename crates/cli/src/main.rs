use crate::{
    commands::{Commands, ExportArgs, LoadArgs},
    conn::{ConnectionPinger, PostgresConnectionPinger},
    env::EnvManager,
    error::CliError,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use clap::Parser;
use connectors::sql::postgres::QueryRequest;
use model::options::{format::FormatOptions, load::LoadOptions};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tasks::{BulkInsertInput, ExportInput, TaskError, bulk_insert, save_query_to_csv};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod commands;
mod conn;
mod env;
mod error;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(
    name = "sqlbridge",
    version = "0.1.0",
    about = "Export query results to CSV and bulk-load datasets into PostgreSQL"
)]
struct Cli {
    /// Load KEY=VALUE lines from this file before expanding `${VAR}` references
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Serialize)]
struct LoadSummary<'a> {
    table: &'a str,
    rows: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let shutdown = ShutdownCoordinator::new(CancellationToken::new());
    shutdown.register_handlers();

    let result = run(cli, shutdown.cancel_token()).await;

    let code = match result {
        Ok(()) => ExitCode::Success,
        Err(err) if shutdown.is_shutdown_requested() => {
            info!(%err, "Stopped on shutdown request");
            ExitCode::ShutdownRequested
        }
        Err(err) => {
            error!("{err}");
            ExitCode::GeneralError
        }
    };

    std::process::exit(code.as_i32());
}

async fn run(cli: Cli, cancel: CancellationToken) -> Result<(), CliError> {
    let mut env = EnvManager::new();
    if let Some(path) = &cli.env_file {
        env.load_from_file(path)?;
    }

    match cli.command {
        Commands::Export(args) => export(args, &env, &cancel).await,
        Commands::Load(args) => load(args, &env, &cancel).await,
        Commands::TestConn { conn_str } => {
            let conn_str = env.expand(&conn_str)?;
            PostgresConnectionPinger { conn_str }.ping().await?;
            println!("Connection successful");
            Ok(())
        }
    }
}

async fn export(
    args: ExportArgs,
    env: &EnvManager,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    let query = match (&args.query, &args.query_file) {
        (Some(query), _) => query.clone(),
        (None, Some(path)) => tokio::fs::read_to_string(path).await?,
        (None, None) => {
            return Err(CliError::Config(
                "Either --query or --query-file is required".into(),
            ));
        }
    };

    let file_options = match &args.format.options {
        Some(path) => FormatOptions::from_json(&read_file(path).await?)?,
        None => FormatOptions::default(),
    };
    let options = args.format.apply(file_options);

    let mut request = QueryRequest::new(query, env.expand(&args.conn_str)?);
    request.parameters = args.params;
    request.timeout_seconds = args.timeout_seconds;

    let input = ExportInput {
        query: request,
        output_file_path: args.output,
    };

    match save_query_to_csv(&input, &options, cancel).await {
        Ok(summary) => output::emit(&summary, args.summary.as_deref()).await,
        Err(err @ TaskError::Cancelled { .. }) => {
            info!(path = %input.output_file_path.display(), "Partial output kept");
            Err(err.into())
        }
        Err(err) => Err(err.into()),
    }
}

async fn load(args: LoadArgs, env: &EnvManager, cancel: &CancellationToken) -> Result<(), CliError> {
    let file_options = match &args.options {
        Some(path) => LoadOptions::from_json(&read_file(path).await?)?,
        None => LoadOptions::default(),
    };
    let options = args.apply(file_options);

    let document = read_file(&args.data).await?;
    let input = BulkInsertInput::from_json(&args.table, env.expand(&args.conn_str)?, &document)?;

    let rows = bulk_insert(&input, &options, cancel).await?;
    output::emit(
        &LoadSummary {
            table: &input.table_name,
            rows,
        },
        args.summary.as_deref(),
    )
    .await
}

async fn read_file(path: &Path) -> Result<String, CliError> {
    tokio::fs::read_to_string(path).await.map_err(|e| {
        CliError::Config(format!("Failed to read {}: {}", path.display(), e))
    })
}

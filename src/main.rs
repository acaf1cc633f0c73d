//! db-access - command-line entry point.
//!
//! Connects to one database, runs a single command and prints the result as
//! JSON on stdout. Failures are printed as a classified error on stderr.

use db_access::config::{Command, Config};
use db_access::db::{Engine, StatementRunner, classify};
use db_access::error::DbError;
use db_access::models::StructuredError;
use db_access::repository::Repository;
use serde_json::{Value as JsonValue, json};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so stdout stays valid JSON.
    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

async fn run(command: &Command, engine: &Engine) -> Result<JsonValue, StructuredError> {
    let repo = Repository::new(engine.clone());
    let value = match command {
        Command::Tables => json!(repo.get_table_names().await?),
        Command::Columns { table } => json!({
            "table": table,
            "columns": repo.get_columns_details(table).await?,
            "primary_keys": repo.get_primary_keys(table).await?,
        }),
        Command::Exec {
            statements,
            results,
        } => {
            let runner = StatementRunner::new(engine.clone());
            let batch = runner
                .execute_many(statements.iter().map(String::as_str), *results)
                .await?;
            serde_json::to_value(batch).map_err(|e| classify(&DbError::internal(e.to_string())))?
        }
        Command::Count { query } => json!({ "count": repo.count_query(query.as_str()).await? }),
    };
    Ok(value)
}

async fn connect(config: &Config) -> Result<Engine, StructuredError> {
    let descriptor = config
        .descriptor()
        .map_err(|e| classify(&DbError::from(e)))?;
    Engine::connect(descriptor).await.map_err(|e| classify(&e))
}

#[tokio::main]
async fn main() {
    // Parse configuration from command line and environment
    let config = Config::parse_args();

    // Initialize logging
    init_tracing(&config);

    info!("Starting db-access v{}", env!("CARGO_PKG_VERSION"));

    let result = match connect(&config).await {
        Ok(engine) => {
            let result = run(&config.command, &engine).await;
            engine.close().await;
            result
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                error!(error = %e, "Failed to render result");
                std::process::exit(1);
            }
        },
        Err(e) => {
            let rendered = serde_json::to_string(&e).unwrap_or_else(|_| e.to_string());
            eprintln!("{}", rendered);
            std::process::exit(1);
        }
    }
}

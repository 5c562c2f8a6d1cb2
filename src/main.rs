use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use mapflow::config::AppConfig;
use mapflow::run::{RunController, RunStatus};
use mapflow::server::{create_router, AppState};
use mapflow::shutdown::wait_for_shutdown;
use mapflow::store::types::RunKey;
use mapflow::store::FileStore;
use mapflow::trigger::RunRequest;

#[derive(Parser)]
#[command(name = "mapflow", about = "Bounded-concurrency fan-out runner")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute one run and print its result as JSON
    Run {
        /// Key of the item list (defaults to store.default_run_key)
        #[arg(short, long)]
        key: Option<String>,
        /// Maximum items in flight; 0 for unbounded
        #[arg(long)]
        max_concurrency: Option<usize>,
        /// Delay applied to every item, in seconds
        #[arg(long)]
        wait_secs: Option<f64>,
        /// Deadline for the whole run, in seconds
        #[arg(long)]
        timeout_secs: Option<f64>,
    },
    /// Serve the run trigger endpoint
    Serve,
    /// Store a JSON array of items under a key in the table file
    Load {
        #[arg(short, long)]
        key: String,
        /// File containing a JSON array
        #[arg(long)]
        json: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let fmt_layer = if cli.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt_layer)
        .init();

    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Run {
            key,
            max_concurrency,
            wait_secs,
            timeout_secs,
        } => {
            let request = RunRequest {
                run_key: key,
                max_concurrency,
                wait_duration_secs: wait_secs,
                timeout_secs,
            };
            let (run_key, settings) = request.resolve(&config)?;
            let controller = RunController::from_config(&config)?;

            let result = controller.execute(run_key, &settings).await;
            println!("{}", serde_json::to_string_pretty(&result)?);

            if result.status != RunStatus::Completed {
                std::process::exit(1);
            }
        }
        Command::Serve => {
            tracing::info!(
                host = %config.server.host,
                port = %config.server.port,
                "Starting mapflow server"
            );

            let state = Arc::new(AppState::new(config.clone())?);
            let app = create_router(state);

            let listener = tokio::net::TcpListener::bind(format!(
                "{}:{}",
                config.server.host, config.server.port
            ))
            .await?;

            tracing::info!("Listening on {}", listener.local_addr()?);

            axum::serve(listener, app)
                .with_graceful_shutdown(wait_for_shutdown())
                .await?;

            tracing::info!("Server stopped");
        }
        Command::Load { key, json } => {
            let raw = tokio::fs::read(&json).await?;
            let values: Vec<serde_json::Value> = serde_json::from_slice(&raw)?;
            let count = values.len();

            let store = FileStore::new(&config.store);
            store.put(&RunKey::new(key)?, values).await?;

            tracing::info!(
                table = %store.path().display(),
                count,
                "Loaded items"
            );
        }
    }

    Ok(())
}

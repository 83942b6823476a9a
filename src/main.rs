//! CLI entry point for the transit departure board.
//!
//! `serve` runs the HTTP server; `snapshot` runs a single pass and prints the
//! board, which is handy for checking a config against the live feed.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use transit_board::{
    config::BoardConfig,
    fetch::BasicClient,
    output::{board_json, log_report},
    server::{self, AppState},
    snapshot::SnapshotService,
};

#[derive(Parser)]
#[command(name = "transit_board")]
#[command(about = "Serves real-time departures for a fixed set of transit stops", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the departure board over HTTP
    Serve {
        /// Path to the JSON board configuration
        #[arg(short, long, env = "TRANSIT_BOARD_CONFIG", default_value = "board.json")]
        config: PathBuf,

        /// Address to listen on
        #[arg(short, long, default_value = "0.0.0.0:5000")]
        bind: String,
    },
    /// Run one pass and print the board as JSON
    Snapshot {
        /// Path to the JSON board configuration
        #[arg(short, long, env = "TRANSIT_BOARD_CONFIG", default_value = "board.json")]
        config: PathBuf,

        /// Pretty-print the JSON
        #[arg(short, long, default_value_t = false)]
        pretty: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/transit_board.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("transit_board.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, bind } => {
            let service = load_service(&config)?;
            info!(
                stops = service.config().stops.len(),
                kind = ?service.config().feed.kind(),
                "Loaded configuration"
            );

            let app = server::router(AppState::new(Arc::new(service)));
            let listener = tokio::net::TcpListener::bind(&bind)
                .await
                .with_context(|| format!("Failed to bind to {bind}"))?;

            info!("Server running on http://{bind}");
            axum::serve(listener, app)
                .await
                .context("HTTP server failed")?;
        }
        Commands::Snapshot { config, pretty } => {
            let service = load_service(&config)?;
            let snapshot = service.snapshot(Utc::now()).await?;

            log_report(&snapshot.report);
            if snapshot.board.is_empty() {
                info!("No upcoming departures for the configured stops");
            }
            println!("{}", board_json(&snapshot.board, pretty)?);
        }
    }

    Ok(())
}

fn load_service(path: &Path) -> Result<SnapshotService<BasicClient>> {
    let config = BoardConfig::load(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    let client =
        BasicClient::new(config.fetch_timeout()).context("Failed to build HTTP client")?;
    Ok(SnapshotService::new(config, client)?)
}

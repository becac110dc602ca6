//! Beacon Server
//!
//! HTTP front of the pipeline run engine.

use anyhow::{Context, Result};
use beacon_core::catalog::Catalog;
use beacon_engine::repository::{HistoryBackend, JsonLinesHistory, MemoryHistory};
use beacon_engine::{Engine, EngineConfig};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;

#[derive(Parser)]
#[command(name = "beacon-server")]
#[command(about = "Simulated CI/CD pipeline runner with DevOps metrics", long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "BEACON_BIND_ADDR", default_value = "0.0.0.0:5000")]
    bind_addr: String,

    /// Directory for the durable history file; history is memory-only when unset
    #[arg(long, env = "BEACON_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// JSON file replacing the built-in pipeline catalog
    #[arg(long, env = "BEACON_CATALOG")]
    catalog: Option<PathBuf>,

    /// Maximum number of runs in flight (unlimited when unset)
    #[arg(long)]
    max_concurrent_runs: Option<usize>,

    /// Maximum number of runs kept in the live snapshot
    #[arg(long)]
    snapshot_limit: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "beacon_server=debug,beacon_engine=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    tracing::info!("Starting Beacon Server...");

    let mut config = EngineConfig::from_env().context("Invalid engine configuration")?;
    if let Some(limit) = cli.max_concurrent_runs {
        config = config.with_max_concurrent_runs(limit);
    }
    if let Some(limit) = cli.snapshot_limit {
        config = config.with_snapshot_limit(limit);
    }

    let catalog = match &cli.catalog {
        Some(path) => load_catalog(path).await?,
        None => Catalog::builtin(),
    };
    tracing::info!(
        "Loaded {} pipeline(s): {}",
        catalog.len(),
        catalog.names().collect::<Vec<_>>().join(", ")
    );

    let backend: Arc<dyn HistoryBackend> = match &cli.data_dir {
        Some(dir) => {
            let backend = JsonLinesHistory::in_dir(dir);
            tracing::info!("Mirroring history to {}", backend.path().display());
            Arc::new(backend)
        }
        None => Arc::new(MemoryHistory::new()),
    };

    let engine = Engine::builder()
        .catalog(catalog)
        .config(config)
        .backend(backend)
        .build()
        .await
        .context("Failed to start engine")?;

    let app = api::create_router(engine);

    tracing::info!("Listening on {}", cli.bind_addr);

    let listener = tokio::net::TcpListener::bind(&cli.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", cli.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Server stopped unexpectedly")?;

    Ok(())
}

async fn load_catalog(path: &Path) -> Result<Catalog> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read catalog {}", path.display()))?;

    Catalog::from_json(&content)
        .map_err(|e| anyhow::anyhow!("Invalid catalog {}: {}", path.display(), e))
}

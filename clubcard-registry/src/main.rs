//! clubcard-registry - club member lookup and editing service
//!
//! Loads the member sheet, then serves plate search, the member card, the
//! edit/save session, and dashboard statistics over HTTP.

use anyhow::Result;
use clap::Parser;
use clubcard_common::config::load_config;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use clubcard_registry::gateway::HttpGateway;
use clubcard_registry::session::SessionConfig;
use clubcard_registry::store::StoreError;
use clubcard_registry::{build_router, AppState};

/// Command-line arguments (highest configuration priority)
#[derive(Debug, Parser)]
#[command(name = "clubcard-registry", version, about = "Club member registry service")]
struct Args {
    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// HTTP bind address, e.g. 127.0.0.1:5740
    #[arg(long)]
    bind: Option<String>,

    /// Wait after a dispatched write before reloading the sheet
    #[arg(long)]
    settle_delay_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Build identification first, before any network delay
    info!(
        "Starting clubcard-registry v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind = Some(bind);
    }
    if let Some(ms) = args.settle_delay_ms {
        config.sync.settle_delay_ms = ms;
    }

    if config.sync.script_url.is_none() {
        warn!("No sync.script_url configured: saving changes will fail");
    }

    let gateway = Arc::new(HttpGateway::new(&config.source, &config.sync)?);
    let session_config = SessionConfig {
        settle_delay: config.sync.settle_delay(),
        on_reconcile_failure: config.sync.on_reconcile_failure,
    };
    info!(
        settle_delay_ms = config.sync.settle_delay_ms,
        policy = ?session_config.on_reconcile_failure,
        "Save protocol configured"
    );

    let state = AppState::new(gateway, session_config).with_insights(config.insights.enabled);

    // Initial load: failures are reported, not retried; POST /api/reload retries
    match state.store.reload().await {
        Ok(snapshot) => info!("✓ Loaded {} members", snapshot.len()),
        Err(StoreError::EmptySource) => {
            error!("Member sheet has no data rows; serving an empty registry")
        }
        Err(e) => error!("Failed to load member data: {}", e),
    }

    let app = build_router(state);

    let bind = config.bind_address().to_string();
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("clubcard-registry listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app).await?;

    Ok(())
}

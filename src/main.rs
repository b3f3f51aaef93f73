// Copyright 2026 Rendergate Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::Parser;
use rendergate::config::Config;
use rendergate::pipeline::RenderPipeline;
use rendergate::server::{self, AppState};
use rendergate::session::SessionManager;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// How often expired snapshots are swept from the cache.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(
    name = "rendergate",
    about = "Rendergate — rendering gateway for crawler-ready HTML snapshots",
    version
)]
struct Cli {
    /// Listen port (overrides RENDERGATE_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Enable verbose/debug logging
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_directive = if cli.verbose {
        "rendergate=debug"
    } else {
        "rendergate=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_directive.parse()?),
        )
        .init();

    let mut config = Config::from_env();
    if let Some(port) = cli.port {
        config.port = port;
    }
    if config.secret.is_empty() {
        warn!("RENDERGATE_SECRET is not set; every render request will be rejected");
    }

    info!("starting rendergate v{}", env!("CARGO_PKG_VERSION"));

    let pipeline = Arc::new(RenderPipeline::new(&config, SessionManager::new())?);
    let state = Arc::new(AppState {
        secret: config.secret.clone(),
        cache_ttl_secs: config.cache_ttl.as_secs(),
        pipeline,
    });

    // Background sweep for expired snapshots.
    let sweeper = Arc::clone(&state);
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            tick.tick().await;
            sweeper.pipeline.sweep_cache().await;
        }
    });

    server::start(config.port, state).await
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Prover Server - HTTP job gateway for the prover binary.

use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use prover_server::config::{Config, LogFormat};
use prover_server::runner::{ProcessRunner, Runner};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "prover_server=info,tower_http=info".into());

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before LOG_FORMAT is read)
    let dotenv = dotenvy::dotenv();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    init_tracing(config.log_format);

    if let Err(e) = dotenv {
        warn!("No .env file loaded: {}", e);
    }

    info!(
        http_addr = %config.http_addr,
        bin_dir = %config.execution.bin_dir.display(),
        workspace_root = %config.execution.workspace_root.display(),
        file_grouping = ?config.execution.file_grouping,
        summary_policy = ?config.execution.summary_policy,
        "Starting Prover Server"
    );

    let runner = Arc::new(ProcessRunner::new());
    info!(runner_type = runner.runner_type(), "Runner initialized");

    prover_server::server::serve(config, runner).await?;

    info!("Prover Server shut down");

    Ok(())
}

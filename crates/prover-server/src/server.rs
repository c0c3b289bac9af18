// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP server.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/` | Submit a job, returns the harvested result |
//! | `GET` | `/livez` | Liveness probe |
//! | `GET` | `/readyz` | Readiness probe |

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderValue, StatusCode, header};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::harvest::JobResult;
use crate::orchestrator::{JobOrchestrator, JobRequest};
use crate::runner::Runner;

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Job pipeline.
    pub orchestrator: Arc<JobOrchestrator>,
}

impl AppState {
    /// Create state around an orchestrator.
    pub fn new(orchestrator: JobOrchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }
}

/// Build the router with all middleware applied.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", post(submit_job))
        .route("/livez", get(liveness))
        .route("/readyz", get(readiness))
        .layer(CompressionLayer::new())
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .with_state(state)
}

async fn submit_job(
    State(state): State<AppState>,
    payload: std::result::Result<Json<JobRequest>, JsonRejection>,
) -> Result<Json<JobResult>> {
    let Json(request) = payload.map_err(|e| {
        warn!(error = %e, "Rejected request body");
        Error::InvalidRequest(e.body_text())
    })?;

    info!("Request received");

    let result = state.orchestrator.submit(request).await.map_err(|e| {
        match &e {
            Error::InvalidRequest(_) => warn!(error = %e, "Invalid job request"),
            _ => error!(error = %e, "Job failed"),
        }
        e
    })?;

    Ok(Json(result))
}

async fn liveness() -> StatusCode {
    StatusCode::OK
}

async fn readiness() -> StatusCode {
    StatusCode::OK
}

/// Bind the configured address and serve until Ctrl-C or SIGTERM.
pub async fn serve(config: Config, runner: Arc<dyn Runner>) -> Result<()> {
    let orchestrator = JobOrchestrator::new(Arc::new(config.execution), runner);
    let app = create_router(AppState::new(orchestrator));

    let listener = TcpListener::bind(config.http_addr).await?;
    info!(addr = %config.http_addr, "Prover server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Job orchestration.
//!
//! One job runs as: validate -> create workspace -> write inputs -> run the
//! prover -> harvest -> destroy workspace. Workspace, input and summary
//! failures abort the job; a timeout does not, the partial result is still
//! harvested.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, error, info, info_span, warn};

use crate::config::ExecutionConfig;
use crate::error::{Error, Result};
use crate::harvest::{self, FORMULA_FILE, JobResult, OPTIONS_FILE};
use crate::runner::{HostOs, LaunchOptions, Runner, resolve_binary};
use crate::workspace::Workspace;

/// Smallest accepted timeout in seconds.
pub const MIN_TIMEOUT_SECS: u64 = 1;

/// Largest accepted timeout in seconds.
pub const MAX_TIMEOUT_SECS: u64 = 10;

/// Request to prove a formula.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    /// Formula to prove
    pub formula: String,
    /// Prover options, passed through as `options.json`
    pub options: Map<String, Value>,
    /// Wall-clock budget in seconds
    #[serde(alias = "timeout")]
    pub timeout_seconds: u64,
    /// Run the tracing build of the prover
    #[serde(default)]
    pub trace: bool,
}

impl JobRequest {
    /// Check field constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.formula.is_empty() {
            return Err(Error::InvalidRequest("formula is required".to_string()));
        }
        if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&self.timeout_seconds) {
            return Err(Error::InvalidRequest(format!(
                "timeout_seconds must be between {} and {}, got {}",
                MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS, self.timeout_seconds
            )));
        }
        Ok(())
    }

    /// Timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Runs jobs end to end.
///
/// Holds no per-request state; one instance serves all concurrent requests.
pub struct JobOrchestrator {
    config: Arc<ExecutionConfig>,
    runner: Arc<dyn Runner>,
    host_os: HostOs,
}

impl JobOrchestrator {
    /// Create an orchestrator for the current host platform.
    pub fn new(config: Arc<ExecutionConfig>, runner: Arc<dyn Runner>) -> Self {
        Self {
            config,
            runner,
            host_os: HostOs::current(),
        }
    }

    /// Override the platform used for binary selection.
    pub fn with_host_os(mut self, host_os: HostOs) -> Self {
        self.host_os = host_os;
        self
    }

    /// Execution settings in effect.
    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Run a job and return its harvested result.
    ///
    /// The workspace is destroyed before this returns, whatever the outcome.
    pub async fn submit(&self, request: JobRequest) -> Result<JobResult> {
        request.validate()?;

        let workspace = Workspace::create(&self.config.workspace_root).await?;
        let span = info_span!("job", workspace = %workspace.name(), trace = request.trace);

        let result = self
            .run_in(&workspace, &request)
            .instrument(span.clone())
            .await;

        workspace.destroy().instrument(span).await;
        result
    }

    async fn run_in(&self, workspace: &Workspace, request: &JobRequest) -> Result<JobResult> {
        workspace
            .write_input(FORMULA_FILE, request.formula.as_bytes())
            .await?;
        workspace
            .write_json_input(OPTIONS_FILE, &request.options)
            .await?;

        let options = LaunchOptions {
            binary: resolve_binary(&self.config.bin_dir, request.trace, self.host_os),
            workspace: workspace.path().to_path_buf(),
            timeout: request.timeout(),
        };

        info!(
            binary = %options.binary.display(),
            timeout_secs = request.timeout_seconds,
            runner_type = self.runner.runner_type(),
            "Proving"
        );

        let outcome = self.runner.run(&options).await.map_err(|e| {
            error!(error = %e, "Failed to launch prover");
            Error::from(e)
        })?;

        if outcome.timed_out {
            warn!(
                duration_ms = outcome.duration_ms,
                "Prover timed out, harvesting partial output"
            );
        } else {
            info!(
                exit_code = ?outcome.exit_code,
                duration_ms = outcome.duration_ms,
                "Prover finished"
            );
        }

        harvest::collect(
            workspace.path(),
            &outcome,
            self.config.file_grouping,
            self.config.summary_policy,
        )
        .await
    }
}

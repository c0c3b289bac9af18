// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Runner trait definitions.
//!
//! Defines the abstract interface for bounded prover execution.

use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Flag passed to the prover ahead of the workspace path.
pub const OUT_FLAG: &str = "--out";

/// Errors from runner operations.
///
/// These are launch failures only. Timeouts and non-zero exits are reported
/// through [`ExecutionOutcome`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunnerError {
    /// Binary executable was not found.
    #[error("Binary not found: {0}")]
    BinaryNotFound(String),

    /// Process failed to start.
    #[error("Process start failed: {0}")]
    StartFailed(String),

    /// I/O operation failed while supervising the process.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for runner operations.
pub type Result<T> = std::result::Result<T, RunnerError>;

/// Options for launching the prover against a workspace.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Path to the prover executable
    pub binary: PathBuf,
    /// Workspace directory the prover reads from and writes to
    pub workspace: PathBuf,
    /// Wall-clock budget
    pub timeout: Duration,
}

impl LaunchOptions {
    /// Command-line arguments: `--out <workspace>`.
    pub fn args(&self) -> [&OsStr; 2] {
        [OsStr::new(OUT_FLAG), self.workspace.as_os_str()]
    }
}

/// How a prover run ended.
///
/// Exactly one of `exited_normally` and `timed_out` is true.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    /// Process exited on its own before the deadline (any exit code).
    pub exited_normally: bool,
    /// Deadline elapsed and the process group was terminated.
    pub timed_out: bool,
    /// Exit code, when the process exited with one.
    pub exit_code: Option<i32>,
    /// Combined stdout and stderr, in arrival order.
    pub captured_output: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl ExecutionOutcome {
    /// Process exited before the deadline.
    pub fn completed(exit_code: Option<i32>, captured_output: String, duration_ms: u64) -> Self {
        Self {
            exited_normally: true,
            timed_out: false,
            exit_code,
            captured_output,
            duration_ms,
        }
    }

    /// Process was killed at the deadline.
    pub fn timed_out(captured_output: String, duration_ms: u64) -> Self {
        Self {
            exited_normally: false,
            timed_out: true,
            exit_code: None,
            captured_output,
            duration_ms,
        }
    }

    /// Exited normally with code zero.
    pub fn success(&self) -> bool {
        self.exited_normally && self.exit_code == Some(0)
    }
}

/// Terminates an executed job together with all of its descendants.
pub trait ProcessTerminator: Send + Sync + std::fmt::Debug {
    /// Kill the process group led by `pid`.
    ///
    /// A group that is already gone is not an error.
    fn terminate(&self, pid: u32) -> std::io::Result<()>;
}

/// Trait for prover runners.
///
/// Runners are pure execution engines: they launch the binary against an
/// already populated workspace and never read its output files.
#[async_trait]
pub trait Runner: Send + Sync {
    /// Runner type identifier (e.g., "process", "mock")
    fn runner_type(&self) -> &'static str;

    /// Run the prover, waiting for exit or the deadline.
    ///
    /// Returns `Err` only when the binary could not be launched.
    async fn run(&self, options: &LaunchOptions) -> Result<ExecutionOutcome>;
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock runner for testing.
//!
//! Simulates a prover run by writing scripted files into the workspace
//! without spawning any process.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::traits::*;

/// How a mock run ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockExit {
    /// Exit before the deadline with the given code.
    Code(i32),
    /// Report a timeout.
    TimedOut,
    /// Fail to launch.
    LaunchFailure,
}

/// Mock runner for testing.
#[derive(Debug, Clone)]
pub struct MockRunner {
    files: Vec<(String, Vec<u8>)>,
    output: String,
    exit: MockExit,
    /// Optional delay to simulate execution time
    pub execution_delay: Duration,
    invocations: Arc<Mutex<Vec<LaunchOptions>>>,
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRunner {
    /// Create a mock runner that exits 0 without writing anything.
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            output: String::new(),
            exit: MockExit::Code(0),
            execution_delay: Duration::ZERO,
            invocations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Write a file into the workspace during the run.
    pub fn with_file(mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.files.push((name.into(), content.into()));
        self
    }

    /// Write `result.yaml` with the given content.
    pub fn with_summary(self, yaml: &str) -> Self {
        self.with_file(crate::harvest::SUMMARY_FILE, yaml)
    }

    /// Captured output to report.
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    /// How the run ends.
    pub fn with_exit(mut self, exit: MockExit) -> Self {
        self.exit = exit;
        self
    }

    /// Launch options of every run so far.
    pub fn invocations(&self) -> Vec<LaunchOptions> {
        self.invocations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Runner for MockRunner {
    fn runner_type(&self) -> &'static str {
        "mock"
    }

    async fn run(&self, options: &LaunchOptions) -> Result<ExecutionOutcome> {
        self.invocations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(options.clone());

        let exit_code = match self.exit {
            MockExit::LaunchFailure => {
                return Err(RunnerError::BinaryNotFound(
                    options.binary.display().to_string(),
                ));
            }
            MockExit::TimedOut => None,
            MockExit::Code(code) => Some(code),
        };

        if !self.execution_delay.is_zero() {
            tokio::time::sleep(self.execution_delay).await;
        }

        for (name, content) in &self.files {
            tokio::fs::write(options.workspace.join(name), content).await?;
        }

        let duration_ms = self.execution_delay.as_millis() as u64;
        Ok(match exit_code {
            Some(code) => ExecutionOutcome::completed(Some(code), self.output.clone(), duration_ms),
            None => ExecutionOutcome::timed_out(self.output.clone(), duration_ms),
        })
    }
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for prover-server tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use prover_server::config::ExecutionConfig;
use prover_server::harvest::{FileGrouping, SummaryPolicy};
use prover_server::orchestrator::{JobOrchestrator, JobRequest};
use prover_server::runner::{HostOs, Runner};
use serde_json::{Map, Value};

/// Temp directories for binaries and workspaces, removed on drop.
pub struct TestContext {
    pub bin_dir: PathBuf,
    pub workspace_root: PathBuf,
    _temp_dir: tempfile::TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let bin_dir = temp_dir.path().join("bin");
        let workspace_root = temp_dir.path().join("jobs");
        std::fs::create_dir_all(&bin_dir).expect("Failed to create bin dir");
        Self {
            bin_dir,
            workspace_root,
            _temp_dir: temp_dir,
        }
    }

    pub fn config(
        &self,
        file_grouping: FileGrouping,
        summary_policy: SummaryPolicy,
    ) -> ExecutionConfig {
        ExecutionConfig {
            bin_dir: self.bin_dir.clone(),
            workspace_root: self.workspace_root.clone(),
            file_grouping,
            summary_policy,
        }
    }

    pub fn orchestrator(&self, runner: Arc<dyn Runner>) -> JobOrchestrator {
        self.orchestrator_with(runner, FileGrouping::ByExtension, SummaryPolicy::Lenient)
    }

    pub fn orchestrator_with(
        &self,
        runner: Arc<dyn Runner>,
        file_grouping: FileGrouping,
        summary_policy: SummaryPolicy,
    ) -> JobOrchestrator {
        JobOrchestrator::new(
            Arc::new(self.config(file_grouping, summary_policy)),
            runner,
        )
        .with_host_os(HostOs::Unix)
    }

    /// Entries left under the workspace root.
    pub fn leftover_workspaces(&self) -> Vec<String> {
        match std::fs::read_dir(&self.workspace_root) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Install an executable shell script as `bin/<name>`.
    #[cfg(unix)]
    pub fn install_prover(&self, name: &str, body: &str) -> PathBuf {
        write_script(&self.bin_dir.join(name), body)
    }
}

#[cfg(unix)]
pub fn write_script(path: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    std::fs::write(path, format!("#!/bin/sh\n{}\n", body)).expect("Failed to write script");
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .expect("Failed to chmod script");
    path.to_path_buf()
}

pub fn job(formula: &str, timeout_seconds: u64) -> JobRequest {
    JobRequest {
        formula: formula.to_string(),
        options: Map::new(),
        timeout_seconds,
        trace: false,
    }
}

pub fn job_with_options(formula: &str, options: Value, timeout_seconds: u64) -> JobRequest {
    JobRequest {
        formula: formula.to_string(),
        options: match options {
            Value::Object(map) => map,
            other => panic!("options must be an object, got {}", other),
        },
        timeout_seconds,
        trace: false,
    }
}

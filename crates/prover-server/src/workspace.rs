// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Per-request workspaces.
//!
//! Each job gets its own directory `{WORKSPACE_ROOT}/tmp-{uuid}/` holding:
//! - `formula.txt` - the formula to prove
//! - `options.json` - prover options
//! - `result.yaml` - summary written by the prover
//! - any further output files the prover produces
//!
//! The directory is removed when the request completes, on every exit path.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

use crate::error::{Error, Result};

/// Prefix for workspace directory names.
pub const WORKSPACE_PREFIX: &str = "tmp-";

/// Attempts at picking a fresh name before giving up.
const CREATE_ATTEMPTS: usize = 3;

/// Mode for the workspace directory: owner only.
#[cfg(unix)]
const WORKSPACE_DIR_MODE: u32 = 0o700;

/// Mode for input files: owner read-only.
#[cfg(unix)]
const INPUT_FILE_MODE: u32 = 0o400;

/// A request-private directory that is removed once the request is done.
///
/// Call [`Workspace::destroy`] on the normal path. If the handle is dropped
/// without it (early return, panic), the directory is removed synchronously
/// in `Drop`.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    name: String,
    destroyed: bool,
}

impl Workspace {
    /// Create a fresh workspace under `root`.
    ///
    /// Names are random and the directory is created exclusively, so
    /// concurrent requests never share a workspace.
    pub async fn create(root: &Path) -> Result<Self> {
        fs::create_dir_all(root).await.map_err(|e| {
            Error::Workspace(format!(
                "Failed to create workspace root {}: {}",
                root.display(),
                e
            ))
        })?;

        let mut builder = fs::DirBuilder::new();
        #[cfg(unix)]
        builder.mode(WORKSPACE_DIR_MODE);

        let mut last_err = None;
        for _ in 0..CREATE_ATTEMPTS {
            let name = format!("{}{}", WORKSPACE_PREFIX, uuid::Uuid::new_v4().simple());
            let path = root.join(&name);

            match builder.create(&path).await {
                Ok(()) => {
                    info!(workspace = %name, "Created workspace");
                    return Ok(Self {
                        path,
                        name,
                        destroyed: false,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    debug!(workspace = %name, "Workspace name collision, retrying");
                    last_err = Some(e);
                }
                Err(e) => {
                    return Err(Error::Workspace(format!(
                        "Failed to create workspace {}: {}",
                        path.display(),
                        e
                    )));
                }
            }
        }

        Err(Error::Workspace(format!(
            "Failed to allocate a unique workspace after {} attempts: {}",
            CREATE_ATTEMPTS,
            last_err.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    /// Absolute or root-relative path of the workspace directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory name (unique per request).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Write an input file readable only by the owner.
    ///
    /// The file must not already exist.
    pub async fn write_input(&self, file_name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path.join(file_name);

        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(INPUT_FILE_MODE);

        let write = async {
            let mut file = options.open(&path).await?;
            file.write_all(bytes).await?;
            file.flush().await
        };

        write.await.map_err(|e| {
            Error::Workspace(format!("Failed to write {}: {}", path.display(), e))
        })?;

        debug!(
            workspace = %self.name,
            file = %file_name,
            bytes = bytes.len(),
            "Wrote input file"
        );
        Ok(())
    }

    /// Write a value as a pretty-printed JSON input file.
    pub async fn write_json_input<T: Serialize>(&self, file_name: &str, value: &T) -> Result<()> {
        let content = serde_json::to_vec_pretty(value)?;
        self.write_input(file_name, &content).await
    }

    /// Remove the workspace and everything in it.
    ///
    /// Failures are logged, never returned.
    pub async fn destroy(mut self) {
        self.destroyed = true;
        match fs::remove_dir_all(&self.path).await {
            Ok(()) => info!(workspace = %self.name, "Cleaned up workspace"),
            Err(e) => error!(workspace = %self.name, error = %e, "Failed to clean up workspace"),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.destroyed {
            return;
        }
        // Blocking removal; Drop cannot await
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => info!(workspace = %self.name, "Cleaned up workspace on drop"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => error!(workspace = %self.name, error = %e, "Failed to clean up workspace"),
        }
    }
}

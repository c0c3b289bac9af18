// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for prover-server.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use crate::harvest::{FileGrouping, SummaryPolicy};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line.
    Json,
    /// Human-readable text.
    Text,
}

/// Settings that shape how each job is executed and harvested.
///
/// Resolved once at startup and shared by every request.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Directory holding the prover executables
    pub bin_dir: PathBuf,
    /// Parent directory for per-request workspaces
    pub workspace_root: PathBuf,
    /// How harvested output files are grouped in the response
    pub file_grouping: FileGrouping,
    /// Whether `stdout`/`timed_out` are always added to the summary
    pub summary_policy: SummaryPolicy,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            bin_dir: PathBuf::from("bin"),
            workspace_root: PathBuf::from("."),
            file_grouping: FileGrouping::ByExtension,
            summary_policy: SummaryPolicy::Lenient,
        }
    }
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen address
    pub http_addr: SocketAddr,
    /// Log output format
    pub log_format: LogFormat,
    /// Job execution settings
    pub execution: ExecutionConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port: u16 = lookup("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        // Only listen on loopback during local development
        let host = if lookup("ENV").as_deref() == Some("dev") {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        };

        let defaults = ExecutionConfig::default();

        let bin_dir = lookup("PROVER_BIN_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.bin_dir);

        let workspace_root = lookup("PROVER_WORKSPACE_ROOT")
            .map(PathBuf::from)
            .unwrap_or(defaults.workspace_root);

        let file_grouping = match lookup("PROVER_FILE_GROUPING") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                var: "PROVER_FILE_GROUPING",
                value: raw,
            })?,
            None => defaults.file_grouping,
        };

        let summary_policy = match lookup("PROVER_SUMMARY_FIELDS") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                var: "PROVER_SUMMARY_FIELDS",
                value: raw,
            })?,
            None => defaults.summary_policy,
        };

        let log_format = match lookup("LOG_FORMAT")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str()
        {
            "" | "json" => LogFormat::Json,
            "text" | "pretty" => LogFormat::Text,
            other => {
                return Err(ConfigError::InvalidValue {
                    var: "LOG_FORMAT",
                    value: other.to_string(),
                });
            }
        };

        Ok(Self {
            http_addr: SocketAddr::new(host, port),
            log_format,
            execution: ExecutionConfig {
                bin_dir,
                workspace_root,
                file_grouping,
                summary_policy,
            },
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The port number is invalid.
    #[error("Invalid port number")]
    InvalidPort,
    /// A variable holds a value outside its accepted set.
    #[error("Invalid value for {var}: {value}")]
    InvalidValue {
        /// Variable name.
        var: &'static str,
        /// Rejected value.
        value: String,
    },
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for prover-server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Server errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Request validation failed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Workspace could not be created or populated.
    #[error("Workspace error: {0}")]
    Workspace(String),

    /// Prover could not be launched.
    #[error("Runner error: {0}")]
    Runner(#[from] crate::runner::RunnerError),

    /// Summary artifact missing or unparseable.
    #[error("Summary error: {0}")]
    Summary(String),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// HTTP status reported to the caller.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Fatal errors carry no result body, only the status
        self.status_code().into_response()
    }
}

/// Result type using server Error.
pub type Result<T> = std::result::Result<T, Error>;

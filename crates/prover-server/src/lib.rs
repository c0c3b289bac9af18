// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Prover Server - HTTP job gateway for the prover binary
//!
//! Accepts a proof job over HTTP, materializes its inputs into a private
//! workspace, runs the prover against that workspace under a wall-clock
//! budget, and returns whatever the prover produced, even when it timed out.
//!
//! # Architecture
//!
//! ```text
//!            POST / {formula, options, timeout_seconds, trace}
//!                                 │
//!                                 ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      JobOrchestrator                             │
//! │                                                                  │
//! │  ┌───────────┐    ┌──────────────┐    ┌───────────┐              │
//! │  │ Workspace │───►│    Runner    │───►│  Harvest  │              │
//! │  │  create   │    │ (deadline +  │    │  summary  │              │
//! │  │  inputs   │    │  group kill) │    │ + outputs │              │
//! │  └───────────┘    └──────────────┘    └───────────┘              │
//! │        │                                     │                   │
//! │        └──────────── destroy (always) ◄──────┘                   │
//! └─────────────────────────────────────────────────────────────────┘
//!                                 │
//!                                 ▼
//!                    {summary: {...}, files: {...}}
//! ```
//!
//! # Workspace Layout
//!
//! | File | Written by | Description |
//! |------|------------|-------------|
//! | `formula.txt` | server | Formula to prove (mode `0400`) |
//! | `options.json` | server | Prover options (mode `0400`) |
//! | `result.yaml` | prover | Summary, always expected |
//! | anything else | prover | Harvested into `files` |
//!
//! # Failure Handling
//!
//! | Condition | Response |
//! |-----------|----------|
//! | Malformed body, empty formula, timeout outside 1..=10 | `400`, no workspace created |
//! | Workspace create/write failure, prover launch failure | `500` |
//! | Missing or unparseable `result.yaml` | `500` |
//! | Prover timed out | `200`, `summary.timed_out = true` |
//! | Prover exited non-zero | `200`, output in `summary.stdout` |
//! | Unreadable individual output file | skipped |
//!
//! # Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `PORT` | No | `3000` | HTTP port |
//! | `ENV` | No | - | `dev` binds to `127.0.0.1` instead of `0.0.0.0` |
//! | `PROVER_BIN_DIR` | No | `bin` | Directory with `prover`, `prover-trace` |
//! | `PROVER_WORKSPACE_ROOT` | No | `.` | Parent of per-request workspaces |
//! | `PROVER_FILE_GROUPING` | No | `extension` | `extension` or `flat` |
//! | `PROVER_SUMMARY_FIELDS` | No | `lenient` | `lenient` or `strict` |
//! | `LOG_FORMAT` | No | `json` | `json` or `text` |
//!
//! # Modules
//!
//! - [`config`]: Server configuration from environment variables
//! - [`error`]: Error types and HTTP status mapping
//! - [`workspace`]: Per-request workspace lifecycle
//! - [`runner`]: Bounded prover execution
//! - [`harvest`]: Summary parsing and output collection
//! - [`orchestrator`]: Job pipeline
//! - [`server`]: HTTP routes and middleware

#![deny(missing_docs)]

/// Server configuration loaded from environment variables.
pub mod config;

/// Error types for server operations.
pub mod error;

/// Reading the prover's summary and output files.
pub mod harvest;

/// Job request validation and the end-to-end pipeline.
pub mod orchestrator;

/// Prover execution backends.
pub mod runner;

/// HTTP server.
pub mod server;

/// Per-request workspace directories.
pub mod workspace;

pub use config::Config;
pub use error::Error;

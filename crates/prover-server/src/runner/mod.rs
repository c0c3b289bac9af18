// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Runner module - bounded prover execution backends.

mod binary;
pub mod mock;
pub mod process;
mod traits;

pub use binary::{HostOs, PROVER_BINARY, resolve_binary};
pub use mock::{MockExit, MockRunner};
pub use process::{GroupKiller, ProcessRunner};
pub use traits::*;

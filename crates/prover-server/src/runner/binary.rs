// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Prover binary selection.

use std::path::{Path, PathBuf};

/// Base name of the prover executable.
pub const PROVER_BINARY: &str = "prover";

/// Host platform, as far as binary naming is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    /// Windows builds carry a `-windows.exe` suffix.
    Windows,
    /// Linux, macOS and other Unix-likes.
    Unix,
}

impl HostOs {
    /// Platform this process was built for.
    pub fn current() -> Self {
        if cfg!(windows) {
            HostOs::Windows
        } else {
            HostOs::Unix
        }
    }
}

/// Resolve the prover executable for a job.
///
/// `{bin_dir}/prover[-trace][-windows.exe]`
pub fn resolve_binary(bin_dir: &Path, trace: bool, os: HostOs) -> PathBuf {
    let mut name = PROVER_BINARY.to_string();
    if trace {
        name.push_str("-trace");
    }
    if os == HostOs::Windows {
        name.push_str("-windows.exe");
    }
    bin_dir.join(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_binary() {
        let path = resolve_binary(Path::new("bin"), false, HostOs::Unix);
        assert_eq!(path, PathBuf::from("bin/prover"));
    }

    #[test]
    fn test_trace_binary() {
        let path = resolve_binary(Path::new("bin"), true, HostOs::Unix);
        assert_eq!(path, PathBuf::from("bin/prover-trace"));
    }

    #[test]
    fn test_windows_binaries() {
        let bin = Path::new("bin");
        assert_eq!(
            resolve_binary(bin, false, HostOs::Windows),
            bin.join("prover-windows.exe")
        );
        assert_eq!(
            resolve_binary(bin, true, HostOs::Windows),
            bin.join("prover-trace-windows.exe")
        );
    }
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Native process runner.
//!
//! Launches the prover as a child process in its own process group, captures
//! stdout and stderr into one buffer, and kills the whole group when the
//! deadline passes.

use async_trait::async_trait;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::runner::{
    ExecutionOutcome, LaunchOptions, ProcessTerminator, Result, Runner, RunnerError,
};

/// How long to wait for output pipes to close once the process is gone.
const DEFAULT_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Kills a whole process group with SIGKILL.
///
/// On non-Unix hosts there are no process groups; the runner falls back to
/// killing the direct child.
#[derive(Debug, Default, Clone, Copy)]
pub struct GroupKiller;

impl ProcessTerminator for GroupKiller {
    #[cfg(unix)]
    fn terminate(&self, pid: u32) -> std::io::Result<()> {
        use nix::errno::Errno;
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        let pgid = i32::try_from(pid).map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "pid out of range")
        })?;

        match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
            Ok(()) => {
                debug!(pgid = pgid, "Sent SIGKILL to process group");
                Ok(())
            }
            Err(Errno::ESRCH) => {
                debug!(pgid = pgid, "Process group already gone (ESRCH)");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    #[cfg(not(unix))]
    fn terminate(&self, _pid: u32) -> std::io::Result<()> {
        Ok(())
    }
}

/// Runner that executes the prover as a local child process.
#[derive(Debug)]
pub struct ProcessRunner {
    terminator: Arc<dyn ProcessTerminator>,
    drain_grace: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRunner {
    /// Create a runner that kills process groups on timeout.
    pub fn new() -> Self {
        Self::with_terminator(Arc::new(GroupKiller))
    }

    /// Create a runner with a custom termination strategy.
    pub fn with_terminator(terminator: Arc<dyn ProcessTerminator>) -> Self {
        Self {
            terminator,
            drain_grace: DEFAULT_DRAIN_GRACE,
        }
    }

    /// Override how long output pipes may stay open after exit.
    pub fn drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }

    fn terminate_group(&self, pid: Option<u32>) {
        let Some(pid) = pid else {
            return;
        };
        if let Err(e) = self.terminator.terminate(pid) {
            warn!(pid = pid, error = %e, "Failed to terminate process group");
        }
    }

    /// Wait for the output readers to hit EOF.
    ///
    /// Descendants that outlive the prover keep the pipes open; if the grace
    /// period passes, the group is killed and the readers get one more grace
    /// period before being aborted.
    async fn drain(&self, readers: Vec<JoinHandle<()>>, pid: Option<u32>) {
        let mut pending = Vec::new();
        let deadline = tokio::time::Instant::now() + self.drain_grace;
        for mut reader in readers {
            if tokio::time::timeout_at(deadline, &mut reader).await.is_err() {
                pending.push(reader);
            }
        }

        if pending.is_empty() {
            return;
        }

        warn!(
            pid = ?pid,
            "Output still held open by descendants, terminating process group"
        );
        self.terminate_group(pid);

        let deadline = tokio::time::Instant::now() + self.drain_grace;
        for mut reader in pending {
            if tokio::time::timeout_at(deadline, &mut reader).await.is_err() {
                reader.abort();
            }
        }
    }
}

/// Kills the process group when a run is abandoned before it finishes,
/// e.g. when the request future is dropped.
struct GroupGuard {
    terminator: Arc<dyn ProcessTerminator>,
    pid: Option<u32>,
}

impl GroupGuard {
    fn disarm(mut self) {
        self.pid = None;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        let Some(pid) = self.pid.take() else {
            return;
        };
        debug!(pid = pid, "Run abandoned, terminating process group");
        if let Err(e) = self.terminator.terminate(pid) {
            warn!(pid = pid, error = %e, "Failed to terminate process group");
        }
    }
}

/// Copy a child stream into the shared output buffer until EOF.
fn spawn_reader<R>(stream: Option<R>, sink: Arc<Mutex<Vec<u8>>>) -> Option<JoinHandle<()>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut stream = stream?;
    Some(tokio::spawn(async move {
        let mut buf = [0u8; 8192];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    let mut out = sink.lock().unwrap_or_else(|e| e.into_inner());
                    out.extend_from_slice(&buf[..n]);
                }
                Err(e) => {
                    debug!(error = %e, "Output stream read failed");
                    break;
                }
            }
        }
    }))
}

#[async_trait]
impl Runner for ProcessRunner {
    fn runner_type(&self) -> &'static str {
        "process"
    }

    async fn run(&self, options: &LaunchOptions) -> Result<ExecutionOutcome> {
        let start = Instant::now();

        let mut cmd = Command::new(&options.binary);
        cmd.args(options.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group so the prover and its children die together
        #[cfg(unix)]
        cmd.process_group(0);

        debug!(
            binary = %options.binary.display(),
            workspace = %options.workspace.display(),
            timeout_ms = options.timeout.as_millis() as u64,
            "Launching prover"
        );

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                error!(binary = %options.binary.display(), "Prover binary not found");
                return Err(RunnerError::BinaryNotFound(
                    options.binary.display().to_string(),
                ));
            }
            Err(e) => {
                error!(binary = %options.binary.display(), error = %e, "Failed to start prover");
                return Err(RunnerError::StartFailed(format!(
                    "{}: {}",
                    options.binary.display(),
                    e
                )));
            }
        };

        let pid = child.id();
        let guard = GroupGuard {
            terminator: self.terminator.clone(),
            pid,
        };
        let output = Arc::new(Mutex::new(Vec::new()));
        let readers: Vec<JoinHandle<()>> = [
            spawn_reader(child.stdout.take(), output.clone()),
            spawn_reader(child.stderr.take(), output.clone()),
        ]
        .into_iter()
        .flatten()
        .collect();

        let waited = tokio::time::timeout(options.timeout, child.wait()).await;
        let (timed_out, exit_code) = match waited {
            Ok(Ok(status)) => {
                if status.success() {
                    info!(pid = ?pid, "Prover completed");
                } else {
                    warn!(pid = ?pid, status = %status, "Prover exited with error");
                }
                (false, status.code())
            }
            Ok(Err(e)) => {
                // Guard drop kills the group
                error!(pid = ?pid, error = %e, "Error waiting for prover");
                return Err(RunnerError::Io(e));
            }
            Err(_) => {
                warn!(
                    pid = ?pid,
                    timeout_ms = options.timeout.as_millis() as u64,
                    "Prover timed out, killing process group"
                );
                self.terminate_group(pid);
                if let Err(e) = child.start_kill() {
                    debug!(error = %e, "Direct kill after group kill failed");
                }
                if let Err(e) = child.wait().await {
                    warn!(pid = ?pid, error = %e, "Failed to reap prover");
                }
                (true, None)
            }
        };

        self.drain(readers, pid).await;
        guard.disarm();

        let captured_output = {
            let out = output.lock().unwrap_or_else(|e| e.into_inner());
            String::from_utf8_lossy(&out).into_owned()
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        Ok(if timed_out {
            ExecutionOutcome::timed_out(captured_output, duration_ms)
        } else {
            ExecutionOutcome::completed(exit_code, captured_output, duration_ms)
        })
    }
}

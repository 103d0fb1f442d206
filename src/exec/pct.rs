//! Proxmox `pct` integration
//!
//! Production [`ContainerExec`] implementation that spawns
//! `pct exec <vmid> -- sh -c <script> sh <args...>` on the host, plus the
//! fleet listing built on `pct list`.

use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::{CommandOutput, ContainerExec};
use crate::error::{FleetError, Result};

/// One LXC container as reported by `pct list`.
///
/// Immutable for the duration of a convergence run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    /// Runtime-assigned container id (stable)
    pub vmid: String,

    /// Container name (unique on the host)
    pub name: String,

    /// Whether the container was running when the fleet was enumerated
    pub running: bool,
}

/// Executes commands inside containers via the host's `pct` binary.
#[derive(Debug, Clone)]
pub struct PctExecutor {
    /// Per-command timeout
    timeout: Duration,
}

impl PctExecutor {
    /// Create an executor with the given per-command timeout.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Enumerate the host's LXC containers.
    ///
    /// Runs `pct list` and parses its columnar output. The header line is
    /// skipped; each row is whitespace-split into VMID, status, and name
    /// (the name is the last column, so an empty lock column collapses away).
    pub async fn list_containers(&self) -> Result<Vec<Container>> {
        let output = Command::new("pct")
            .arg("list")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| FleetError::exec(format!("failed to run pct list: {}", e)))?;

        if !output.status.success() {
            return Err(FleetError::exec(format!(
                "pct list exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(parse_container_list(&String::from_utf8_lossy(
            &output.stdout,
        )))
    }
}

/// Exit code for a finished `pct exec`. A signal-terminated process has no
/// exit code; report it as the shell convention 128+signal so a killed
/// install can never read as success (`exit_code: None` counts as success).
fn exit_code_for(status: ExitStatus) -> Option<i32> {
    status.code().or_else(|| status.signal().map(|s| 128 + s))
}

/// Parse `pct list` output into containers. Malformed rows are skipped.
pub fn parse_container_list(raw: &str) -> Vec<Container> {
    let mut containers = Vec::new();

    for line in raw.lines().skip(1) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            if !line.trim().is_empty() {
                warn!("Skipping unparseable pct list row: {:?}", line);
            }
            continue;
        }

        containers.push(Container {
            vmid: parts[0].to_string(),
            running: parts[1] == "running",
            // Last column, so a populated lock column does not shift the name
            name: parts[parts.len() - 1].to_string(),
        });
    }

    containers
}

#[async_trait]
impl ContainerExec for PctExecutor {
    async fn exec(&self, vmid: &str, script: &str, args: &[String]) -> Result<CommandOutput> {
        let mut cmd = Command::new("pct");
        cmd.arg("exec")
            .arg(vmid)
            .arg("--")
            .arg("sh")
            .arg("-c")
            .arg(script)
            // argv[0] for the inner shell; positional parameters follow
            .arg("sh")
            .args(args)
            .stdin(Stdio::null());

        debug!("pct exec {}: {}", vmid, script);

        let result = timeout(self.timeout, cmd.output()).await;

        let output = match result {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(FleetError::exec(format!(
                    "failed to run pct exec for {}: {}",
                    vmid, e
                )));
            }
            Err(_) => {
                warn!(
                    "Command in container {} timed out after {}ms",
                    vmid,
                    self.timeout.as_millis()
                );
                return Err(FleetError::Timeout(self.timeout.as_millis() as u64));
            }
        };

        let out = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: exit_code_for(output.status),
        };

        debug!(
            "pct exec {} completed: exit_code={:?}, stdout_len={}, stderr_len={}",
            vmid,
            out.exit_code,
            out.stdout.len(),
            out.stderr.len()
        );

        Ok(out)
    }
}

//! Readiness probes
//!
//! Non-mutating checks that answer whether each SSH subsystem already
//! satisfies its target state. Probes never change anything; the reconcilers
//! act only on an `Unsatisfied` verdict.

use tracing::debug;

use super::distro::CommandDialect;
use super::password::PasswordAuth;
use crate::error::{FleetError, Result};
use crate::exec::ContainerExec;

/// Path of the SSH server configuration inside a container.
pub const SSHD_CONFIG: &str = "/etc/ssh/sshd_config";

/// Sentinel exit code the password-auth probe uses for "config file absent",
/// so it never collides with a plain command failure.
const CONFIG_ABSENT_EXIT: i32 = 90;

/// Tri-state probe verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Subsystem already matches the target state
    Satisfied,
    /// Subsystem needs a mutation
    Unsatisfied,
    /// Target object absent; nothing to check or mutate
    Indeterminate,
}

/// Is the sshd executable present on the container's search path?
pub async fn daemon_installed(exec: &dyn ContainerExec, vmid: &str) -> Result<Readiness> {
    let out = exec
        .exec_plain(vmid, "command -v sshd > /dev/null 2>&1")
        .await?;

    debug!("daemon probe for {}: exit_code={:?}", vmid, out.exit_code);
    if out.success() {
        Ok(Readiness::Satisfied)
    } else {
        Ok(Readiness::Unsatisfied)
    }
}

/// Is the SSH service both registered for boot and currently active?
///
/// Only meaningful once the daemon is installed.
pub async fn service_ready(
    exec: &dyn ContainerExec,
    vmid: &str,
    dialect: &CommandDialect,
) -> Result<Readiness> {
    let out = exec.exec_plain(vmid, dialect.service_check).await?;

    debug!("service probe for {}: exit_code={:?}", vmid, out.exit_code);
    if out.success() {
        Ok(Readiness::Satisfied)
    } else {
        Ok(Readiness::Unsatisfied)
    }
}

/// Does sshd_config pin `PasswordAuthentication` to the desired value?
///
/// `Indeterminate` means the config file does not exist (daemon never
/// configured); the caller treats that as "nothing to edit".
pub async fn password_auth(
    exec: &dyn ContainerExec,
    vmid: &str,
    desired: PasswordAuth,
) -> Result<Readiness> {
    let script = format!(
        "[ -f {config} ] || exit {absent}; cat {config}",
        config = SSHD_CONFIG,
        absent = CONFIG_ABSENT_EXIT,
    );
    let out = exec.exec_plain(vmid, &script).await?;

    match out.exit_code {
        Some(0) => {
            let directive = format!("PasswordAuthentication {}", desired.as_str());
            let satisfied = out.stdout.lines().any(|line| line.trim() == directive);
            debug!(
                "password-auth probe for {}: directive present={}",
                vmid, satisfied
            );
            if satisfied {
                Ok(Readiness::Satisfied)
            } else {
                Ok(Readiness::Unsatisfied)
            }
        }
        Some(code) if code == CONFIG_ABSENT_EXIT => Ok(Readiness::Indeterminate),
        _ => Err(FleetError::exec(format!(
            "failed to read {} in container {}: {}",
            SSHD_CONFIG,
            vmid,
            out.error_text()
        ))),
    }
}

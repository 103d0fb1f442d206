//! Password-authentication enforcer
//!
//! Pins the `PasswordAuthentication` directive in sshd_config to the desired
//! value and restarts the SSH service only when an actual edit occurred.

use clap::ValueEnum;
use serde::Serialize;
use tracing::{info, warn};

use super::distro::CommandDialect;
use super::probe::{self, Readiness, SSHD_CONFIG};
use crate::error::FleetError;
use crate::exec::ContainerExec;
use crate::report::Outcome;

/// Desired `PasswordAuthentication` value. A closed set, so the value can be
/// embedded in remote commands without escaping concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordAuth {
    Yes,
    No,
}

impl PasswordAuth {
    pub fn as_str(&self) -> &'static str {
        match self {
            PasswordAuth::Yes => "yes",
            PasswordAuth::No => "no",
        }
    }
}

/// Rewrite script: replace any `PasswordAuthentication` line, commented or
/// not, with exactly one directive; append it if the file had none at all
/// (otherwise a config without the directive would report `changed` forever).
fn rewrite_script(desired: PasswordAuth) -> String {
    rewrite_script_for(desired, SSHD_CONFIG)
}

fn rewrite_script_for(desired: PasswordAuth, config: &str) -> String {
    format!(
        "sed -E -i 's|^#?(PasswordAuthentication)\\s.*|\\1 {value}|' {config} && \
         {{ grep -q '^PasswordAuthentication ' {config} || echo 'PasswordAuthentication {value}' >> {config}; }}",
        value = desired.as_str(),
        config = config,
    )
}

/// Converge one container's `PasswordAuthentication` directive.
pub async fn reconcile(
    exec: &dyn ContainerExec,
    vmid: &str,
    dialect: &CommandDialect,
    desired: PasswordAuth,
) -> Outcome {
    let readiness = match probe::password_auth(exec, vmid, desired).await {
        Ok(readiness) => readiness,
        Err(e) => return Outcome::failed(&e),
    };

    match readiness {
        // Nothing to edit; treated as a non-error terminal state
        Readiness::Indeterminate => Outcome::changed("SSH not installed or not configured"),
        Readiness::Satisfied => Outcome::unchanged(format!(
            "PasswordAuthentication already set to {}",
            desired.as_str()
        )),
        Readiness::Unsatisfied => {
            match exec.exec_plain(vmid, &rewrite_script(desired)).await {
                Ok(out) if out.success() => {}
                Ok(out) => {
                    return Outcome::failed(&FleetError::exec(format!(
                        "failed to rewrite {}: {}",
                        SSHD_CONFIG,
                        out.error_text()
                    )));
                }
                Err(e) => return Outcome::failed(&e),
            }

            // The edit landed; a restart failure does not undo it and the
            // next run will settle into the no-op branch.
            match exec.exec_plain(vmid, dialect.restart).await {
                Ok(out) if out.success() => {}
                Ok(out) => warn!(
                    "Container {}: SSH restart failed after config edit: {}",
                    vmid,
                    out.error_text()
                ),
                Err(e) => warn!(
                    "Container {}: SSH restart failed after config edit: {}",
                    vmid, e
                ),
            }

            info!(
                "Container {}: PasswordAuthentication set to {}",
                vmid,
                desired.as_str()
            );
            Outcome::changed(format!("PasswordAuthentication set to {}", desired.as_str()))
        }
    }
}

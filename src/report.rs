//! Convergence outcomes and the fleet report
//!
//! Every reconciler invocation on one container produces an [`Outcome`]; the
//! coordinator aggregates them per container and per stage into a
//! [`FleetReport`] suitable for line-oriented display or JSON output.

use serde::Serialize;

use crate::error::FleetError;
use crate::exec::Container;

/// The three SSH subsystems the engine converges, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// OpenSSH package installed, service enabled and started
    Service,
    /// `PasswordAuthentication` directive pinned
    PasswordAuth,
    /// Root authorized_keys reconciled
    AuthorizedKeys,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Service => "service",
            Stage::PasswordAuth => "password-auth",
            Stage::AuthorizedKeys => "authorized-keys",
        }
    }
}

/// Structured error category carried by failed outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ExecutionFailure,
    Timeout,
    UnsupportedDistro,
    KeyFileMissing,
    KeyFileEmpty,
    MergeWriteFailure,
}

impl From<&FleetError> for ErrorKind {
    fn from(err: &FleetError) -> Self {
        match err {
            FleetError::Timeout(_) => ErrorKind::Timeout,
            FleetError::UnsupportedDistro(_) => ErrorKind::UnsupportedDistro,
            FleetError::KeyFileMissing(_) => ErrorKind::KeyFileMissing,
            FleetError::KeyFileEmpty(_) => ErrorKind::KeyFileEmpty,
            FleetError::MergeWrite(_) => ErrorKind::MergeWriteFailure,
            FleetError::Exec(_) | FleetError::Config(_) | FleetError::Io(_) => {
                ErrorKind::ExecutionFailure
            }
        }
    }
}

/// Result of one reconciler invocation on one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Already converged; nothing was touched
    Unchanged { detail: String },
    /// A mutation was applied
    Changed { detail: String },
    /// Stage was not attempted (container stopped, or prerequisite unknown)
    Skipped { detail: String },
    /// Stage was attempted and failed; other stages and containers continue
    Failed { kind: ErrorKind, detail: String },
}

impl Outcome {
    pub fn unchanged(detail: impl Into<String>) -> Self {
        Outcome::Unchanged {
            detail: detail.into(),
        }
    }

    pub fn changed(detail: impl Into<String>) -> Self {
        Outcome::Changed {
            detail: detail.into(),
        }
    }

    pub fn skipped(detail: impl Into<String>) -> Self {
        Outcome::Skipped {
            detail: detail.into(),
        }
    }

    pub fn failed(err: &FleetError) -> Self {
        Outcome::Failed {
            kind: err.into(),
            detail: err.to_string(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped { .. })
    }
}

/// All stage outcomes for one container.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerReport {
    pub vmid: String,
    pub name: String,
    pub running: bool,
    pub stages: Vec<(Stage, Outcome)>,
}

impl ContainerReport {
    pub fn new(container: &Container) -> Self {
        Self {
            vmid: container.vmid.clone(),
            name: container.name.clone(),
            running: container.running,
            stages: Vec::new(),
        }
    }

    pub fn record(&mut self, stage: Stage, outcome: Outcome) {
        self.stages.push((stage, outcome));
    }

    /// True if every attempted (non-skipped) stage failed, and at least one was attempted.
    fn failed_outright(&self) -> bool {
        let attempted: Vec<_> = self
            .stages
            .iter()
            .filter(|(_, outcome)| !outcome.is_skipped())
            .collect();
        !attempted.is_empty() && attempted.iter().all(|(_, outcome)| outcome.is_failed())
    }
}

/// Fleet-level aggregation, one entry per container in enumeration order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FleetReport {
    pub containers: Vec<ContainerReport>,
}

impl FleetReport {
    pub fn push(&mut self, entry: ContainerReport) {
        self.containers.push(entry);
    }

    /// True if every container that attempted any stage failed all of them.
    ///
    /// A fleet where nothing was attempted (all stopped) does not count as
    /// failed.
    pub fn all_failed(&self) -> bool {
        let attempted: Vec<_> = self
            .containers
            .iter()
            .filter(|c| c.stages.iter().any(|(_, o)| !o.is_skipped()))
            .collect();
        !attempted.is_empty() && attempted.iter().all(|c| c.failed_outright())
    }

    /// One line per container and stage, for the operator.
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        for container in &self.containers {
            for (stage, outcome) in &container.stages {
                let status = match outcome {
                    Outcome::Unchanged { detail } => format!("ok (no change) - {}", detail),
                    Outcome::Changed { detail } => format!("changed - {}", detail),
                    Outcome::Skipped { detail } => format!("skipped - {}", detail),
                    Outcome::Failed { detail, .. } => format!("FAILED - {}", detail),
                };
                lines.push(format!(
                    "{} ({}) [{}] {}",
                    container.name,
                    container.vmid,
                    stage.as_str(),
                    status
                ));
            }
        }
        lines.join("\n")
    }

    /// Machine-readable report.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(vmid: &str, name: &str, running: bool) -> Container {
        Container {
            vmid: vmid.to_string(),
            name: name.to_string(),
            running,
        }
    }

    #[test]
    fn test_render_one_line_per_stage() {
        let mut report = FleetReport::default();
        let mut entry = ContainerReport::new(&container("100", "web01", true));
        entry.record(Stage::Service, Outcome::changed("OpenSSH installed"));
        entry.record(Stage::PasswordAuth, Outcome::unchanged("already set"));
        report.push(entry);

        let rendered = report.render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("web01 (100) [service] changed - OpenSSH installed"));
        assert!(lines[1].contains("[password-auth] ok (no change)"));
    }

    #[test]
    fn test_all_failed() {
        let err = FleetError::exec("boom");

        let mut report = FleetReport::default();
        let mut entry = ContainerReport::new(&container("100", "web01", true));
        entry.record(Stage::Service, Outcome::failed(&err));
        entry.record(Stage::PasswordAuth, Outcome::skipped("daemon state unknown"));
        report.push(entry);

        let mut stopped = ContainerReport::new(&container("101", "db01", false));
        stopped.record(Stage::Service, Outcome::skipped("not running"));
        report.push(stopped);

        // The only container that attempted anything failed everything
        assert!(report.all_failed());
    }

    #[test]
    fn test_all_failed_is_false_with_one_success() {
        let err = FleetError::exec("boom");

        let mut report = FleetReport::default();
        let mut bad = ContainerReport::new(&container("100", "web01", true));
        bad.record(Stage::Service, Outcome::failed(&err));
        report.push(bad);

        let mut good = ContainerReport::new(&container("101", "db01", true));
        good.record(Stage::Service, Outcome::unchanged("already configured"));
        report.push(good);

        assert!(!report.all_failed());
    }

    #[test]
    fn test_all_failed_is_false_when_nothing_attempted() {
        let mut report = FleetReport::default();
        let mut stopped = ContainerReport::new(&container("101", "db01", false));
        stopped.record(Stage::Service, Outcome::skipped("not running"));
        report.push(stopped);

        assert!(!report.all_failed());
    }

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(
            ErrorKind::from(&FleetError::Timeout(1000)),
            ErrorKind::Timeout
        );
        assert_eq!(
            ErrorKind::from(&FleetError::UnsupportedDistro("arch".into())),
            ErrorKind::UnsupportedDistro
        );
        assert_eq!(
            ErrorKind::from(&FleetError::merge_write("disk full")),
            ErrorKind::MergeWriteFailure
        );
        assert_eq!(
            ErrorKind::from(&FleetError::exec("spawn failed")),
            ErrorKind::ExecutionFailure
        );
    }

    #[test]
    fn test_json_report_shape() {
        let mut report = FleetReport::default();
        let mut entry = ContainerReport::new(&container("100", "web01", true));
        entry.record(Stage::Service, Outcome::changed("OpenSSH installed"));
        report.push(entry);

        let json = report.to_json().unwrap();
        assert!(json.contains("\"status\": \"changed\""));
        assert!(json.contains("\"vmid\": \"100\""));
    }
}

//! Package/Service reconciler
//!
//! Ensures the OpenSSH daemon package is installed and its service is
//! registered for boot and running, doing the minimum necessary: a container
//! with the binary baked into its base image gets only the enable+start
//! sequence, never a package reinstall.

use tracing::{debug, info};

use super::distro::DistroInfo;
use super::probe::{self, Readiness};
use crate::error::FleetError;
use crate::exec::ContainerExec;
use crate::report::Outcome;

/// Converge one container's SSH daemon package and service.
pub async fn reconcile(exec: &dyn ContainerExec, vmid: &str, distro: &DistroInfo) -> Outcome {
    let Some(dialect) = distro.family.dialect() else {
        // No remote command is attempted for an unknown distro
        return Outcome::failed(&FleetError::UnsupportedDistro(distro.id().to_string()));
    };

    let daemon = match probe::daemon_installed(exec, vmid).await {
        Ok(readiness) => readiness,
        Err(e) => return Outcome::failed(&e),
    };

    if daemon == Readiness::Satisfied {
        let service = match probe::service_ready(exec, vmid, dialect).await {
            Ok(readiness) => readiness,
            Err(e) => return Outcome::failed(&e),
        };

        if service == Readiness::Satisfied {
            debug!("Container {}: OpenSSH already installed and active", vmid);
            return Outcome::unchanged("OpenSSH already installed and properly configured");
        }

        // Binary present, service not registered/running: enable+start only
        return match exec.exec_plain(vmid, dialect.enable_start).await {
            Ok(out) if out.success() => {
                info!("Container {}: SSH service started and enabled", vmid);
                Outcome::changed("SSH service started and enabled")
            }
            Ok(out) => Outcome::failed(&FleetError::exec(format!(
                "failed to enable SSH service: {}",
                out.error_text()
            ))),
            Err(e) => Outcome::failed(&e),
        };
    }

    match exec.exec_plain(vmid, dialect.install).await {
        Ok(out) if out.success() => {
            info!("Container {}: OpenSSH installed and configured", vmid);
            Outcome::changed("OpenSSH successfully installed and configured")
        }
        Ok(out) => Outcome::failed(&FleetError::exec(format!(
            "failed to install OpenSSH: {}",
            out.error_text()
        ))),
        Err(e) => Outcome::failed(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converge::distro::parse_os_release;
    use crate::exec::MockExec;
    use crate::report::ErrorKind;

    fn debian() -> DistroInfo {
        parse_os_release("ID=debian\n")
    }

    fn alpine() -> DistroInfo {
        parse_os_release("ID=alpine\n")
    }

    #[tokio::test]
    async fn test_already_installed_and_active_is_unchanged() {
        let mock = MockExec::new();
        mock.push_status("100", 0, ""); // daemon probe
        mock.push_status("100", 0, ""); // service probe

        let outcome = reconcile(&mock, "100", &debian()).await;
        assert_eq!(
            outcome,
            Outcome::unchanged("OpenSSH already installed and properly configured")
        );
        // Nothing beyond the two probes was dispatched
        assert_eq!(mock.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_installed_but_stopped_enables_without_reinstall() {
        let mock = MockExec::new();
        mock.push_status("101", 0, ""); // daemon probe: present
        mock.push_status("101", 1, ""); // service probe: not active
        mock.push_status("101", 0, ""); // enable+start

        let outcome = reconcile(&mock, "101", &alpine()).await;
        assert_eq!(outcome, Outcome::changed("SSH service started and enabled"));

        let scripts = mock.scripts_for("101");
        assert_eq!(scripts[2], "rc-update add sshd && rc-service sshd start");
        assert!(!scripts.iter().any(|s| s.contains("apk add")));
    }

    #[tokio::test]
    async fn test_missing_daemon_installs_per_family() {
        let mock = MockExec::new();
        mock.push_status("100", 1, ""); // daemon probe: absent
        mock.push_status("100", 0, ""); // install

        let outcome = reconcile(&mock, "100", &debian()).await;
        assert_eq!(
            outcome,
            Outcome::changed("OpenSSH successfully installed and configured")
        );

        let scripts = mock.scripts_for("100");
        assert!(scripts[1].starts_with("apt-get update && apt-get install -y openssh-server"));
    }

    #[tokio::test]
    async fn test_rhel_install_uses_sshd_unit() {
        let mock = MockExec::new();
        mock.push_status("100", 1, "");
        mock.push_status("100", 0, "");

        let rhel = parse_os_release("ID=centos\n");
        reconcile(&mock, "100", &rhel).await;

        let scripts = mock.scripts_for("100");
        assert!(scripts[1].contains("yum install -y openssh-server"));
        assert!(scripts[1].contains("systemctl enable sshd"));
    }

    #[tokio::test]
    async fn test_unsupported_distro_fails_without_remote_calls() {
        let mock = MockExec::new();
        let gentoo = parse_os_release("ID=gentoo\n");

        let outcome = reconcile(&mock, "100", &gentoo).await;
        match outcome {
            Outcome::Failed { kind, detail } => {
                assert_eq!(kind, ErrorKind::UnsupportedDistro);
                assert!(detail.contains("gentoo"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_install_failure_carries_stderr() {
        let mock = MockExec::new();
        mock.push_status("100", 1, "");
        mock.push_failure("100", 1, "E: Unable to locate package openssh-server");

        let outcome = reconcile(&mock, "100", &debian()).await;
        match outcome {
            Outcome::Failed { kind, detail } => {
                assert_eq!(kind, ErrorKind::ExecutionFailure);
                assert!(detail.contains("Unable to locate package"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_idempotence_second_run_is_unchanged() {
        let mock = MockExec::new();
        // First run: install needed
        mock.push_status("100", 1, "");
        mock.push_status("100", 0, "");
        // Second run: daemon present, service active
        mock.push_status("100", 0, "");
        mock.push_status("100", 0, "");

        let first = reconcile(&mock, "100", &debian()).await;
        let second = reconcile(&mock, "100", &debian()).await;
        assert!(matches!(first, Outcome::Changed { .. }));
        assert!(matches!(second, Outcome::Unchanged { .. }));
    }

    #[tokio::test]
    async fn test_probe_exec_error_is_failure() {
        let mock = MockExec::new();
        mock.push_error("100", FleetError::Timeout(60000));

        let outcome = reconcile(&mock, "100", &debian()).await;
        match outcome {
            Outcome::Failed { kind, .. } => assert_eq!(kind, ErrorKind::Timeout),
            other => panic!("expected failure, got {:?}", other),
        }
    }
}

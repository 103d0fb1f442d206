//! Fleet coordinator
//!
//! Drives the convergence pipeline over every container with bounded
//! parallelism, isolates per-container failures, and aggregates outcomes
//! into a [`FleetReport`]. One container's failure (or panic) never stops
//! the sweep.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::converge::{self, keys, password, service};
use crate::converge::{DistroFamily, MergeMode, PasswordAuth};
use crate::error::FleetError;
use crate::exec::{Container, ContainerExec};
use crate::report::{ContainerReport, FleetReport, Outcome, Stage};

/// Everything one fleet run needs: desired state plus the canonical key set,
/// loaded once before any container is contacted. No ambient state; every
/// reconciler gets what it needs from here.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Desired `PasswordAuthentication` value
    pub password_auth: PasswordAuth,

    /// How the canonical key set is applied
    pub merge_mode: MergeMode,

    /// Canonical keys; `None` means the keys stage is skipped for the run
    pub canonical_keys: Option<String>,

    /// Maximum containers converged at once
    pub concurrency: usize,
}

impl RunOptions {
    fn stages(&self) -> &'static [Stage] {
        if self.canonical_keys.is_some() {
            &[Stage::Service, Stage::PasswordAuth, Stage::AuthorizedKeys]
        } else {
            &[Stage::Service, Stage::PasswordAuth]
        }
    }
}

/// Converge the whole fleet.
///
/// Containers are processed independently under a semaphore bound; results
/// are joined in enumeration order so the report is deterministic regardless
/// of scheduling.
pub async fn run_fleet<E>(exec: Arc<E>, containers: Vec<Container>, opts: RunOptions) -> FleetReport
where
    E: ContainerExec + 'static,
{
    let opts = Arc::new(opts);
    let semaphore = Arc::new(Semaphore::new(opts.concurrency.max(1)));

    info!(
        "Converging {} container(s), concurrency {}",
        containers.len(),
        opts.concurrency.max(1)
    );

    let mut handles = Vec::with_capacity(containers.len());

    for container in containers {
        if !container.running {
            debug!(
                "Container {} ({}) is not running, skipping",
                container.name, container.vmid
            );
            let mut entry = ContainerReport::new(&container);
            for stage in opts.stages() {
                entry.record(*stage, Outcome::skipped("container is not running"));
            }
            handles.push(TaskSlot::Ready(entry));
            continue;
        }

        let exec = Arc::clone(&exec);
        let task_opts = Arc::clone(&opts);
        let semaphore = Arc::clone(&semaphore);
        let task_container = container.clone();
        handles.push(TaskSlot::Running(
            container,
            tokio::spawn(async move {
                // Closed only on drop, which cannot happen while tasks run
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("fleet semaphore closed");
                converge_container(exec.as_ref(), &task_container, &task_opts).await
            }),
        ));
    }

    let mut report = FleetReport::default();
    for slot in handles {
        match slot {
            TaskSlot::Ready(entry) => report.push(entry),
            TaskSlot::Running(container, handle) => match handle.await {
                Ok(entry) => report.push(entry),
                Err(e) => {
                    // A panicked task must not take the sweep down with it,
                    // and its container still gets a report entry
                    error!(
                        "Container {} ({}) convergence task panicked: {}",
                        container.name, container.vmid, e
                    );
                    let err = FleetError::exec(format!("convergence task panicked: {}", e));
                    let mut entry = ContainerReport::new(&container);
                    for stage in opts.stages() {
                        entry.record(*stage, Outcome::failed(&err));
                    }
                    report.push(entry);
                }
            },
        }
    }

    report
}

enum TaskSlot {
    Ready(ContainerReport),
    Running(Container, tokio::task::JoinHandle<ContainerReport>),
}

/// Run the fixed per-container pipeline: classify, then package/service,
/// password-auth, and authorized-keys in order.
async fn converge_container(
    exec: &dyn ContainerExec,
    container: &Container,
    opts: &RunOptions,
) -> ContainerReport {
    let mut entry = ContainerReport::new(container);
    let vmid = container.vmid.as_str();

    // Classify first; every later stage needs the command dialect.
    let distro = match exec.exec_plain(vmid, "cat /etc/os-release").await {
        Ok(out) if out.success() => converge::parse_os_release(&out.stdout),
        Ok(out) => {
            let err = FleetError::exec(format!(
                "failed to read /etc/os-release: {}",
                out.error_text()
            ));
            warn!("Container {} ({}): {}", container.name, vmid, err);
            record_unclassified(&mut entry, opts, &err, "distro unknown");
            return entry;
        }
        Err(e) => {
            warn!("Container {} ({}): {}", container.name, vmid, e);
            record_unclassified(&mut entry, opts, &e, "distro unknown");
            return entry;
        }
    };

    if distro.family == DistroFamily::Unsupported {
        let err = FleetError::UnsupportedDistro(distro.id().to_string());
        warn!("Container {} ({}): {}", container.name, vmid, err);
        record_unclassified(&mut entry, opts, &err, "daemon state unknown");
        return entry;
    }

    debug!(
        "Container {} ({}): classified as {:?}",
        container.name, vmid, distro.family
    );

    entry.record(
        Stage::Service,
        service::reconcile(exec, vmid, &distro).await,
    );

    // Supported families always have a dialect
    let dialect = distro
        .family
        .dialect()
        .expect("supported family has a dialect");

    entry.record(
        Stage::PasswordAuth,
        password::reconcile(exec, vmid, dialect, opts.password_auth).await,
    );

    if let Some(canonical) = &opts.canonical_keys {
        entry.record(
            Stage::AuthorizedKeys,
            keys::reconcile(exec, vmid, canonical, opts.merge_mode).await,
        );
    }

    entry
}

/// Classification failed or the distro is unsupported: the service stage
/// carries the error, later stages are skipped (no dialect to drive them).
fn record_unclassified(
    entry: &mut ContainerReport,
    opts: &RunOptions,
    err: &FleetError,
    skip_reason: &str,
) {
    entry.record(Stage::Service, Outcome::failed(err));
    entry.record(Stage::PasswordAuth, Outcome::skipped(skip_reason));
    if opts.canonical_keys.is_some() {
        entry.record(Stage::AuthorizedKeys, Outcome::skipped(skip_reason));
    }
}

//! lxc-ssh-fleet - idempotent SSH convergence for Proxmox LXC fleets
//!
//! This crate brings every LXC container on a Proxmox host into a desired
//! SSH-access state: the OpenSSH daemon installed and running, password
//! authentication pinned, and a canonical set of public keys authorized for
//! root. Each container is inspected, the minimal mutation (if any) is
//! applied exactly once, and a precise changed/unchanged/failed outcome is
//! reported per container and per subsystem. One container's failure never
//! aborts the fleet sweep.
//!
//! # Pipeline
//!
//! Per running container, in fixed order:
//!
//! 1. classify the distro from `/etc/os-release` (apk/OpenRC vs apt/systemd
//!    vs yum/systemd dialect)
//! 2. ensure the OpenSSH package is installed and its service enabled and
//!    started, installing only what is missing
//! 3. pin `PasswordAuthentication`, restarting sshd only on an actual edit
//! 4. reconcile root's `authorized_keys` against the canonical key set, in
//!    replace or merge mode, in a single atomic remote operation
//!
//! # Example Usage (CLI)
//!
//! ```bash
//! lxc-ssh-fleet --keys keys.pub --merge-mode replace --password-auth no
//! ```

pub mod config;
pub mod converge;
pub mod error;
pub mod exec;
pub mod fleet;
pub mod report;

// Re-exports for convenience
pub use config::{Args, Config};
pub use converge::{
    load_canonical_keys, parse_os_release, DistroFamily, DistroInfo, MergeMode, PasswordAuth,
    Readiness,
};
pub use error::{FleetError, Result};
pub use exec::{CommandOutput, Container, ContainerExec, MockExec, PctExecutor};
pub use fleet::{run_fleet, RunOptions};
pub use report::{ErrorKind, FleetReport, Outcome, Stage};

//! The idempotent, distro-aware convergence engine
//!
//! One module per subsystem: distro classification, non-mutating readiness
//! probes, and the three reconcilers (package/service, password-auth,
//! authorized-keys). Each reconciler returns a structured [`Outcome`]
//! rather than raising past its boundary.
//!
//! [`Outcome`]: crate::report::Outcome

pub mod distro;
pub mod keys;
pub mod password;
pub mod probe;
pub mod service;

// Re-exports
pub use distro::{parse_os_release, CommandDialect, DistroFamily, DistroInfo};
pub use keys::{load_canonical_keys, MergeMode, AUTHORIZED_KEYS_PATH};
pub use password::PasswordAuth;
pub use probe::Readiness;

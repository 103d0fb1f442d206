//! Configuration and CLI argument parsing

use clap::Parser;
use std::path::PathBuf;

use crate::converge::{MergeMode, PasswordAuth};
use crate::error::{FleetError, Result};

/// Default per-command timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000; // 60 seconds

/// Default number of containers converged in parallel
pub const DEFAULT_CONCURRENCY: usize = 4;

/// lxc-ssh-fleet CLI arguments
#[derive(Parser, Debug, Clone)]
#[command(name = "lxc-ssh-fleet")]
#[command(version)]
#[command(about = "Converge LXC containers to a desired SSH access state")]
pub struct Args {
    /// Canonical public key file, one key per line.
    /// Omit to skip the authorized-keys stage entirely.
    #[arg(long, env = "LXC_SSH_KEYS")]
    pub keys: Option<PathBuf>,

    /// How the canonical key set is applied to each container
    #[arg(long, value_enum, default_value = "replace", env = "LXC_SSH_MERGE_MODE")]
    pub merge_mode: MergeMode,

    /// Desired PasswordAuthentication value in sshd_config
    #[arg(long, value_enum, default_value = "no", env = "LXC_SSH_PASSWORD_AUTH")]
    pub password_auth: PasswordAuth,

    /// Maximum containers converged in parallel
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY, env = "LXC_SSH_CONCURRENCY")]
    pub concurrency: usize,

    /// Per-command timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS, env = "LXC_SSH_TIMEOUT")]
    pub timeout: u64,

    /// Emit the fleet report as JSON instead of text
    #[arg(long, default_value = "false", env = "LXC_SSH_JSON")]
    pub json: bool,
}

/// Parsed and validated configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Canonical key file, if the keys stage was requested
    pub keys: Option<PathBuf>,

    /// Key application mode
    pub merge_mode: MergeMode,

    /// Desired PasswordAuthentication value
    pub password_auth: PasswordAuth,

    /// Parallelism bound
    pub concurrency: usize,

    /// Per-command timeout in milliseconds
    pub timeout_ms: u64,

    /// JSON report output
    pub json: bool,
}

impl Config {
    /// Create Config from CLI Args
    pub fn from_args(args: Args) -> Result<Self> {
        validate_args(&args)?;

        Ok(Config {
            keys: args.keys,
            merge_mode: args.merge_mode,
            password_auth: args.password_auth,
            concurrency: args.concurrency,
            timeout_ms: args.timeout,
            json: args.json,
        })
    }
}

/// Validate CLI arguments
fn validate_args(args: &Args) -> Result<()> {
    let mut errors = Vec::new();

    if args.concurrency == 0 {
        errors.push("--concurrency must be at least 1".to_string());
    }

    if args.timeout == 0 {
        errors.push("--timeout must be greater than 0".to_string());
    }

    if !errors.is_empty() {
        return Err(FleetError::Config(format!(
            "Configuration error:\n{}",
            errors.join("\n")
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args {
            keys: None,
            merge_mode: MergeMode::Replace,
            password_auth: PasswordAuth::No,
            concurrency: DEFAULT_CONCURRENCY,
            timeout: DEFAULT_TIMEOUT_MS,
            json: false,
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_args(base_args()).unwrap();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.timeout_ms, 60_000);
        assert_eq!(config.merge_mode, MergeMode::Replace);
        assert_eq!(config.password_auth, PasswordAuth::No);
        assert!(config.keys.is_none());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let args = Args {
            concurrency: 0,
            ..base_args()
        };
        let err = Config::from_args(args).unwrap_err();
        assert!(err.to_string().contains("--concurrency"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let args = Args {
            timeout: 0,
            ..base_args()
        };
        let err = Config::from_args(args).unwrap_err();
        assert!(err.to_string().contains("--timeout"));
    }

    #[test]
    fn test_cli_parse_value_enums() {
        let args = Args::parse_from([
            "lxc-ssh-fleet",
            "--keys",
            "keys.pub",
            "--merge-mode",
            "merge",
            "--password-auth",
            "yes",
        ]);
        assert_eq!(args.merge_mode, MergeMode::Merge);
        assert_eq!(args.password_auth, PasswordAuth::Yes);
        assert_eq!(args.keys, Some(PathBuf::from("keys.pub")));
    }
}

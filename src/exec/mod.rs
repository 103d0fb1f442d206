//! Remote command execution inside containers
//!
//! The convergence engine never shells out directly: everything goes through
//! the [`ContainerExec`] trait, which runs a POSIX-sh script inside a given
//! container and hands back exit code, stdout, and stderr. `PctExecutor` is
//! the production implementation (Proxmox `pct exec`); `MockExec` is the test
//! double.

pub mod mock;
pub mod pct;

use async_trait::async_trait;

use crate::error::Result;

// Re-exports
pub use mock::MockExec;
pub use pct::{Container, PctExecutor};

/// Output from a remote command execution
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Standard output from the command
    pub stdout: String,

    /// Standard error from the command
    pub stderr: String,

    /// Exit code of the command (if available)
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    /// Create a new empty CommandOutput
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the command succeeded (exit code 0 or no exit code available)
    pub fn success(&self) -> bool {
        self.exit_code.is_none_or(|code| code == 0)
    }

    /// Get combined output (stdout + stderr)
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }

    /// Captured error text for diagnostics: stderr if present, else stdout
    pub fn error_text(&self) -> String {
        if self.stderr.trim().is_empty() {
            self.stdout.trim().to_string()
        } else {
            self.stderr.trim().to_string()
        }
    }
}

/// Remote command execution primitive.
///
/// Runs `sh -c <script> sh <args...>` inside the container identified by
/// `vmid` and captures the result. Parameters always travel as positional
/// arguments, never by interpolating values into the script body, so
/// untrusted content (key material, directive values) can never alter the
/// script itself.
///
/// An `Err` return means the primitive itself failed (spawn error, timeout);
/// a command that ran and exited non-zero is an `Ok` with a non-zero
/// `exit_code`.
#[async_trait]
pub trait ContainerExec: Send + Sync {
    /// Execute a shell script inside a container.
    async fn exec(&self, vmid: &str, script: &str, args: &[String]) -> Result<CommandOutput>;

    /// Convenience wrapper for scripts that take no arguments.
    async fn exec_plain(&self, vmid: &str, script: &str) -> Result<CommandOutput> {
        self.exec(vmid, script, &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_output_success() {
        let output = CommandOutput {
            stdout: "hello".to_string(),
            stderr: String::new(),
            exit_code: Some(0),
        };
        assert!(output.success());
    }

    #[test]
    fn test_command_output_failure() {
        let output = CommandOutput {
            stdout: String::new(),
            stderr: "error".to_string(),
            exit_code: Some(1),
        };
        assert!(!output.success());
    }

    #[test]
    fn test_command_output_no_exit_code() {
        let output = CommandOutput {
            stdout: "hello".to_string(),
            stderr: String::new(),
            exit_code: None,
        };
        // No exit code should be treated as success
        assert!(output.success());
    }

    #[test]
    fn test_command_output_combined() {
        let output = CommandOutput {
            stdout: "stdout".to_string(),
            stderr: "stderr".to_string(),
            exit_code: Some(0),
        };
        assert_eq!(output.combined_output(), "stdout\nstderr");
    }

    #[test]
    fn test_error_text_prefers_stderr() {
        let output = CommandOutput {
            stdout: "partial progress\n".to_string(),
            stderr: "apk: repository unreachable\n".to_string(),
            exit_code: Some(1),
        };
        assert_eq!(output.error_text(), "apk: repository unreachable");
    }

    #[test]
    fn test_error_text_falls_back_to_stdout() {
        let output = CommandOutput {
            stdout: "E: Unable to locate package\n".to_string(),
            stderr: String::new(),
            exit_code: Some(100),
        };
        assert_eq!(output.error_text(), "E: Unable to locate package");
    }
}

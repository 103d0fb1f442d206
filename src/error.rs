//! Error types for the fleet convergence engine

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for lxc-ssh-fleet
#[derive(Debug, Error)]
pub enum FleetError {
    /// The exec primitive itself could not run (spawn failure, broken pipe)
    #[error("container exec error: {0}")]
    Exec(String),

    /// Remote command timed out
    #[error("command timeout after {0}ms")]
    Timeout(u64),

    /// The container's os-release ID is not one we know how to drive
    #[error("unsupported Linux distribution: {0}")]
    UnsupportedDistro(String),

    /// Canonical key source does not exist
    #[error("key file not found: {}", .0.display())]
    KeyFileMissing(PathBuf),

    /// Canonical key source exists but has no usable content
    #[error("key file is empty: {}", .0.display())]
    KeyFileEmpty(PathBuf),

    /// The remote authorized_keys rewrite failed (mkdir/write/chmod)
    #[error("authorized_keys update failed: {0}")]
    MergeWrite(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using FleetError
pub type Result<T> = std::result::Result<T, FleetError>;

impl FleetError {
    /// Create an exec error from a string
    pub fn exec(msg: impl Into<String>) -> Self {
        FleetError::Exec(msg.into())
    }

    /// Create a merge-write error from a string
    pub fn merge_write(msg: impl Into<String>) -> Self {
        FleetError::MergeWrite(msg.into())
    }

    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        FleetError::Config(msg.into())
    }
}

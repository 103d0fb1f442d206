//! Distro classification and command dialects
//!
//! Maps a container's `/etc/os-release` contents to a distro family, and each
//! family to the command dialect (package manager + service manager) the
//! reconcilers use. Keeping the per-subsystem commands in one lookup table
//! here means the reconcilers stay free of distro conditionals.

use std::collections::HashMap;

use serde::Serialize;

/// Distro family, classified by package and service manager dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DistroFamily {
    /// apk + OpenRC
    Alpine,
    /// apt + systemd, `ssh` unit (debian, ubuntu)
    Debian,
    /// yum + systemd, `sshd` unit (centos, rhel, fedora)
    Rhel,
    /// Anything we don't know how to drive
    Unsupported,
}

/// Per-family command templates for each subsystem the engine touches.
#[derive(Debug, Clone, Copy)]
pub struct CommandDialect {
    /// Install the OpenSSH server package, then register and start its service
    pub install: &'static str,

    /// Register the service for boot and start it now (package already present)
    pub enable_start: &'static str,

    /// Exit 0 iff the service is both registered for boot and currently active
    pub service_check: &'static str,

    /// Restart the SSH service after a config edit
    pub restart: &'static str,
}

const ALPINE: CommandDialect = CommandDialect {
    install: "apk add --no-cache openssh && rc-update add sshd && rc-service sshd start",
    enable_start: "rc-update add sshd && rc-service sshd start",
    service_check: "rc-update show | grep sshd | grep -q default && rc-service sshd status | grep -q started",
    restart: "service ssh restart",
};

const DEBIAN: CommandDialect = CommandDialect {
    install: "apt-get update && apt-get install -y openssh-server && systemctl enable ssh && systemctl start ssh",
    enable_start: "systemctl enable ssh && systemctl start ssh",
    service_check: "systemctl is-enabled ssh && systemctl is-active ssh",
    restart: "systemctl restart ssh",
};

// Package is openssh-server but the unit is sshd on this family.
const RHEL: CommandDialect = CommandDialect {
    install: "yum install -y openssh-server && systemctl enable sshd && systemctl start sshd",
    enable_start: "systemctl enable sshd && systemctl start sshd",
    service_check: "systemctl is-enabled sshd && systemctl is-active sshd",
    restart: "systemctl restart sshd",
};

impl DistroFamily {
    /// Classify a case-normalized os-release `ID` value.
    pub fn from_id(id: &str) -> Self {
        match id {
            "alpine" => DistroFamily::Alpine,
            "debian" | "ubuntu" => DistroFamily::Debian,
            "centos" | "rhel" | "fedora" => DistroFamily::Rhel,
            _ => DistroFamily::Unsupported,
        }
    }

    /// The family's command dialect; `None` for unsupported distros.
    pub fn dialect(&self) -> Option<&'static CommandDialect> {
        match self {
            DistroFamily::Alpine => Some(&ALPINE),
            DistroFamily::Debian => Some(&DEBIAN),
            DistroFamily::Rhel => Some(&RHEL),
            DistroFamily::Unsupported => None,
        }
    }
}

/// Classified distro plus the raw os-release fields, kept for diagnostics.
#[derive(Debug, Clone)]
pub struct DistroInfo {
    pub family: DistroFamily,
    fields: HashMap<String, String>,
}

impl DistroInfo {
    /// The raw `ID` value, or `"unknown"` if os-release had none.
    pub fn id(&self) -> &str {
        self.fields.get("id").map(String::as_str).unwrap_or("unknown")
    }

    /// A raw os-release field by lowercased key.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

/// Parse `/etc/os-release` text into a classified [`DistroInfo`].
///
/// Lines without `=` are skipped rather than failing the parse; values are
/// stripped of surrounding quotes; keys are lowercased.
pub fn parse_os_release(raw: &str) -> DistroInfo {
    let mut fields = HashMap::new();

    for line in raw.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        if key.is_empty() {
            continue;
        }
        let value = value.trim().trim_matches('"').to_string();
        fields.insert(key, value);
    }

    let family = fields
        .get("id")
        .map(|id| DistroFamily::from_id(&id.to_lowercase()))
        .unwrap_or(DistroFamily::Unsupported);

    DistroInfo { family, fields }
}

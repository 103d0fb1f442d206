//! Authorized-keys merger
//!
//! Reconciles a container's root `authorized_keys` against a canonical key
//! set, in full-replace or union-merge mode. The read-compute-write happens
//! in one remote invocation so a concurrent login editing the same file
//! cannot race a multi-round-trip update, and key material travels as a
//! positional argument, never spliced into the script text.

use std::path::Path;

use clap::ValueEnum;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{FleetError, Result};
use crate::exec::ContainerExec;
use crate::report::Outcome;

/// Root authorized_keys path inside a container.
pub const AUTHORIZED_KEYS_PATH: &str = "/root/.ssh/authorized_keys";

/// How the canonical key set is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// authorized_keys becomes exactly the canonical set
    Replace,
    /// Existing keys are kept; canonical keys not already present are appended
    Merge,
}

impl MergeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeMode::Replace => "replace",
            MergeMode::Merge => "merge",
        }
    }
}

/// POSIX-sh merge program. Positional parameters: $1 = mode, $2 = canonical
/// keys, $3 = authorized_keys path.
///
/// Writes only when the computed content differs from what is on disk and
/// prints the verdict (`changed` / `unchanged`) on stdout; the exit code
/// carries success/failure only.
const MERGE_SCRIPT: &str = r#"set -u
mode="$1"
keys="$2"
file="$3"
dir=$(dirname "$file")
mkdir -p "$dir" || exit 2
chmod 700 "$dir" || exit 2
if [ -f "$file" ]; then
    existing=$(cat "$file") || exit 2
else
    existing=""
fi
if [ "$mode" = "replace" ]; then
    updated="$keys"
else
    updated="$existing"
    while IFS= read -r key; do
        [ -n "$key" ] || continue
        if ! printf '%s\n' "$existing" | grep -qxF "$key"; then
            if [ -n "$updated" ]; then
                updated="$updated
$key"
            else
                updated="$key"
            fi
        fi
    done <<EOF
$keys
EOF
fi
if [ "$updated" = "$existing" ]; then
    echo unchanged
    exit 0
fi
printf '%s\n' "$updated" > "$file" || exit 2
chmod 600 "$file" || exit 2
echo changed
"#;

/// Read the canonical key set from a local file, once per fleet run.
///
/// Fails before any container is contacted: [`FleetError::KeyFileMissing`]
/// if the file does not exist, [`FleetError::KeyFileEmpty`] if it holds no
/// non-whitespace content.
pub async fn load_canonical_keys(path: &Path) -> Result<String> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(FleetError::KeyFileMissing(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    let keys = content.trim().to_string();
    if keys.is_empty() {
        return Err(FleetError::KeyFileEmpty(path.to_path_buf()));
    }

    debug!(
        "Loaded {} canonical key(s) from {}",
        keys.lines().count(),
        path.display()
    );
    Ok(keys)
}

/// Converge one container's root authorized_keys against the canonical set.
pub async fn reconcile(
    exec: &dyn ContainerExec,
    vmid: &str,
    canonical_keys: &str,
    mode: MergeMode,
) -> Outcome {
    let args = [
        mode.as_str().to_string(),
        canonical_keys.to_string(),
        AUTHORIZED_KEYS_PATH.to_string(),
    ];

    let out = match exec.exec(vmid, MERGE_SCRIPT, &args).await {
        Ok(out) => out,
        Err(e) => return Outcome::failed(&e),
    };

    if !out.success() {
        return Outcome::failed(&FleetError::merge_write(out.error_text()));
    }

    match out.stdout.trim() {
        "changed" => {
            info!("Container {}: SSH keys updated ({})", vmid, mode.as_str());
            Outcome::changed("SSH keys successfully updated")
        }
        "unchanged" => Outcome::unchanged("no changes were made"),
        other => Outcome::failed(&FleetError::merge_write(format!(
            "unexpected merge verdict: {:?}",
            other
        ))),
    }
}

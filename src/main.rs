//! lxc-ssh-fleet - Entry point
//!
//! Parses CLI arguments, enumerates the host's containers, loads the
//! canonical key set, runs the bounded-parallel convergence sweep, and
//! prints the per-container report. Logging goes to stderr; stdout carries
//! only the report.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use lxc_ssh_fleet::config::{Args, Config};
use lxc_ssh_fleet::converge::load_canonical_keys;
use lxc_ssh_fleet::exec::PctExecutor;
use lxc_ssh_fleet::fleet::{run_fleet, RunOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing/logging to stderr (stdout is for the report)
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Parse CLI arguments
    let args = Args::parse();

    // Validate and create config
    let config = Config::from_args(args)?;

    info!("lxc-ssh-fleet v{} starting...", env!("CARGO_PKG_VERSION"));
    info!(
        "Desired state: PasswordAuthentication {}, key mode {}, timeout {}ms",
        config.password_auth.as_str(),
        config.merge_mode.as_str(),
        config.timeout_ms
    );

    let executor = Arc::new(PctExecutor::new(Duration::from_millis(config.timeout_ms)));

    let containers = executor
        .list_containers()
        .await
        .context("failed to enumerate LXC containers")?;
    info!(
        "Found {} container(s), {} running",
        containers.len(),
        containers.iter().filter(|c| c.running).count()
    );

    // Canonical keys are loaded once, before any container is contacted; a
    // missing or empty key file fails the whole run.
    let canonical_keys = match &config.keys {
        Some(path) => Some(
            load_canonical_keys(path)
                .await
                .context("canonical key source unusable")?,
        ),
        None => {
            info!("No key file configured, skipping authorized-keys stage");
            None
        }
    };

    let report = run_fleet(
        executor,
        containers,
        RunOptions {
            password_auth: config.password_auth,
            merge_mode: config.merge_mode,
            canonical_keys,
            concurrency: config.concurrency,
        },
    )
    .await;

    if config.json {
        println!("{}", report.to_json()?);
    } else {
        let rendered = report.render();
        if !rendered.is_empty() {
            println!("{}", rendered);
        }
    }

    if report.all_failed() {
        error!("Every container failed to converge");
        std::process::exit(1);
    }

    Ok(())
}

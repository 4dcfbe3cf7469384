// SPDX-License-Identifier: MIT

//! Daemon launcher (spec.md §4.4): spawns a local worker as a detached
//! child, command-line arguments encoding dial-in URL, dispatcher flag,
//! optional TLS material, initial RNG seed vector, and forwarded options.

use mrd_core::{DaemonOptions, MrdError, RngSeed, TlsMaterial};
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Notify;
use tokio::time::timeout;
use tracing::{info, warn};

/// Locate a workspace binary (`mrdw`, `mrdd`) next to the currently
/// running executable, the way a cargo-built workspace always lays out
/// its binaries in one shared target directory.
pub fn sibling_binary(name: &str) -> Result<PathBuf, MrdError> {
    let mut path = std::env::current_exe().map_err(MrdError::Transport)?;
    path.pop();
    path.push(name);
    Ok(path)
}

/// Whether to wait for every expected daemon to dial in before returning
/// (spec.md §4.4: "A synchronous launch variant ... waits ... for each
/// expected daemon to connect, returning failure if any did not").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    Synchronous { timeout: Duration },
    Asynchronous,
}

/// Spawn `count` daemon processes dialing `url`, one RNG seed each.
///
/// `connect_notify` is notified once per daemon pipe-add when running
/// under [`LaunchMode::Synchronous`]; callers typically wire it to the
/// profile socket's accept-notification so this function can block on
/// actual dial-in rather than the child process merely existing.
pub async fn launch_daemons(
    worker_binary: &std::path::Path,
    url: &str,
    seeds: &[RngSeed],
    options: &DaemonOptions,
    tls: Option<&TlsMaterial>,
    mode: LaunchMode,
    connect_notify: &Notify,
) -> Result<Vec<tokio::process::Child>, MrdError> {
    let mut children = Vec::with_capacity(seeds.len());
    for seed in seeds {
        let child = spawn_one(worker_binary, url, seed, options, tls)?;
        children.push(child);
    }

    if let LaunchMode::Synchronous { timeout: wait } = mode {
        for _ in 0..seeds.len() {
            if timeout(wait, connect_notify.notified()).await.is_err() {
                return Err(MrdError::SyncDaemons { expected: seeds.len(), connected: 0 });
            }
        }
    }

    Ok(children)
}

fn spawn_one(
    worker_binary: &std::path::Path,
    url: &str,
    seed: &RngSeed,
    options: &DaemonOptions,
    tls: Option<&TlsMaterial>,
) -> Result<tokio::process::Child, MrdError> {
    let mut command = Command::new(worker_binary);
    command.arg("--url").arg(url);
    command.arg("--seed").arg(
        seed.0.iter().map(|w| w.to_string()).collect::<Vec<_>>().join(","),
    );
    command.arg("--options").arg(
        serde_json::to_string(options).map_err(|e| MrdError::InvalidConfig(e.to_string()))?,
    );
    if let Some(material) = tls {
        command.arg("--tls-cert").arg(String::from_utf8_lossy(&material.cert_pem).to_string());
    }
    if !options.output {
        command.stdout(std::process::Stdio::null()).stderr(std::process::Stdio::null());
    } else {
        command.stdout(std::process::Stdio::inherit()).stderr(std::process::Stdio::inherit());
    }
    command.stdin(std::process::Stdio::null());

    info!(url, "launching daemon");
    command.spawn().map_err(|e| {
        warn!(error = %e, "daemon spawn failed");
        MrdError::Transport(e)
    })
}

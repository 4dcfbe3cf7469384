// SPDX-License-Identifier: MIT

//! The `configure`/`reset`/`status`/`submit` entry points (spec.md §4.1):
//! the orchestration a `ProfileRegistry` entry's fields only describe.
//!
//! `configure` resolves the daemon-facing and host-facing URLs itself
//! before spawning a dispatcher child (a "bind-probe-then-drop": bind an
//! ephemeral-port listener, read back the port it got, drop it, hand the
//! concrete URL to the child as an argument) — the dispatcher is always
//! given a port nothing else has raced to claim in between, modulo the
//! small window between the probe's drop and the child's own bind.

use crate::client::ProfileClient;
use crate::launcher::{launch_daemons, sibling_binary, LaunchMode};
use crate::registry::{global, ProfileHandle, ProfileSocket};
use crate::router::DirectRouter;
use bytes::Bytes;
use mrd_core::{
    MrdError, ProfileConfig, ProfileName, ProtocolViolation, TaskResult, TlsMaterial,
};
use mrd_transport::{build_server_config, generate_ephemeral_material, DialUrl, Listener};
use mrd_wire::{ControlReply, Handshake, ReplyEnvelope, RosterEvent, TaskEnvelope};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use tokio::process::{Child, Command};
use tokio::sync::Notify;
use tracing::info;

/// How long `configure`/`reset` wait for a child, a handshake, or a daemon
/// roster to reach its target before giving up (spec.md §4.1/§4.4 "a long
/// timeout").
const LONG_TIMEOUT: Duration = Duration::from_secs(30);

/// `status()`'s return shape (spec.md §4.1: "`{connections, listening_url,
/// queue_stats?}`").
#[derive(Debug, Clone)]
pub struct ProfileStatus {
    pub connections: u32,
    pub listening_url: String,
    pub queue_stats: Option<QueueStats>,
    pub events: Vec<RosterEvent>,
}

/// Present only in dispatcher mode (spec.md §4.1: "`completed = msgid -
/// awaiting - executing`").
#[derive(Debug, Clone, Copy)]
pub struct QueueStats {
    pub awaiting: u32,
    pub executing: u32,
    pub completed: u64,
}

/// Configure a new profile end to end: binds/spawns whatever the
/// `dispatcher` mode requires and blocks until the daemon pool (if any) is
/// actually connected (spec.md §4.1 `configure`).
pub async fn configure(name: ProfileName, config: ProfileConfig) -> Result<(), MrdError> {
    config.validate()?;

    let registry = global();
    let mut guard = registry.lock().await;
    if guard.contains(&name) {
        return Err(MrdError::AlreadyConfigured(name));
    }
    let n = config.n.max(0) as usize;
    let seeds = guard.take_seeds(n);
    // Released before any I/O below: configure/reset of *other* profiles
    // should not wait on this one's child spawn and handshake.
    drop(guard);

    let tls_material =
        if config.tls { Some(generate_ephemeral_material(vec!["localhost".to_string()])?) } else { None };

    let (socket, url, dispatcher_child, daemon_children) = if config.dispatcher.is_enabled() {
        configure_dispatcher(&config, &seeds, tls_material.as_ref()).await?
    } else {
        configure_direct(&config, &seeds, tls_material.as_ref()).await?
    };

    let handle = ProfileHandle {
        config,
        url,
        rng_seeds: seeds,
        msgid: 0,
        socket,
        dispatcher_child,
        daemon_children,
        wake: Arc::new(Notify::new()),
    };

    let mut guard = registry.lock().await;
    // Another `configure` for the same name could have raced in while we
    // were off doing I/O; last one loses rather than silently overwriting.
    if guard.contains(&name) {
        return Err(MrdError::AlreadyConfigured(name));
    }
    guard.insert(name, handle);
    Ok(())
}

async fn configure_direct(
    config: &ProfileConfig,
    seeds: &[mrd_core::RngSeed],
    tls_material: Option<&TlsMaterial>,
) -> Result<(ProfileSocket, String, Option<Child>, Vec<Child>), MrdError> {
    let bind_url = DialUrl::parse(config.url.as_deref().unwrap_or("tcp://127.0.0.1:0"))?;
    let server_tls = tls_material.map(build_server_config).transpose()?;
    let (router, resolved_url) = DirectRouter::bind(&bind_url, server_tls).await?;
    let resolved = resolved_url.to_string();
    info!(url = %resolved, "direct-mode profile socket bound");

    let daemon_children = if seeds.is_empty() {
        Vec::new()
    } else {
        let worker_binary = sibling_binary("mrdw")?;
        let notify = router.connect_notify();
        launch_daemons(
            &worker_binary,
            &resolved,
            seeds,
            &config.options,
            tls_material,
            LaunchMode::Synchronous { timeout: LONG_TIMEOUT },
            &notify,
        )
        .await?
    };

    Ok((ProfileSocket::Direct(Arc::new(router)), resolved, None, daemon_children))
}

async fn configure_dispatcher(
    config: &ProfileConfig,
    seeds: &[mrd_core::RngSeed],
    tls_material: Option<&TlsMaterial>,
) -> Result<(ProfileSocket, String, Option<Child>, Vec<Child>), MrdError> {
    let daemon_probe = DialUrl::parse("tcp://127.0.0.1:0")?;
    let (listener, resolved_daemon_url) = Listener::bind(&daemon_probe, None).await?;
    drop(listener);
    let host_probe = DialUrl::parse("tcp://127.0.0.1:0")?;
    let (listener, resolved_host_url) = Listener::bind(&host_probe, None).await?;
    drop(listener);

    let dispatcher_binary = sibling_binary("mrdd")?;
    let mut command = Command::new(dispatcher_binary);
    command.arg("--daemon-url").arg(resolved_daemon_url.to_string());
    command.arg("--host-url").arg(resolved_host_url.to_string());
    if config.retry {
        command.arg("--retry");
    }

    // Kept alive for the whole function: mrdd reads these paths at
    // startup, before the handshake below can possibly complete.
    let mut cert_file = None;
    let mut key_file = None;
    if let Some(material) = tls_material {
        let cert = NamedTempFile::new().map_err(MrdError::Transport)?;
        std::fs::write(cert.path(), &material.cert_pem).map_err(MrdError::Transport)?;
        let key = NamedTempFile::new().map_err(MrdError::Transport)?;
        std::fs::write(key.path(), &material.key_pem).map_err(MrdError::Transport)?;
        command.arg("--tls-cert").arg(cert.path());
        command.arg("--tls-key").arg(key.path());
        cert_file = Some(cert);
        key_file = Some(key);
    }

    command.stdin(Stdio::null());
    if !config.options.output {
        command.stdout(Stdio::null()).stderr(Stdio::null());
    }

    let child = command.spawn().map_err(MrdError::Transport)?;
    info!(daemon_url = %resolved_daemon_url, host_url = %resolved_host_url, "dispatcher child spawned");

    let (client, reply) = connect_with_retry(&resolved_host_url, config).await?;
    // mrdd has read whatever cert/key paths it needed by the time the
    // handshake above completes; nothing references these after this point.
    drop(cert_file);
    drop(key_file);

    let daemon_url = reply.daemon_url;
    let daemon_children = if seeds.is_empty() {
        Vec::new()
    } else {
        let worker_binary = sibling_binary("mrdw")?;
        let children = launch_daemons(
            &worker_binary,
            &daemon_url,
            seeds,
            &config.options,
            tls_material,
            LaunchMode::Asynchronous,
            &Notify::new(),
        )
        .await?;
        wait_for_daemon_roster(&client, seeds.len(), LONG_TIMEOUT).await?;
        children
    };

    Ok((ProfileSocket::Dispatcher(Arc::new(client)), daemon_url, Some(child), daemon_children))
}

/// Dial the dispatcher's host-facing socket, retrying until it starts
/// accepting (the child may still be binding), then perform the
/// handshake (spec.md §4.1: "connects to it, performs a handshake
/// exchange").
async fn connect_with_retry(
    host_url: &DialUrl,
    config: &ProfileConfig,
) -> Result<(ProfileClient, mrd_wire::HandshakeReply), MrdError> {
    let handshake = Handshake {
        default_packages: Vec::new(),
        tls_credentials: None,
        tls_password: None,
        serialization_config: config.options.clone(),
    };
    let deadline = Instant::now() + LONG_TIMEOUT;
    loop {
        match ProfileClient::connect_and_handshake(host_url, None, handshake.clone()).await {
            Ok(result) => return Ok(result),
            Err(_) if Instant::now() < deadline => {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            Err(_) => return Err(MrdError::SyncDispatcher),
        }
    }
}

async fn wait_for_daemon_roster(client: &ProfileClient, expected: usize, wait: Duration) -> Result<(), MrdError> {
    let deadline = Instant::now() + wait;
    loop {
        if let Ok(ControlReply::Status { connections, .. }) = client.status(Duration::from_millis(500)).await {
            if connections as usize >= expected {
                return Ok(());
            }
        }
        if Instant::now() >= deadline {
            return Err(MrdError::SyncDaemons { expected, connected: 0 });
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Tear a profile down (spec.md §4.1 `reset`). If `signal`, the exit
/// sentinel is sent to every currently connected daemon first; either
/// way the dispatcher child (if any) and every directly-launched daemon
/// are killed, and outstanding host-side tasks resolve with
/// `ConnectionReset` once their owning client's read loop observes the
/// closed pipe.
pub async fn reset(name: &ProfileName, signal: bool) -> Result<(), MrdError> {
    let registry = global();
    let mut guard = registry.lock().await;
    let mut handle = guard.remove(name)?;
    drop(guard);

    if signal {
        match &handle.socket {
            ProfileSocket::Dispatcher(client) => {
                let _ = client.shutdown(LONG_TIMEOUT).await;
            }
            ProfileSocket::Direct(router) => {
                router.broadcast_exit().await;
            }
        }
    }

    if let Some(mut child) = handle.dispatcher_child.take() {
        let _ = child.kill().await;
    }
    for mut child in handle.daemon_children.drain(..) {
        let _ = child.kill().await;
    }

    Ok(())
}

/// Query a profile's connection/queue state (spec.md §4.1 `status`).
pub async fn status(name: &ProfileName, wait: Duration) -> Result<ProfileStatus, MrdError> {
    let registry = global();
    let guard = registry.lock().await;
    let handle = guard.status(name)?;
    let url = handle.url.clone();
    let socket = match &handle.socket {
        ProfileSocket::Dispatcher(client) => ProfileSocket::Dispatcher(Arc::clone(client)),
        ProfileSocket::Direct(router) => ProfileSocket::Direct(Arc::clone(router)),
    };
    drop(guard);

    match socket {
        ProfileSocket::Dispatcher(client) => {
            let reply = client.status(wait).await?;
            match reply {
                ControlReply::Status { connections, awaiting, executing, completed, events } => {
                    Ok(ProfileStatus {
                        connections,
                        listening_url: url,
                        queue_stats: Some(QueueStats { awaiting, executing, completed }),
                        events,
                    })
                }
                _ => Err(MrdError::Protocol(ProtocolViolation::Malformed("unexpected control reply to status".into()))),
            }
        }
        ProfileSocket::Direct(router) => Ok(ProfileStatus {
            connections: router.connection_count().await as u32,
            listening_url: url,
            queue_stats: None,
            events: Vec::new(),
        }),
    }
}

/// Submit one task payload, drawing its id from the profile's `msgid`
/// counter (spec.md §4.2: "the host's `msgid` counter increments
/// monotonically"), and wait for its terminal result.
pub async fn submit(name: &ProfileName, payload: Bytes, wait: Duration) -> Result<TaskResult, MrdError> {
    let registry = global();
    let mut guard = registry.lock().await;
    let task_id = guard.next_task_id(name)?;
    let handle = guard.status(name)?;
    let socket = match &handle.socket {
        ProfileSocket::Dispatcher(client) => ProfileSocket::Dispatcher(Arc::clone(client)),
        ProfileSocket::Direct(router) => ProfileSocket::Direct(Arc::clone(router)),
    };
    drop(guard);

    match socket {
        ProfileSocket::Dispatcher(client) => {
            let reply = client.submit(task_id, payload, wait).await?;
            Ok(reply.into_result())
        }
        ProfileSocket::Direct(router) => {
            let envelope = TaskEnvelope::new(task_id, payload);
            let bytes = mrd_wire::encode(&envelope)
                .map_err(|e| MrdError::Protocol(ProtocolViolation::Malformed(e.to_string())))?;
            let reply_bytes = router.submit(&bytes).await?;
            let reply: ReplyEnvelope = mrd_wire::decode(&reply_bytes)
                .map_err(|e| MrdError::Protocol(ProtocolViolation::Malformed(e.to_string())))?;
            Ok(reply.into_result())
        }
    }
}

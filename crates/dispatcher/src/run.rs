// SPDX-License-Identifier: MIT

//! Async glue: turns transport readiness into [`Event`]s, runs them
//! through [`step`], and carries out the resulting [`Action`]s against
//! live connections.
//!
//! The host-facing and daemon-facing sockets are both plain request/reply
//! listeners (spec.md §4.3: "two transport endpoints"); each accepted
//! connection gets a read-loop task that forwards decoded frames to a
//! single-threaded cooperative `step()` driver over an mpsc channel —
//! mirroring the teacher's event-bus-into-single-engine-loop shape
//! (`oj-daemon::event_bus` feeding `Engine::run`).

use crate::action::Action;
use crate::event::Event;
use crate::state::DispatcherState;
use crate::step::step;
use mrd_core::PipeId;
use mrd_transport::Listener;
use mrd_wire::{write_frame, write_message, Handshake, HandshakeReply, ReplyEnvelope, TaskEnvelope, EXIT_PAYLOAD};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};
use tracing::{error, warn};

/// One decoded readiness event plus, for daemon-originated events, the
/// pipe it arrived on.
pub enum Inbound {
    Dispatcher(Event),
    /// A control request from the host, paired with the writer to reply on.
    Control(Event, Arc<Mutex<dyn AsyncWrite + Send + Unpin>>),
}

/// Runs the dispatcher event loop until its channel closes (host transport
/// shut down, per spec.md §4.3 "Failure semantics").
///
/// `daemon_url` is this dispatcher's own resolved daemon-facing dial-in
/// URL, echoed back to the host in the handshake reply (spec.md §4.1:
/// "obtains from it the daemon dial-in URL(s)") so the host never has to
/// assume the dispatcher bound exactly what it was told to.
pub async fn run(
    mut state: DispatcherState,
    daemon_listener: Listener,
    host_listener: Listener,
    daemon_url: String,
) {
    let next_pipe = Arc::new(AtomicU64::new(1));
    let daemon_writers: Arc<Mutex<HashMap<PipeId, Arc<Mutex<dyn AsyncWrite + Send + Unpin>>>>> =
        Arc::new(Mutex::new(HashMap::new()));
    let host_writer: Arc<Mutex<Option<Arc<Mutex<dyn AsyncWrite + Send + Unpin>>>>> =
        Arc::new(Mutex::new(None));

    let (tx, mut rx) = mpsc::unbounded_channel::<Inbound>();

    // Daemon-facing accept loop.
    {
        let tx = tx.clone();
        let daemon_writers = Arc::clone(&daemon_writers);
        let next_pipe = Arc::clone(&next_pipe);
        tokio::spawn(async move {
            loop {
                match daemon_listener.accept().await {
                    Ok(stream) => {
                        let pipe = PipeId(next_pipe.fetch_add(1, Ordering::SeqCst));
                        let (reader, writer) = tokio::io::split(stream);
                        daemon_writers.lock().await.insert(pipe, Arc::new(Mutex::new(writer)));
                        let tx = tx.clone();
                        let _ = tx.send(Inbound::Dispatcher(Event::DaemonConnected {
                            pipe,
                            daemon_id: None,
                        }));
                        tokio::spawn(daemon_read_loop(pipe, reader, tx));
                    }
                    Err(e) => error!(error = %e, "daemon accept failed"),
                }
            }
        });
    }

    // Host-facing accept loop (one connection at a time is expected, but
    // any number are accepted so a reconnecting host recovers cleanly).
    // The first frame on every accepted connection must be a handshake
    // (spec.md §4.1/§6: "connects to it, performs a handshake exchange");
    // it is answered directly, bypassing `step`, before the connection
    // falls into the normal task/control demux loop.
    {
        let tx = tx.clone();
        let host_writer = Arc::clone(&host_writer);
        let daemon_url = daemon_url.clone();
        tokio::spawn(async move {
            loop {
                match host_listener.accept().await {
                    Ok(stream) => {
                        let (mut reader, writer) = tokio::io::split(stream);
                        let writer: Arc<Mutex<dyn AsyncWrite + Send + Unpin>> =
                            Arc::new(Mutex::new(writer));
                        let daemon_url = daemon_url.clone();
                        let tx = tx.clone();
                        let host_writer = Arc::clone(&host_writer);
                        tokio::spawn(async move {
                            if !handshake(&mut reader, &writer, &daemon_url).await {
                                return;
                            }
                            *host_writer.lock().await = Some(Arc::clone(&writer));
                            host_read_loop(reader, writer, tx).await;
                        });
                    }
                    Err(e) => error!(error = %e, "host accept failed"),
                }
            }
        });
    }

    drop(tx);

    while let Some(inbound) = rx.recv().await {
        let (event, control_writer) = match inbound {
            Inbound::Dispatcher(event) => (event, None),
            Inbound::Control(event, writer) => (event, Some(writer)),
        };
        let actions = step(&mut state, event);
        for action in actions {
            execute(action, &daemon_writers, &host_writer, &control_writer).await;
        }
    }
}

async fn execute(
    action: Action,
    daemon_writers: &Arc<Mutex<HashMap<PipeId, Arc<Mutex<dyn AsyncWrite + Send + Unpin>>>>>,
    host_writer: &Arc<Mutex<Option<Arc<Mutex<dyn AsyncWrite + Send + Unpin>>>>>,
    control_writer: &Option<Arc<Mutex<dyn AsyncWrite + Send + Unpin>>>,
) {
    match action {
        Action::SendTask { pipe, envelope } => {
            if let Some(writer) = daemon_writers.lock().await.get(&pipe).cloned() {
                let mut writer = writer.lock().await;
                if let Err(e) = write_frame(&mut *writer, &envelope).await {
                    warn!(error = %e, "failed to send task to daemon");
                }
            }
        }
        Action::ReplyToHost(reply) => {
            if let Some(writer) = host_writer.lock().await.clone() {
                let mut writer = writer.lock().await;
                if let Err(e) = write_frame(&mut *writer, &reply).await {
                    warn!(error = %e, "failed to forward reply to host");
                }
            }
        }
        Action::ReplyControl(reply) => {
            if let Some(writer) = control_writer {
                let mut writer = writer.lock().await;
                if let Err(e) = write_frame(&mut *writer, &reply).await {
                    warn!(error = %e, "failed to reply to control request");
                }
            }
        }
        Action::ClosePipe(pipe) => {
            if let Some(writer) = daemon_writers.lock().await.remove(&pipe) {
                let mut writer = writer.lock().await;
                let _ = writer.shutdown().await;
            }
        }
        Action::SendExit(pipe) => {
            if let Some(writer) = daemon_writers.lock().await.get(&pipe).cloned() {
                let mut writer = writer.lock().await;
                if let Err(e) = write_message(&mut *writer, &EXIT_PAYLOAD).await {
                    warn!(error = %e, "failed to send exit sentinel to daemon");
                }
            }
        }
    }
}

async fn daemon_read_loop(
    pipe: PipeId,
    mut reader: impl tokio::io::AsyncRead + Unpin,
    tx: mpsc::UnboundedSender<Inbound>,
) {
    loop {
        match mrd_wire::read_frame::<_, ReplyEnvelope>(&mut reader).await {
            Ok(reply) => {
                if tx.send(Inbound::Dispatcher(Event::DaemonReply { pipe, reply })).is_err() {
                    return;
                }
            }
            Err(_) => {
                let _ = tx.send(Inbound::Dispatcher(Event::DaemonDisconnected { pipe }));
                return;
            }
        }
    }
}

/// Read and answer the mandatory first frame on a host connection. Returns
/// whether the handshake succeeded; a failure drops the connection rather
/// than falling through to the task/control loop.
async fn handshake(
    reader: &mut (impl AsyncRead + Unpin),
    writer: &Arc<Mutex<dyn AsyncWrite + Send + Unpin>>,
    daemon_url: &str,
) -> bool {
    let bytes = match mrd_wire::read_message(reader).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "host connection closed before handshake");
            return false;
        }
    };
    let accepted = mrd_wire::decode::<Handshake>(&bytes).is_ok();
    if !accepted {
        warn!("first frame on host socket was not a handshake");
    }
    let reply = HandshakeReply { accepted, daemon_url: daemon_url.to_string() };
    let mut writer_guard = writer.lock().await;
    if let Err(e) = write_frame(&mut *writer_guard, &reply).await {
        warn!(error = %e, "failed to send handshake reply");
        return false;
    }
    drop(writer_guard);
    accepted
}

async fn host_read_loop(
    mut reader: impl tokio::io::AsyncRead + Unpin,
    writer: Arc<Mutex<dyn AsyncWrite + Send + Unpin>>,
    tx: mpsc::UnboundedSender<Inbound>,
) {
    loop {
        let bytes = match mrd_wire::read_message(&mut reader).await {
            Ok(bytes) => bytes,
            Err(_) => return,
        };
        match read_task_or_control(&bytes) {
            Ok((event, is_control)) => {
                let inbound = if is_control {
                    Inbound::Control(event, Arc::clone(&writer))
                } else {
                    Inbound::Dispatcher(event)
                };
                if tx.send(inbound).is_err() {
                    return;
                }
            }
            Err(e) => {
                warn!(error = %e, "malformed frame on host socket");
                return;
            }
        }
    }
}

/// Demultiplex a single host frame into either a task submission or a
/// control request, since both travel the same host-facing socket
/// (spec.md §4.3 "host-facing ... reply socket where it receives tasks
/// and control commands"). Returns whether the event is control-shaped
/// (needs a reply written back) alongside the task/control bit.
fn read_task_or_control(bytes: &[u8]) -> Result<(Event, bool), mrd_core::ProtocolViolation> {
    if let Ok(control) = mrd_wire::decode::<mrd_wire::ControlRequest>(bytes) {
        let event = match control {
            mrd_wire::ControlRequest::Status => Event::Status,
            mrd_wire::ControlRequest::Cancel { task_id } => Event::Cancel { task_id, force: false },
            mrd_wire::ControlRequest::ForceCancel { task_id } => {
                Event::Cancel { task_id, force: true }
            }
            mrd_wire::ControlRequest::Shutdown => Event::Shutdown,
        };
        return Ok((event, true));
    }
    let envelope: TaskEnvelope =
        mrd_wire::decode(bytes).map_err(|e| mrd_core::ProtocolViolation::Malformed(e.to_string()))?;
    Ok((Event::TaskArrived { task_id: envelope.task_id, payload: envelope.payload }, false))
}

// SPDX-License-Identifier: MIT

//! Host-side client for a dispatcher-backed profile: submits tasks,
//! issues status/cancel control requests, and collects replies
//! (spec.md §4.3, §5 "Suspension points").
//!
//! Submissions must not serialize on each other — the dispatcher's whole
//! purpose is FIFO queueing across N concurrently-busy daemons (spec.md
//! §4.3) — so a single background reader task owns the read half of the
//! stream and demultiplexes incoming frames by `task_id` to whichever
//! `submit` call is waiting on it, independent of send order.

use bytes::Bytes;
use mrd_core::{MrdError, ProtocolViolation, TaskId, TaskResult};
use mrd_transport::{dial, DialUrl, TlsClientConfig};
use mrd_wire::{
    read_message, write_frame, ControlReply, ControlRequest, Handshake, HandshakeReply,
    ReplyEnvelope,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::io::{split, WriteHalf};
use tokio::sync::{oneshot, Mutex};
use tokio::time::timeout;

type PendingTasks = Arc<StdMutex<HashMap<TaskId, oneshot::Sender<Result<ReplyEnvelope, MrdError>>>>>;
type PendingControl = Arc<Mutex<Option<oneshot::Sender<Result<ControlReply, MrdError>>>>>;

/// A connection to one profile's dispatcher, host-facing side.
pub struct ProfileClient {
    writer: Mutex<WriteHalf<mrd_transport::Stream>>,
    pending_tasks: PendingTasks,
    pending_control: PendingControl,
}

impl ProfileClient {
    /// Dial `url`, perform the mandatory handshake (spec.md §4.1/§6:
    /// "connects to it, performs a handshake exchange"), and start the
    /// background reader. Fails `SyncDispatcher` if the dispatcher
    /// declines the handshake.
    pub async fn connect_and_handshake(
        url: &DialUrl,
        tls_client_config: Option<TlsClientConfig>,
        handshake: Handshake,
    ) -> Result<(Self, HandshakeReply), MrdError> {
        let stream = dial(url, tls_client_config).await?;
        let (mut reader, mut writer) = split(stream);

        write_frame(&mut writer, &handshake).await.map_err(MrdError::Protocol)?;
        let bytes = read_message(&mut reader).await.map_err(MrdError::Protocol)?;
        let reply: HandshakeReply = mrd_wire::decode(&bytes)
            .map_err(|e| MrdError::Protocol(ProtocolViolation::Malformed(e.to_string())))?;
        if !reply.accepted {
            return Err(MrdError::SyncDispatcher);
        }

        let pending_tasks: PendingTasks = Arc::new(StdMutex::new(HashMap::new()));
        let pending_control: PendingControl = Arc::new(Mutex::new(None));

        tokio::spawn(read_loop(reader, Arc::clone(&pending_tasks), Arc::clone(&pending_control)));

        Ok((Self { writer: Mutex::new(writer), pending_tasks, pending_control }, reply))
    }

    /// Submit a task and wait up to `wait` for its reply
    /// (spec.md §5 "Suspension points (c)"). The stream lock is only held
    /// for the write; the reply arrives via the background reader however
    /// many other submissions are in flight.
    pub async fn submit(&self, task_id: TaskId, payload: Bytes, wait: Duration) -> Result<ReplyEnvelope, MrdError> {
        let (tx, rx) = oneshot::channel();
        self.pending_tasks.lock().unwrap_or_else(|e| e.into_inner()).insert(task_id, tx);

        let envelope = mrd_wire::TaskEnvelope::new(task_id, payload);
        {
            let mut writer = self.writer.lock().await;
            if let Err(e) = write_frame(&mut *writer, &envelope).await {
                self.pending_tasks.lock().unwrap_or_else(|e| e.into_inner()).remove(&task_id);
                return Err(MrdError::Protocol(e));
            }
        }

        match timeout(wait, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(MrdError::Protocol(ProtocolViolation::ConnectionClosed)),
            Err(_) => {
                self.pending_tasks.lock().unwrap_or_else(|e| e.into_inner()).remove(&task_id);
                Err(MrdError::Timeout)
            }
        }
    }

    pub async fn status(&self, wait: Duration) -> Result<ControlReply, MrdError> {
        self.control(ControlRequest::Status, wait).await
    }

    pub async fn cancel(&self, task_id: TaskId, force: bool, wait: Duration) -> Result<ControlReply, MrdError> {
        let request = if force {
            ControlRequest::ForceCancel { task_id }
        } else {
            ControlRequest::Cancel { task_id }
        };
        self.control(request, wait).await
    }

    /// Broadcast the exit sentinel via the dispatcher and wait for its
    /// acknowledgement (spec.md §4.1 `reset`, "sends an in-band exit
    /// frame to each currently connected daemon").
    pub async fn shutdown(&self, wait: Duration) -> Result<ControlReply, MrdError> {
        self.control(ControlRequest::Shutdown, wait).await
    }

    /// Control requests are rarer and share a single in-flight slot: the
    /// dispatcher answers them strictly in request order, so there is no
    /// correlating id to demultiplex by the way task replies have `task_id`.
    async fn control(&self, request: ControlRequest, wait: Duration) -> Result<ControlReply, MrdError> {
        let (tx, rx) = oneshot::channel();
        {
            let mut slot = self.pending_control.lock().await;
            *slot = Some(tx);
        }

        {
            let mut writer = self.writer.lock().await;
            if let Err(e) = write_frame(&mut *writer, &request).await {
                return Err(MrdError::Protocol(e));
            }
        }

        match timeout(wait, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(MrdError::Protocol(ProtocolViolation::ConnectionClosed)),
            Err(_) => Err(MrdError::Timeout),
        }
    }
}

/// Demultiplex every frame the dispatcher sends: a control reply goes to
/// whichever `control()` call is currently waiting, a task reply goes to
/// its `task_id`'s waiter. On read failure (dispatcher gone, pipe
/// dropped), every still-pending waiter is resolved with
/// `ConnectionReset` (spec.md §4.1 `reset`, P5/scenario 6).
async fn read_loop(
    mut reader: tokio::io::ReadHalf<mrd_transport::Stream>,
    pending_tasks: PendingTasks,
    pending_control: PendingControl,
) {
    loop {
        let bytes = match read_message(&mut reader).await {
            Ok(bytes) => bytes,
            Err(_) => break,
        };

        if let Ok(reply) = mrd_wire::decode::<ControlReply>(&bytes) {
            if let Some(tx) = pending_control.lock().await.take() {
                let _ = tx.send(Ok(reply));
            }
            continue;
        }

        if let Ok(reply) = mrd_wire::decode::<ReplyEnvelope>(&bytes) {
            if let Some(tx) = pending_tasks.lock().unwrap_or_else(|e| e.into_inner()).remove(&reply.task_id) {
                let _ = tx.send(Ok(reply));
            }
            continue;
        }
    }

    for (task_id, tx) in pending_tasks.lock().unwrap_or_else(|e| e.into_inner()).drain() {
        let _ = tx.send(Ok(ReplyEnvelope::from_result(task_id, TaskResult::ConnectionReset)));
    }
    if let Some(tx) = pending_control.lock().await.take() {
        let _ = tx.send(Err(MrdError::Protocol(ProtocolViolation::ConnectionClosed)));
    }
}

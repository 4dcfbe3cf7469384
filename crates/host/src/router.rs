// SPDX-License-Identifier: MIT

//! Direct-mode router (spec.md §4.5): when the dispatcher is disabled,
//! the profile socket itself is a request socket bound to the dial-in
//! URL, and connected daemons are fanned out to round-robin.
//!
//! Replies route back to the originating submission by an opaque
//! transport-level correlation rather than by task id; this router
//! therefore never sees a `task_id` — one accepted pipe per submission's
//! round trip is the correlation mechanism, mirroring a request/reply
//! socket's built-in fair-queue behaviour.

use mrd_core::MrdError;
use mrd_transport::{DialUrl, Listener, Stream, TlsServerConfig};
use mrd_wire::{read_message, write_message, EXIT_PAYLOAD};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tracing::error;

/// A round-robin pool of daemon connections the host has accepted.
pub struct DirectRouter {
    connections: Arc<Mutex<Vec<Arc<Mutex<Stream>>>>>,
    next: AtomicUsize,
    /// Notified once per accepted daemon pipe, so a synchronous launch can
    /// block on real dial-in (spec.md §4.4).
    notify: Arc<Notify>,
}

impl DirectRouter {
    /// A router with nothing bound yet, for tests that only exercise
    /// round-robin bookkeeping.
    pub fn empty() -> Self {
        Self { connections: Arc::new(Mutex::new(Vec::new())), next: AtomicUsize::new(0), notify: Arc::new(Notify::new()) }
    }

    /// Bind `url` and accept daemon dial-ins in the background, pushing
    /// each accepted pipe into the round-robin pool (spec.md §4.5: "the
    /// profile socket itself is a request socket bound to the dial-in
    /// URL" — the host binds, daemons dial in).
    pub async fn bind(url: &DialUrl, tls_config: Option<TlsServerConfig>) -> Result<(Self, DialUrl), MrdError> {
        let (listener, resolved) = Listener::bind(url, tls_config).await?;
        let connections: Arc<Mutex<Vec<Arc<Mutex<Stream>>>>> = Arc::new(Mutex::new(Vec::new()));
        let notify = Arc::new(Notify::new());

        {
            let connections = Arc::clone(&connections);
            let notify = Arc::clone(&notify);
            tokio::spawn(async move {
                loop {
                    match listener.accept().await {
                        Ok(stream) => {
                            connections.lock().await.push(Arc::new(Mutex::new(stream)));
                            notify.notify_one();
                        }
                        Err(e) => {
                            error!(error = %e, "direct-mode accept failed, accept loop exiting");
                            return;
                        }
                    }
                }
            });
        }

        Ok((Self { connections, next: AtomicUsize::new(0), notify }, resolved))
    }

    /// Notified once per accepted daemon pipe; a synchronous daemon
    /// launch waits on this the same way it waits on a dispatcher's
    /// roster growing.
    pub fn connect_notify(&self) -> Arc<Notify> {
        Arc::clone(&self.notify)
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.lock().await.len()
    }

    /// Submit one task payload and wait for its reply, round-robining
    /// across the accepted connections (spec.md §4.5: "built-in fair-queue
    /// / round-robin fan-out").
    pub async fn submit(&self, payload: &[u8]) -> Result<Vec<u8>, MrdError> {
        let conn = {
            let conns = self.connections.lock().await;
            if conns.is_empty() {
                return Err(MrdError::NothingToDo);
            }
            let index = self.next.fetch_add(1, Ordering::Relaxed) % conns.len();
            Arc::clone(&conns[index])
        };
        let mut stream = conn.lock().await;
        write_message(&mut *stream, payload).await.map_err(MrdError::Protocol)?;
        let reply = read_message(&mut *stream).await.map_err(MrdError::Protocol)?;
        Ok(reply)
    }

    /// Send the exit sentinel to every currently accepted daemon
    /// (spec.md §4.1 `reset`: "sends an in-band exit frame to each
    /// currently connected daemon").
    pub async fn broadcast_exit(&self) {
        let conns = self.connections.lock().await;
        for conn in conns.iter() {
            let mut stream = conn.lock().await;
            let _ = write_message(&mut *stream, &EXIT_PAYLOAD).await;
        }
    }
}

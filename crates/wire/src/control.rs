// SPDX-License-Identifier: MIT

//! Control-channel frames (spec.md §4.2/§4.3/§6): the host-to-dispatcher
//! handshake, status queries, and cancel/force-cancel commands.
//!
//! The canonical control frames named in spec.md §4.2 are a pair of
//! integers, `(command_task_id, flag)`. We keep that wire shape faithfully
//! in [`ControlRequest`]'s `(u32, u8)` encoding but expose a tagged enum to
//! callers so the dispatcher's event classifier (spec.md §4.3 step 1-6)
//! never has to re-derive the meaning of the magic `(0, 0)` pair.

use mrd_core::{DaemonOptions, TaskId, TlsMaterial};
use serde::{Deserialize, Serialize};

/// Host → dispatcher handshake, spec.md §6: "a 4-tuple `(default_packages,
/// tls_credentials, tls_password, serialization_config)`".
///
/// `serialization_config` is represented as the forwarded [`DaemonOptions`]
/// rather than a free-form config blob, since that is the only
/// serialization-affecting state this workspace defines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Handshake {
    pub default_packages: Vec<String>,
    pub tls_credentials: Option<TlsMaterial>,
    pub tls_password: Option<String>,
    pub serialization_config: DaemonOptions,
}

/// Reply to a [`Handshake`]. A dispatcher that cannot honour the requested
/// configuration replies `accepted: false` and the host surfaces
/// `MrdError::SyncDispatcher` (spec.md §4.1 error table).
///
/// `daemon_url` is the dispatcher's own resolved daemon-facing dial-in
/// URL (spec.md §4.1: "obtains from it the daemon dial-in URL(s)") — an
/// echo of what the host asked it to bind, included so the host never has
/// to assume the dispatcher bound exactly what it was told to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeReply {
    pub accepted: bool,
    pub daemon_url: String,
}

/// A control request on the host↔dispatcher channel.
///
/// Wire shape is `(task_id, flag)`, per spec.md §4.2's control frame table.
/// `task_id == 0` is reserved for the status query and the shutdown
/// broadcast; any other value names the task a cancel/force-cancel
/// applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlRequest {
    /// `(0, 0)`
    Status,
    /// `(task_id, 0)`
    Cancel { task_id: TaskId },
    /// `(task_id, 1)`
    ForceCancel { task_id: TaskId },
    /// `(0, 2)`: broadcast the exit sentinel to every connected daemon
    /// before the host tears the profile down (spec.md §4.1 `reset`,
    /// "sends an in-band exit frame to each currently connected daemon").
    Shutdown,
}

impl ControlRequest {
    /// Decode the raw `(task_id, flag)` wire pair into a typed request.
    pub fn from_wire_pair(task_id: u32, flag: u8) -> Self {
        match (task_id, flag) {
            (0, 0) => ControlRequest::Status,
            (0, _) => ControlRequest::Shutdown,
            (id, 0) => ControlRequest::Cancel { task_id: TaskId::new(id) },
            (id, _) => ControlRequest::ForceCancel { task_id: TaskId::new(id) },
        }
    }

    /// Encode back to the raw `(task_id, flag)` wire pair.
    pub fn to_wire_pair(self) -> (u32, u8) {
        match self {
            ControlRequest::Status => (0, 0),
            ControlRequest::Shutdown => (0, 2),
            ControlRequest::Cancel { task_id } => (task_id.0, 0),
            ControlRequest::ForceCancel { task_id } => (task_id.0, 1),
        }
    }
}

/// A connect or disconnect event reported in a status reply's `events`
/// list (spec.md §4.1: "the positive daemon-id for each connect and its
/// negation for each disconnect").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEvent(pub i64);

impl RosterEvent {
    pub fn connected(daemon_id: i64) -> Self {
        Self(daemon_id)
    }

    pub fn disconnected(daemon_id: i64) -> Self {
        Self(-daemon_id)
    }
}

/// Reply to a [`ControlRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlReply {
    /// Reply to [`ControlRequest::Status`]: `[connections, awaiting,
    /// executing, completed, events...]` (spec.md §4.1, P4: `msgid ==
    /// completed + awaiting + executing`).
    Status { connections: u32, awaiting: u32, executing: u32, completed: u64, events: Vec<RosterEvent> },
    /// Reply to [`ControlRequest::Cancel`]/[`ControlRequest::ForceCancel`]:
    /// whether the task was cancelled before dispatch.
    Cancelled { cancelled: bool },
    /// Reply to [`ControlRequest::Shutdown`] once the exit sentinel has
    /// been queued for every connected daemon.
    ShutdownAck,
}

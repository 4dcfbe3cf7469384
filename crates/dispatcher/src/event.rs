// SPDX-License-Identifier: MIT

//! The six event classes `step` classifies (spec.md §4.3 "Scheduling
//! algorithm").

use bytes::Bytes;
use mrd_core::{PipeId, TaskId};
use mrd_wire::ReplyEnvelope;

#[derive(Debug, Clone)]
pub enum Event {
    /// 1. Task arrived from the host.
    TaskArrived { task_id: TaskId, payload: Bytes },
    /// 2. Reply arrived from a daemon.
    DaemonReply { pipe: PipeId, reply: ReplyEnvelope },
    /// 3. Daemon connected.
    DaemonConnected { pipe: PipeId, daemon_id: Option<i64> },
    /// 4. Daemon disconnected.
    DaemonDisconnected { pipe: PipeId },
    /// 5. Status command.
    Status,
    /// 6. Cancel command (force=false is soft cancel, force=true is
    /// force-cancel per spec.md §4.2's `(task_id, flag)` control frame).
    Cancel { task_id: TaskId, force: bool },
    /// 7. Shutdown command: broadcast the exit sentinel to every connected
    /// daemon before the host tears the profile down (spec.md §4.1 `reset`).
    Shutdown,
}

// SPDX-License-Identifier: MIT

//! Side effects `step` asks the caller to carry out. `step` itself never
//! touches a socket — keeping the scheduling algorithm synchronous and
//! directly testable (SPEC_FULL.md §10 "Coroutine-free cooperative loop").

use mrd_core::PipeId;
use mrd_wire::{ControlReply, ReplyEnvelope, TaskEnvelope};

#[derive(Debug, Clone)]
pub enum Action {
    /// Send a task envelope down a daemon's pipe.
    SendTask { pipe: PipeId, envelope: TaskEnvelope },
    /// Forward a reply envelope to the host-facing socket.
    ReplyToHost(ReplyEnvelope),
    /// Reply to the control request currently being answered.
    ReplyControl(ControlReply),
    /// Close a daemon's pipe (used by force-cancel to force a respawn).
    ClosePipe(PipeId),
    /// Send the exit sentinel down a daemon's pipe (spec.md §4.1 `reset`,
    /// "sends an in-band exit frame to each currently connected daemon").
    SendExit(PipeId),
}

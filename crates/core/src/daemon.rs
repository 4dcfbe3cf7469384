// SPDX-License-Identifier: MIT

//! Daemon roster entry (spec.md §3 "Daemon").

use crate::ids::{PipeId, TaskId};

/// State of a single daemon connection, as tracked by the dispatcher's
/// roster. Terminal only via removal from the roster (there is no
/// `Disconnected` variant held in the roster itself — spec.md §4.3 "Remove
/// roster entry" on disconnect).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Idle,
    Busy(TaskId),
}

impl DaemonState {
    pub fn is_idle(self) -> bool {
        matches!(self, DaemonState::Idle)
    }

    pub fn assigned_task(self) -> Option<TaskId> {
        match self {
            DaemonState::Busy(id) => Some(id),
            DaemonState::Idle => None,
        }
    }
}

/// A daemon roster entry, as visible to the dispatcher (spec.md §3).
#[derive(Debug, Clone)]
pub struct DaemonHandle {
    pub pipe: PipeId,
    pub state: DaemonState,
    /// Stable integer daemon-id supplied at dial-in, used for the `events`
    /// stream (spec.md §4.1 "positive daemon-id for each connect").
    pub daemon_id: Option<i64>,
    /// Position in connection order, used as the deterministic tiebreak
    /// when more than one daemon is idle (spec.md §4.3.1 "earliest
    /// connection").
    pub position: u64,
}

impl DaemonHandle {
    pub fn new(pipe: PipeId, daemon_id: Option<i64>, position: u64) -> Self {
        Self { pipe, state: DaemonState::Idle, daemon_id, position }
    }
}

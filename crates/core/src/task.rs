// SPDX-License-Identifier: MIT

//! Task lifecycle (spec.md §3 "Task").

use crate::ids::TaskId;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a task, tracked host-side.
///
/// Invariant (spec.md §3): a task id is in at most one of
/// `{Queued, Assigned, Completed}` at any instant. Enforced here by making
/// the states an enum rather than independent booleans, so an illegal
/// combination (e.g. queued *and* assigned) is unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Submitted,
    Queued,
    Assigned,
    Completed,
    Cancelled,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled | TaskStatus::Failed)
    }
}

/// Outcome of a task, delivered to the host's completion signal.
///
/// Mirrors the reply envelope's tagged union (spec.md §4.2): `status` plus
/// an optional payload. `ConnectionReset` always carries
/// [`crate::error::CONNECTION_RESET_CODE`] (19) as its wire status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskResult {
    Ok(Bytes),
    UserError(Bytes),
    Cancelled,
    ConnectionReset,
    Timeout,
}

impl TaskResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, TaskResult::Ok(_))
    }
}

/// A unit of work submitted to a profile.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub payload: Bytes,
}

impl Task {
    pub fn new(id: TaskId, payload: impl Into<Bytes>) -> Self {
        Self { id, payload: payload.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_exactly_the_three_named_in_spec() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Submitted.is_terminal());
        assert!(!TaskStatus::Queued.is_terminal());
        assert!(!TaskStatus::Assigned.is_terminal());
    }
}

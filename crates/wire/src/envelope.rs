// SPDX-License-Identifier: MIT

//! Task and reply envelopes (spec.md §4.2/§6).

use bytes::Bytes;
use mrd_core::{TaskId, TaskResult};
use serde::{Deserialize, Serialize};

/// Host → dispatcher → daemon: `(task_id, payload)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub task_id: TaskId,
    pub payload: Bytes,
}

impl TaskEnvelope {
    pub fn new(task_id: TaskId, payload: impl Into<Bytes>) -> Self {
        Self { task_id, payload: payload.into() }
    }
}

/// The tagged status carried by a [`ReplyEnvelope`], mirroring
/// [`mrd_core::TaskResult`] without the payload bytes baked into the
/// discriminant, so it round-trips as `(task_id, status, payload)` over
/// the wire exactly as spec.md §6 describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    Ok,
    UserError,
    Cancelled,
    ConnectionReset,
    Timeout,
}

/// Daemon → dispatcher → host: `(task_id, status, payload)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyEnvelope {
    pub task_id: TaskId,
    pub status: ReplyStatus,
    pub payload: Bytes,
}

impl ReplyEnvelope {
    pub fn from_result(task_id: TaskId, result: TaskResult) -> Self {
        match result {
            TaskResult::Ok(payload) => Self { task_id, status: ReplyStatus::Ok, payload },
            TaskResult::UserError(payload) => {
                Self { task_id, status: ReplyStatus::UserError, payload }
            }
            TaskResult::Cancelled => {
                Self { task_id, status: ReplyStatus::Cancelled, payload: Bytes::new() }
            }
            TaskResult::ConnectionReset => {
                Self { task_id, status: ReplyStatus::ConnectionReset, payload: Bytes::new() }
            }
            TaskResult::Timeout => {
                Self { task_id, status: ReplyStatus::Timeout, payload: Bytes::new() }
            }
        }
    }

    pub fn into_result(self) -> TaskResult {
        match self.status {
            ReplyStatus::Ok => TaskResult::Ok(self.payload),
            ReplyStatus::UserError => TaskResult::UserError(self.payload),
            ReplyStatus::Cancelled => TaskResult::Cancelled,
            ReplyStatus::ConnectionReset => TaskResult::ConnectionReset,
            ReplyStatus::Timeout => TaskResult::Timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_envelope_round_trips_through_task_result() {
        let result = TaskResult::Ok(Bytes::from_static(b"hello"));
        let envelope = ReplyEnvelope::from_result(TaskId::new(7), result.clone());
        assert_eq!(envelope.task_id, TaskId::new(7));
        assert_eq!(envelope.into_result(), result);
    }

    #[test]
    fn connection_reset_carries_no_payload() {
        let envelope = ReplyEnvelope::from_result(TaskId::new(1), TaskResult::ConnectionReset);
        assert_eq!(envelope.status, ReplyStatus::ConnectionReset);
        assert!(envelope.payload.is_empty());
    }

    #[test]
    fn task_envelope_serializes_as_json_object() {
        let envelope = TaskEnvelope::new(TaskId::new(3), Bytes::from_static(b"abc"));
        let json = serde_json::to_string(&envelope).expect("serializes");
        let back: TaskEnvelope = serde_json::from_str(&json).expect("deserializes");
        assert_eq!(back.task_id, TaskId::new(3));
        assert_eq!(back.payload, Bytes::from_static(b"abc"));
    }
}

// SPDX-License-Identifier: MIT

//! Dispatcher-resident data (spec.md §4.3): FIFO queue, roster, by-task-id
//! index, completion counter, and events ring buffer.

use bytes::Bytes;
use mrd_core::{DaemonHandle, PipeId, TaskId, TaskQueue};
use mrd_wire::RosterEvent;
use std::collections::{HashMap, HashSet, VecDeque};

/// Bound on the events ring buffer (spec.md §4.3: "an events ring buffer
/// of connect/disconnect events"); oldest events are dropped once a status
/// query has not drained them for this many connects/disconnects.
const EVENTS_CAPACITY: usize = 1024;

pub struct DispatcherState {
    pub(crate) queue: TaskQueue,
    pub(crate) roster: HashMap<PipeId, DaemonHandle>,
    pub(crate) by_task: HashMap<TaskId, PipeId>,
    pub(crate) completed: u64,
    pub(crate) events: VecDeque<RosterEvent>,
    /// Tasks force-cancelled while assigned, so a subsequent disconnect
    /// does not requeue them (spec.md §4.3 step 4: "unless a prior
    /// force-cancel has marked it").
    pub(crate) force_cancelled: HashSet<TaskId>,
    /// Payload for every task not yet replied to, keyed by task id — the
    /// FIFO queue itself only orders ids, so a task dequeued onto a newly
    /// idle or newly connected daemon still needs its bytes looked up here.
    pub(crate) payloads: HashMap<TaskId, Bytes>,
    pub(crate) retry: bool,
    next_position: u64,
}

impl DispatcherState {
    pub fn new(retry: bool) -> Self {
        Self {
            queue: TaskQueue::new(),
            roster: HashMap::new(),
            by_task: HashMap::new(),
            completed: 0,
            events: VecDeque::new(),
            force_cancelled: HashSet::new(),
            payloads: HashMap::new(),
            retry,
            next_position: 0,
        }
    }

    pub fn idle_daemon_count(&self) -> usize {
        self.roster.values().filter(|d| d.state.is_idle()).count()
    }

    /// Pick the idle daemon with the smallest `position` (spec.md §4.3
    /// step 1: "deterministic tiebreak: earliest connection").
    pub(crate) fn pick_idle_daemon(&self) -> Option<PipeId> {
        self.roster
            .iter()
            .filter(|(_, d)| d.state.is_idle())
            .min_by_key(|(_, d)| d.position)
            .map(|(pipe, _)| *pipe)
    }

    pub(crate) fn push_event(&mut self, event: RosterEvent) {
        if self.events.len() >= EVENTS_CAPACITY {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub(crate) fn drain_events(&mut self) -> Vec<RosterEvent> {
        self.events.drain(..).collect()
    }

    pub(crate) fn next_position(&mut self) -> u64 {
        let position = self.next_position;
        self.next_position += 1;
        position
    }

    pub fn connection_count(&self) -> usize {
        self.roster.len()
    }

    pub fn awaiting_count(&self) -> usize {
        self.queue.len()
    }

    pub fn executing_count(&self) -> usize {
        self.roster.values().filter(|d| !d.state.is_idle()).count()
    }

    pub fn completed_count(&self) -> u64 {
        self.completed
    }

    fn assert_invariants(&self) {
        self.queue.assert_p1(self.idle_daemon_count());
    }
}

pub(crate) fn new_daemon_handle(pipe: PipeId, position: u64, daemon_id: Option<i64>) -> DaemonHandle {
    DaemonHandle::new(pipe, daemon_id, position)
}

pub(crate) fn check_invariants(state: &DispatcherState) {
    state.assert_invariants();
}

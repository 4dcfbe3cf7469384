// SPDX-License-Identifier: MIT

//! The scheduling algorithm itself (spec.md §4.3), as one pure function.

use crate::action::Action;
use crate::event::Event;
use crate::state::{check_invariants, new_daemon_handle, DispatcherState};
use bytes::Bytes;
use mrd_core::{DaemonState, PipeId, TaskId, TaskResult};
use mrd_wire::{ControlReply, ReplyEnvelope, RosterEvent, TaskEnvelope};

/// Apply one [`Event`] to `state`, returning the [`Action`]s the caller
/// must perform. Never touches I/O; never blocks.
pub fn step(state: &mut DispatcherState, event: Event) -> Vec<Action> {
    let actions = match event {
        Event::TaskArrived { task_id, payload } => on_task_arrived(state, task_id, payload),
        Event::DaemonReply { pipe, reply } => on_daemon_reply(state, pipe, reply),
        Event::DaemonConnected { pipe, daemon_id } => on_daemon_connected(state, pipe, daemon_id),
        Event::DaemonDisconnected { pipe } => on_daemon_disconnected(state, pipe),
        Event::Status => on_status(state),
        Event::Cancel { task_id, force } => on_cancel(state, task_id, force),
        Event::Shutdown => on_shutdown(state),
    };
    check_invariants(state);
    actions
}

fn assign(state: &mut DispatcherState, pipe: PipeId, task_id: TaskId) -> Option<Action> {
    let payload = state.payloads.get(&task_id).cloned().unwrap_or_default();
    let handle = state.roster.get_mut(&pipe)?;
    handle.state = DaemonState::Busy(task_id);
    state.by_task.insert(task_id, pipe);
    Some(Action::SendTask { pipe, envelope: TaskEnvelope::new(task_id, payload) })
}

fn on_task_arrived(state: &mut DispatcherState, task_id: TaskId, payload: Bytes) -> Vec<Action> {
    state.payloads.insert(task_id, payload);
    match state.pick_idle_daemon() {
        Some(pipe) => assign(state, pipe, task_id).into_iter().collect(),
        None => {
            state.queue.push_back(task_id);
            Vec::new()
        }
    }
}

fn on_daemon_reply(state: &mut DispatcherState, pipe: PipeId, reply: ReplyEnvelope) -> Vec<Action> {
    let task_id = reply.task_id;
    state.by_task.remove(&task_id);
    state.payloads.remove(&task_id);
    state.completed += 1;

    if let Some(handle) = state.roster.get_mut(&pipe) {
        handle.state = DaemonState::Idle;
    }

    let mut actions = vec![Action::ReplyToHost(reply)];

    // busy -> idle only becomes visible here, atomically with the queue
    // pop (spec.md §4.3 "State machine per daemon").
    if let Some(next_task) = state.queue.pop_front() {
        if let Some(action) = assign(state, pipe, next_task) {
            actions.push(action);
        }
    }
    actions
}

fn on_daemon_connected(state: &mut DispatcherState, pipe: PipeId, daemon_id: Option<i64>) -> Vec<Action> {
    let position = state.next_position();
    state.roster.insert(pipe, new_daemon_handle(pipe, position, daemon_id));
    if let Some(id) = daemon_id {
        state.push_event(RosterEvent::connected(id));
    }

    if let Some(task_id) = state.queue.pop_front() {
        if let Some(action) = assign(state, pipe, task_id) {
            return vec![action];
        }
    }
    Vec::new()
}

fn on_daemon_disconnected(state: &mut DispatcherState, pipe: PipeId) -> Vec<Action> {
    let Some(handle) = state.roster.remove(&pipe) else {
        return Vec::new();
    };
    if let Some(id) = handle.daemon_id {
        state.push_event(RosterEvent::disconnected(id));
    }

    let mut actions = Vec::new();
    if let Some(task_id) = handle.state.assigned_task() {
        state.by_task.remove(&task_id);
        let force_cancelled = state.force_cancelled.remove(&task_id);
        if state.retry && !force_cancelled {
            state.queue.push_front(task_id);
        } else {
            state.payloads.remove(&task_id);
            actions.push(Action::ReplyToHost(ReplyEnvelope::from_result(
                task_id,
                TaskResult::ConnectionReset,
            )));
        }
    }
    actions
}

fn on_status(state: &mut DispatcherState) -> Vec<Action> {
    vec![Action::ReplyControl(ControlReply::Status {
        connections: state.connection_count() as u32,
        awaiting: state.awaiting_count() as u32,
        executing: state.executing_count() as u32,
        completed: state.completed_count(),
        events: state.drain_events(),
    })]
}

/// Broadcast the exit sentinel to every roster pipe, connected or not
/// currently executing, then acknowledge (spec.md §4.1 `reset`: "sends an
/// in-band exit frame to each currently connected daemon").
fn on_shutdown(state: &mut DispatcherState) -> Vec<Action> {
    let mut actions: Vec<Action> =
        state.roster.keys().map(|&pipe| Action::SendExit(pipe)).collect();
    actions.push(Action::ReplyControl(ControlReply::ShutdownAck));
    actions
}

fn on_cancel(state: &mut DispatcherState, task_id: TaskId, force: bool) -> Vec<Action> {
    if state.queue.remove(task_id) {
        state.payloads.remove(&task_id);
        return vec![
            Action::ReplyControl(ControlReply::Cancelled { cancelled: true }),
            Action::ReplyToHost(ReplyEnvelope::from_result(task_id, TaskResult::Cancelled)),
        ];
    }

    if let Some(&pipe) = state.by_task.get(&task_id) {
        let mut actions = vec![Action::ReplyControl(ControlReply::Cancelled { cancelled: false })];
        if force {
            state.force_cancelled.insert(task_id);
            actions.push(Action::ClosePipe(pipe));
        }
        return actions;
    }

    vec![Action::ReplyControl(ControlReply::Cancelled { cancelled: false })]
}

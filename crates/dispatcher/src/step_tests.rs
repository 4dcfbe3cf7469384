use crate::action::Action;
use crate::event::Event;
use crate::state::DispatcherState;
use crate::step::step;
use bytes::Bytes;
use mrd_core::{PipeId, TaskId, TaskResult};
use mrd_wire::{ControlReply, ReplyEnvelope, ReplyStatus};

fn connect(state: &mut DispatcherState, pipe: u64, daemon_id: Option<i64>) {
    step(state, Event::DaemonConnected { pipe: PipeId(pipe), daemon_id });
}

#[test]
fn task_arrived_with_an_idle_daemon_is_sent_immediately() {
    let mut state = DispatcherState::new(true);
    connect(&mut state, 1, None);
    let actions = step(
        &mut state,
        Event::TaskArrived { task_id: TaskId::new(1), payload: Bytes::from_static(b"hi") },
    );
    assert_eq!(actions.len(), 1);
    assert!(matches!(actions[0], Action::SendTask { pipe: PipeId(1), .. }));
}

#[test]
fn task_arrived_with_no_idle_daemon_is_queued() {
    let mut state = DispatcherState::new(true);
    let actions = step(
        &mut state,
        Event::TaskArrived { task_id: TaskId::new(1), payload: Bytes::from_static(b"hi") },
    );
    assert!(actions.is_empty());
    assert_eq!(state.awaiting_count(), 1);
}

#[test]
fn idle_daemon_with_smallest_position_is_picked_first() {
    let mut state = DispatcherState::new(true);
    connect(&mut state, 2, None);
    connect(&mut state, 1, None);
    let actions = step(
        &mut state,
        Event::TaskArrived { task_id: TaskId::new(1), payload: Bytes::new() },
    );
    // pipe 2 connected first (position 0), so it gets the task.
    assert!(matches!(actions[0], Action::SendTask { pipe: PipeId(2), .. }));
}

#[test]
fn daemon_never_idles_while_queue_is_non_empty() {
    let mut state = DispatcherState::new(true);
    connect(&mut state, 1, None);
    step(&mut state, Event::TaskArrived { task_id: TaskId::new(1), payload: Bytes::new() });
    step(&mut state, Event::TaskArrived { task_id: TaskId::new(2), payload: Bytes::new() });
    assert_eq!(state.awaiting_count(), 1);

    let reply = ReplyEnvelope { task_id: TaskId::new(1), status: ReplyStatus::Ok, payload: Bytes::new() };
    let actions = step(&mut state, Event::DaemonReply { pipe: PipeId(1), reply });

    assert_eq!(state.awaiting_count(), 0);
    assert!(actions.iter().any(|a| matches!(a, Action::SendTask { .. })));
}

#[test]
fn connection_reset_is_synthesized_when_retry_is_disabled() {
    let mut state = DispatcherState::new(false);
    connect(&mut state, 1, None);
    step(&mut state, Event::TaskArrived { task_id: TaskId::new(1), payload: Bytes::new() });
    let actions = step(&mut state, Event::DaemonDisconnected { pipe: PipeId(1) });
    assert_eq!(actions.len(), 1);
    match &actions[0] {
        Action::ReplyToHost(reply) => {
            assert_eq!(reply.clone().into_result(), TaskResult::ConnectionReset);
        }
        other => panic!("unexpected action: {other:?}"),
    }
}

#[test]
fn retry_requeues_at_the_head_on_disconnect() {
    let mut state = DispatcherState::new(true);
    connect(&mut state, 1, None);
    step(&mut state, Event::TaskArrived { task_id: TaskId::new(1), payload: Bytes::from_static(b"x") });
    let actions = step(&mut state, Event::DaemonDisconnected { pipe: PipeId(1) });
    assert!(actions.is_empty(), "retry=true must not synthesize a reply");
    assert_eq!(state.awaiting_count(), 1);

    // reconnecting daemon immediately gets the retried task back, payload intact.
    let actions = step(&mut state, Event::DaemonConnected { pipe: PipeId(2), daemon_id: None });
    match &actions[0] {
        Action::SendTask { envelope, .. } => {
            assert_eq!(envelope.task_id, TaskId::new(1));
            assert_eq!(envelope.payload, Bytes::from_static(b"x"));
        }
        other => panic!("unexpected action: {other:?}"),
    }
}

#[test]
fn cancel_before_dispatch_removes_from_queue_and_synthesizes_reply() {
    let mut state = DispatcherState::new(true);
    step(&mut state, Event::TaskArrived { task_id: TaskId::new(1), payload: Bytes::new() });
    let actions = step(&mut state, Event::Cancel { task_id: TaskId::new(1), force: false });
    assert_eq!(actions.len(), 2);
    assert!(matches!(actions[0], Action::ReplyControl(ControlReply::Cancelled { cancelled: true })));
}

#[test]
fn cancel_of_an_assigned_task_replies_false_without_force() {
    let mut state = DispatcherState::new(true);
    connect(&mut state, 1, None);
    step(&mut state, Event::TaskArrived { task_id: TaskId::new(1), payload: Bytes::new() });
    let actions = step(&mut state, Event::Cancel { task_id: TaskId::new(1), force: false });
    assert_eq!(actions.len(), 1);
    assert!(matches!(actions[0], Action::ReplyControl(ControlReply::Cancelled { cancelled: false })));
}

#[test]
fn force_cancel_closes_the_pipe_and_suppresses_the_later_requeue() {
    let mut state = DispatcherState::new(true);
    connect(&mut state, 1, None);
    step(&mut state, Event::TaskArrived { task_id: TaskId::new(1), payload: Bytes::new() });
    let actions = step(&mut state, Event::Cancel { task_id: TaskId::new(1), force: true });
    assert!(actions.iter().any(|a| matches!(a, Action::ClosePipe(PipeId(1)))));

    // the daemon then actually disconnects; with retry=true it would normally
    // requeue, but the force-cancel marker suppresses that.
    let actions = step(&mut state, Event::DaemonDisconnected { pipe: PipeId(1) });
    assert!(actions.is_empty());
    assert_eq!(state.awaiting_count(), 0);
}

#[test]
fn status_drains_the_events_ring_buffer() {
    let mut state = DispatcherState::new(true);
    connect(&mut state, 1, Some(7));
    let actions = step(&mut state, Event::Status);
    match &actions[0] {
        Action::ReplyControl(ControlReply::Status { events, connections, .. }) => {
            assert_eq!(*connections, 1);
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].0, 7);
        }
        other => panic!("unexpected action: {other:?}"),
    }
    // a second status query sees no new events.
    let actions = step(&mut state, Event::Status);
    match &actions[0] {
        Action::ReplyControl(ControlReply::Status { events, .. }) => assert!(events.is_empty()),
        other => panic!("unexpected action: {other:?}"),
    }
}

#[test]
fn disconnect_of_an_unknown_pipe_is_a_no_op() {
    let mut state = DispatcherState::new(true);
    let actions = step(&mut state, Event::DaemonDisconnected { pipe: PipeId(999) });
    assert!(actions.is_empty());
}

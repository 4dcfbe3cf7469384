// SPDX-License-Identifier: MIT

//! Workspace-level black-box tests: end-to-end scenarios over real
//! sockets, plus property tests over the dispatcher's pure scheduling
//! function. Grounded in the corpus's `tests/specs.rs` pattern of
//! spawning real listeners and real client connections rather than
//! mocking the transport layer.

use bytes::Bytes;
use mrd_core::{DaemonOptions, MrdError, PipeId, TaskId, TaskIdCounter, TaskResult};
use mrd_dispatcher::{step, Action, DispatcherState, Event};
use mrd_host::{DirectRouter, ProfileClient};
use mrd_transport::{DialUrl, Listener};
use mrd_wire::{read_frame, write_frame, Handshake, HandshakeReply, ReplyEnvelope, ReplyStatus, TaskEnvelope};
use mrd_worker::handler::EchoHandler;
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(2);

async fn bind_pair() -> ((Listener, DialUrl), (Listener, DialUrl)) {
    let daemon_url = DialUrl::parse("tcp://127.0.0.1:0").expect("parses");
    let host_url = DialUrl::parse("tcp://127.0.0.1:0").expect("parses");
    let daemon = Listener::bind(&daemon_url, None).await.expect("binds daemon listener");
    let host = Listener::bind(&host_url, None).await.expect("binds host listener");
    (daemon, host)
}

/// Dial `url`, perform the mandatory handshake, and return the connected
/// client (spec.md §4.1: "connects to it, performs a handshake exchange").
async fn connect_client(url: &DialUrl) -> ProfileClient {
    let handshake = Handshake {
        default_packages: Vec::new(),
        tls_credentials: None,
        tls_password: None,
        serialization_config: DaemonOptions::default(),
    };
    let (client, reply) = ProfileClient::connect_and_handshake(url, None, handshake).await.expect("handshake");
    assert!(reply.accepted);
    client
}

/// Scenario 1: two daemons connect to a dispatcher, submitted tasks are
/// echoed back through the whole host -> dispatcher -> daemon -> dispatcher
/// -> host round trip, with several submissions in flight at once (the
/// dispatcher's entire purpose is queueing across concurrently-busy
/// daemons, so the client must not serialize them).
#[tokio::test]
async fn two_daemon_smoke_test() {
    let ((daemon_listener, daemon_url), (host_listener, host_url)) = bind_pair().await;
    let state = DispatcherState::new(false);
    tokio::spawn(mrd_dispatcher::run::run(state, daemon_listener, host_listener, daemon_url.to_string()));

    for _ in 0..2 {
        let url = daemon_url.clone();
        tokio::spawn(async move {
            let config = mrd_worker::RunConfig {
                url,
                tls_client_config: None,
                options: DaemonOptions::default(),
                seed: None,
            };
            mrd_worker::run(config, Arc::new(EchoHandler)).await
        });
    }
    tokio::time::sleep(Duration::from_millis(150)).await;

    let client = Arc::new(connect_client(&host_url).await);
    let mut ids = TaskIdCounter::new();
    let submissions: Vec<_> = (0..5)
        .map(|i| {
            let client = Arc::clone(&client);
            let task_id = ids.next();
            let payload = Bytes::from(format!("task-{i}"));
            tokio::spawn(async move {
                let reply = client.submit(task_id, payload.clone(), WAIT).await.expect("submits");
                (task_id, payload, reply)
            })
        })
        .collect();

    for submission in submissions {
        let (task_id, payload, reply) = submission.await.expect("join");
        assert_eq!(reply.task_id, task_id);
        assert_eq!(reply.into_result(), TaskResult::Ok(payload));
    }
}

/// Scenario: direct mode (no dispatcher). The host binds the profile
/// socket itself and daemons dial in (spec.md §4.5); the transport's
/// round-robin fan-out distributes tasks across them.
#[tokio::test]
async fn direct_mode_round_robin_covers_every_connection() {
    let url = DialUrl::parse("tcp://127.0.0.1:0").expect("parses");
    let (router, resolved) = DirectRouter::bind(&url, None).await.expect("binds");

    for _ in 0..3 {
        let dial_url = resolved.clone();
        tokio::spawn(async move {
            let config = mrd_worker::RunConfig {
                url: dial_url,
                tls_client_config: None,
                options: DaemonOptions::default(),
                seed: None,
            };
            mrd_worker::run(config, Arc::new(EchoHandler)).await
        });
    }
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(router.connection_count().await, 3);

    let mut ids = TaskIdCounter::new();
    for i in 0..6u8 {
        let envelope = TaskEnvelope::new(ids.next(), Bytes::from(vec![i]));
        let bytes = mrd_wire::encode(&envelope).expect("encodes");
        let reply_bytes = router.submit(&bytes).await.expect("submits");
        let reply: ReplyEnvelope = mrd_wire::decode(&reply_bytes).expect("decodes");
        assert_eq!(reply.into_result(), TaskResult::Ok(Bytes::from(vec![i])));
    }
}

/// Scenario: an ephemeral port (`:0`) resolves to a concrete, reusable
/// port before any daemon dials in.
#[tokio::test]
async fn wildcard_port_resolves_before_daemons_connect() {
    let url = DialUrl::parse("tcp://127.0.0.1:0").expect("parses");
    let (_listener, resolved) = Listener::bind(&url, None).await.expect("binds");
    assert_ne!(resolved.addr.port(), Some(0));
}

/// Scenario: a daemon crashes mid-task; with retry enabled the dispatcher
/// requeues the task at the head of the queue and a second daemon
/// completes it without the host ever seeing an error.
#[tokio::test]
async fn crash_and_retry_completes_the_task_on_a_second_daemon() {
    let ((daemon_listener, daemon_url), (host_listener, host_url)) = bind_pair().await;
    let state = DispatcherState::new(true);
    tokio::spawn(mrd_dispatcher::run::run(state, daemon_listener, host_listener, daemon_url.to_string()));

    // First daemon: accept the task and immediately drop the connection
    // without replying, simulating a crash.
    let crashing_url = daemon_url.clone();
    tokio::spawn(async move {
        let mut stream = mrd_transport::dial(&crashing_url, None).await.expect("dials");
        let _envelope: TaskEnvelope = read_frame(&mut stream).await.expect("reads task");
        drop(stream);
    });

    let submit = tokio::spawn({
        let client_url = host_url.clone();
        async move {
            let client = connect_client(&client_url).await;
            client.submit(TaskId::new(1), Bytes::from_static(b"retry-me"), Duration::from_secs(5)).await
        }
    });

    // Give the crash time to be observed by the dispatcher, then bring up
    // the daemon that will actually complete the task.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let second_url = daemon_url.clone();
    tokio::spawn(async move {
        let config = mrd_worker::RunConfig {
            url: second_url,
            tls_client_config: None,
            options: DaemonOptions::default(),
            seed: None,
        };
        mrd_worker::run(config, Arc::new(EchoHandler)).await
    });

    let reply = submit.await.expect("join").expect("submits and completes");
    assert_eq!(reply.into_result(), TaskResult::Ok(Bytes::from_static(b"retry-me")));
}

/// Scenario: cancelling a task still sitting in the queue (no daemon
/// connected yet) synthesizes an immediate cancelled reply without ever
/// reaching a daemon. Both the task submission and the cancel travel the
/// same host socket, pipelined one after the other without waiting for
/// the first reply in between (spec.md §4.3: the host-facing socket
/// carries tasks and control commands together).
#[tokio::test]
async fn cancel_before_dispatch_is_answered_without_a_daemon() {
    let ((daemon_listener, _daemon_url), (host_listener, host_url)) = bind_pair().await;
    let state = DispatcherState::new(false);
    tokio::spawn(mrd_dispatcher::run::run(state, daemon_listener, host_listener, "tcp://127.0.0.1:0".to_string()));

    let mut stream = mrd_transport::dial(&host_url, None).await.expect("dials");
    write_frame(
        &mut stream,
        &Handshake {
            default_packages: Vec::new(),
            tls_credentials: None,
            tls_password: None,
            serialization_config: DaemonOptions::default(),
        },
    )
    .await
    .expect("writes handshake");
    let handshake_reply: HandshakeReply = read_frame(&mut stream).await.expect("reads handshake reply");
    assert!(handshake_reply.accepted);

    write_frame(&mut stream, &TaskEnvelope::new(TaskId::new(9), Bytes::from_static(b"queued")))
        .await
        .expect("writes task");
    write_frame(&mut stream, &mrd_wire::ControlRequest::Cancel { task_id: TaskId::new(9) })
        .await
        .expect("writes cancel");

    let control_reply: mrd_wire::ControlReply = read_frame(&mut stream).await.expect("reads control reply");
    match control_reply {
        mrd_wire::ControlReply::Cancelled { cancelled } => assert!(cancelled),
        other => panic!("unexpected reply: {other:?}"),
    }

    let task_reply: ReplyEnvelope = read_frame(&mut stream).await.expect("reads synthesized task reply");
    assert_eq!(task_reply.task_id, TaskId::new(9));
    assert_eq!(task_reply.into_result(), TaskResult::Cancelled);
}

/// Scenario: once the host-facing transport is gone, a client synchronous
/// call surfaces a timeout or a connection-closed error rather than
/// hanging forever (spec.md §7 propagation policy: only transport failure
/// is fatal to the caller).
#[tokio::test]
async fn transport_teardown_surfaces_as_a_timeout_not_a_hang() {
    let ((daemon_listener, _daemon_url), (host_listener, host_url)) = bind_pair().await;
    let state = DispatcherState::new(false);
    let dispatcher =
        tokio::spawn(mrd_dispatcher::run::run(state, daemon_listener, host_listener, "tcp://127.0.0.1:0".to_string()));

    let client = connect_client(&host_url).await;
    dispatcher.abort();
    drop(dispatcher);

    let result = client.status(Duration::from_millis(200)).await;
    assert!(matches!(result, Err(MrdError::Timeout) | Err(MrdError::Protocol(_))));
}

/// Scenario 6: resetting a profile with `signal=true` broadcasts the exit
/// sentinel to every connected daemon, and sends a shutdown acknowledgement
/// back to the caller (spec.md §4.1 `reset`, P5 reset finality).
#[tokio::test]
async fn shutdown_acknowledges_and_exits_connected_daemons() {
    let ((daemon_listener, daemon_url), (host_listener, host_url)) = bind_pair().await;
    let state = DispatcherState::new(false);
    tokio::spawn(mrd_dispatcher::run::run(state, daemon_listener, host_listener, daemon_url.to_string()));

    let daemon_stream_url = daemon_url.clone();
    let daemon_saw_exit = tokio::spawn(async move {
        let mut stream = mrd_transport::dial(&daemon_stream_url, None).await.expect("dials");
        let bytes = mrd_wire::read_message(&mut stream).await.expect("reads a frame");
        mrd_wire::is_exit_payload(&bytes)
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let client = connect_client(&host_url).await;
    let reply = client.shutdown(WAIT).await.expect("shutdown acknowledged");
    assert!(matches!(reply, mrd_wire::ControlReply::ShutdownAck));

    assert!(daemon_saw_exit.await.expect("join"));
}

// ---------------------------------------------------------------------
// Property tests over `step()`, the dispatcher's pure scheduling function.
// ---------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Op {
    Connect(u64),
    Disconnect(u64),
    Submit(u32),
    Complete(u64, u32),
    Cancel(u32, bool),
}

fn op_strategy() -> impl proptest::strategy::Strategy<Value = Op> {
    use proptest::prelude::*;
    prop_oneof![
        (0u64..4).prop_map(Op::Connect),
        (0u64..4).prop_map(Op::Disconnect),
        (1u32..8).prop_map(Op::Submit),
        ((0u64..4), (1u32..8)).prop_map(|(p, t)| Op::Complete(p, t)),
        ((1u32..8), proptest::bool::ANY).prop_map(|(t, f)| Op::Cancel(t, f)),
    ]
}

fn apply(state: &mut DispatcherState, op: &Op) -> Vec<Action> {
    match *op {
        Op::Connect(pipe) => step(state, Event::DaemonConnected { pipe: PipeId(pipe), daemon_id: None }),
        Op::Disconnect(pipe) => step(state, Event::DaemonDisconnected { pipe: PipeId(pipe) }),
        Op::Submit(task) => step(
            state,
            Event::TaskArrived { task_id: TaskId::new(task), payload: Bytes::from_static(b"x") },
        ),
        Op::Complete(pipe, task) => step(
            state,
            Event::DaemonReply {
                pipe: PipeId(pipe),
                reply: ReplyEnvelope { task_id: TaskId::new(task), status: ReplyStatus::Ok, payload: Bytes::new() },
            },
        ),
        Op::Cancel(task, force) => step(state, Event::Cancel { task_id: TaskId::new(task), force }),
    }
}

proptest::proptest! {
    /// P1: a daemon is never left idle while the queue is non-empty. We
    /// can't observe `step`'s private idle-count directly from outside the
    /// crate, but the public counters (`connection_count - executing_count`
    /// gives idle count) let us check the same invariant.
    #[test]
    fn p1_no_idle_daemon_while_queue_non_empty(ops in proptest::collection::vec(op_strategy(), 0..40)) {
        let mut state = DispatcherState::new(false);
        for op in &ops {
            let _ = apply(&mut state, op);
            let idle = state.connection_count() - state.executing_count();
            if state.awaiting_count() > 0 {
                proptest::prop_assert_eq!(idle, 0);
            }
        }
    }

    /// P6 (loose form): completed count only ever increases, and by
    /// exactly one per `DaemonReply` event actually accepted.
    #[test]
    fn completed_count_is_monotonically_non_decreasing(ops in proptest::collection::vec(op_strategy(), 0..40)) {
        let mut state = DispatcherState::new(false);
        let mut last = 0u64;
        for op in &ops {
            let _ = apply(&mut state, op);
            let now = state.completed_count();
            proptest::prop_assert!(now >= last);
            last = now;
        }
    }
}

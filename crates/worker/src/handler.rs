// SPDX-License-Identifier: MIT

//! The pluggable task handler a daemon executes (SPEC_FULL.md §5.5).
//!
//! Kept synchronous-in-spirit (no `async_trait`): a handler runs CPU-bound
//! user work, so the daemon runs it via `spawn_blocking` rather than
//! requiring handlers to be `async fn` themselves.

use bytes::Bytes;
use mrd_core::{DaemonRng, TaskResult};

/// Executes one task's payload, producing a terminal result.
///
/// Implementations should not panic on user errors — wrap them into
/// [`TaskResult::UserError`] instead, so one bad task never takes its
/// daemon down (spec.md §3: error kinds 4-7 are terminal values, not
/// process aborts).
///
/// `rng` is this daemon's own RNG stream (spec.md §4.4), threaded through
/// by value since only one task runs at a time per daemon; a handler that
/// needs randomness draws from it instead of seeding its own generator.
pub trait TaskHandler: Send + Sync + 'static {
    fn handle(&self, payload: Bytes, rng: &mut DaemonRng) -> TaskResult;
}

/// A handler built from a plain closure, for callers that don't need
/// any persistent state between tasks.
pub struct FnHandler<F>(pub F);

impl<F> TaskHandler for FnHandler<F>
where
    F: Fn(Bytes, &mut DaemonRng) -> TaskResult + Send + Sync + 'static,
{
    fn handle(&self, payload: Bytes, rng: &mut DaemonRng) -> TaskResult {
        (self.0)(payload, rng)
    }
}

/// Echoes the payload back as a successful result. Useful for the
/// two-daemon smoke test and as the worker binary's default handler.
pub struct EchoHandler;

impl TaskHandler for EchoHandler {
    fn handle(&self, payload: Bytes, _rng: &mut DaemonRng) -> TaskResult {
        TaskResult::Ok(payload)
    }
}

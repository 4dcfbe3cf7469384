// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mrd-core: shared data model for the Meridian task-execution framework.
//!
//! This crate owns the types every other crate agrees on: task and profile
//! identifiers, the task lifecycle state machine, the error taxonomy, the
//! RNG stream generator handed to daemons at spawn time, and the daemon
//! option set forwarded across the wire.

pub mod clock;
pub mod daemon;
pub mod error;
pub mod ids;
pub mod options;
pub mod profile;
pub mod queue;
pub mod rng;
pub mod task;
pub mod tls;

pub use clock::{Clock, FakeClock, SystemClock};
pub use daemon::{DaemonHandle, DaemonState};
pub use error::{MrdError, ProtocolViolation, CONNECTION_RESET_CODE};
pub use ids::{PipeId, ProfileName, TaskId, TaskIdCounter};
pub use options::DaemonOptions;
pub use profile::{DispatcherMode, ProfileConfig};
pub use queue::TaskQueue;
pub use rng::{DaemonRng, RngCursor, RngSeed};
pub use task::{Task, TaskResult, TaskStatus};
pub use tls::TlsMaterial;

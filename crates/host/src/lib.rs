// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mrd-host: the process-wide profile registry, daemon launcher, and
//! direct-mode router (spec.md §4.1, §4.4, §4.5).

pub mod client;
pub mod launcher;
pub mod lifecycle;
pub mod registry;
pub mod router;

pub use client::ProfileClient;
pub use launcher::{launch_daemons, sibling_binary, LaunchMode};
pub use lifecycle::{configure, reset, status, submit, ProfileStatus, QueueStats};
pub use registry::{ProfileHandle, ProfileRegistry, ProfileSocket};
pub use router::DirectRouter;

// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mrd-wire: task framing and the control channel protocol
//! (SPEC_FULL.md §5.2, spec.md §4.2/§6).
//!
//! Wire format: 4-byte big-endian length prefix + JSON payload, mirroring
//! the teacher's `oj-wire`/`oj-daemon::protocol::wire` framing exactly.

pub mod control;
pub mod envelope;
pub mod exit;
pub mod extension;
pub mod frame;

pub use control::{ControlReply, ControlRequest, Handshake, HandshakeReply, RosterEvent};
pub use envelope::{ReplyEnvelope, ReplyStatus, TaskEnvelope};
pub use exit::{is_exit_payload, EXIT_PAYLOAD, EXIT_PAYLOAD_LEN};
pub use extension::{ClassExtension, ExtensionRegistry};
pub use frame::{decode, encode, read_message, write_message};

#[cfg(test)]
mod frame_tests;

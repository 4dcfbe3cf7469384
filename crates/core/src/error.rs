// SPDX-License-Identifier: MIT

//! Error taxonomy (SPEC_FULL.md §8 / spec.md §7).
//!
//! `MrdError` covers the synchronous, profile-level error kinds (1-3 of the
//! taxonomy): configuration errors, launch errors, and transport errors.
//! Per-task outcomes (kinds 4-7: user error, connection reset, cancellation,
//! timeout) are not propagated as `Result::Err` — they are terminal
//! [`crate::TaskResult`] values delivered to the task's completion signal, so
//! that a failing task never aborts its siblings (SPEC_FULL.md §8
//! "Propagation policy").

use crate::ids::ProfileName;
use thiserror::Error;

/// The connection-reset error code named explicitly in spec.md §7.5.
pub const CONNECTION_RESET_CODE: u8 = 19;

#[derive(Debug, Error)]
pub enum MrdError {
    #[error("profile `{0}` is already configured")]
    AlreadyConfigured(ProfileName),

    #[error("profile `{0}` is not configured")]
    UnknownProfile(ProfileName),

    #[error("invalid dispatcher argument: {0}")]
    InvalidConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("nothing to do: n <= 0 and no dial-in url supplied")]
    NothingToDo,

    #[error("{connected} of {expected} daemons did not dial in before the sync timeout")]
    SyncDaemons { expected: usize, connected: usize },

    #[error("dispatcher did not complete its handshake before the sync timeout")]
    SyncDispatcher,

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("tls error: {0}")]
    Tls(String),

    #[error("wire protocol error: {0}")]
    Protocol(#[from] ProtocolViolation),

    #[error("operation timed out")]
    Timeout,
}

/// A malformed frame or unexpected message on the wire — distinct from
/// [`MrdError::Transport`] (a socket-level I/O failure) because corpus
/// crates keep protocol errors and I/O errors in separate variants
/// (`oj-daemon::protocol::ProtocolError` vs `ConnectionError::Internal`).
#[derive(Debug, Error)]
pub enum ProtocolViolation {
    #[error("frame exceeded the maximum length")]
    FrameTooLarge,
    #[error("connection closed before a full frame was read")]
    ConnectionClosed,
    #[error("malformed envelope: {0}")]
    Malformed(String),
}

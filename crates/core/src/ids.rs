// SPDX-License-Identifier: MIT

//! Identifier types shared across the workspace.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Name of a logical worker pool (spec.md §3 "Profile").
///
/// Cheap to clone (an `Arc<str>`) since it is used as a hash-map key in the
/// hot path of every dispatcher tick.
#[derive(Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ProfileName(Arc<str>);

impl ProfileName {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ProfileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProfileName({:?})", self.0)
    }
}

impl From<&str> for ProfileName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ProfileName {
    fn from(s: String) -> Self {
        Self::new(s.as_str())
    }
}

/// Task identifier. Monotonically increasing per-profile, 32-bit wrapping
/// (spec.md §3: "equality is needed within the outstanding window", so
/// wraparound is acceptable as long as the in-flight window never holds
/// `u32::MAX` live tasks at once).
#[derive(Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub u32);

impl TaskId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskId({})", self.0)
    }
}

/// Monotonically increasing counter producing [`TaskId`]s for one profile.
///
/// Starts at 1 so that `0` stays reserved for control-frame task ids
/// (spec.md §4.2 control frame table: `(0, 0)` is the status query).
#[derive(Debug, Default)]
pub struct TaskIdCounter(u32);

impl TaskIdCounter {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn next(&mut self) -> TaskId {
        self.0 = self.0.wrapping_add(1);
        if self.0 == 0 {
            self.0 = 1;
        }
        TaskId(self.0)
    }
}

/// Opaque handle to a daemon's transport connection, scoped to one profile's
/// roster. Distinct from [`crate::daemon::DaemonHandle`]'s optional stable
/// `daemon_id` (spec.md §3: "optional stable integer daemon-id supplied at
/// dial-in").
#[derive(Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct PipeId(pub u64);

impl fmt::Debug for PipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PipeId({})", self.0)
    }
}

// SPDX-License-Identifier: MIT

//! Daemon configuration options forwarded at spawn time (spec.md §6).
//!
//! SPEC_FULL.md §7/§10 resolves the "exact set of options silently
//! dropped" open question by making the full set explicit here and
//! rejecting anything else at deserialize time, rather than filtering
//! unknown keys silently.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonOptions {
    /// Dial without blocking on connection success.
    #[serde(default)]
    pub asyncdial: bool,
    /// Exit on pipe-drop; if false, survive host shutdown.
    #[serde(default = "default_autoexit")]
    pub autoexit: bool,
    /// Free per-task state between tasks.
    #[serde(default)]
    pub cleanup: bool,
    /// Redirect child stdout/stderr to host's.
    #[serde(default)]
    pub output: bool,
    /// Exit after handling this many tasks. `None` = unbounded.
    #[serde(default)]
    pub maxtasks: Option<u64>,
    /// Exit after this idle duration. `None` = unbounded.
    #[serde(default, with = "duration_ms_opt")]
    pub idletime: Option<Duration>,
    /// Exit after this wall-clock duration. `None` = unbounded.
    #[serde(default, with = "duration_ms_opt")]
    pub walltime: Option<Duration>,
}

fn default_autoexit() -> bool {
    true
}

impl Default for DaemonOptions {
    fn default() -> Self {
        Self {
            asyncdial: false,
            autoexit: true,
            cleanup: false,
            output: false,
            maxtasks: None,
            idletime: None,
            walltime: None,
        }
    }
}

mod duration_ms_opt {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(v: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        v.map(|d| d.as_millis() as u64).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}

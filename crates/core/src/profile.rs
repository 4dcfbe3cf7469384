// SPDX-License-Identifier: MIT

//! Profile configuration (spec.md §3 "Profile", §4.1 "configure").

use crate::options::DaemonOptions;
use serde::{Deserialize, Serialize};

/// How the profile mediates between host and daemons (spec.md §4.3,
/// SPEC_FULL.md §9 Open Questions: `process` and `thread` are genuinely
/// different here).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatcherMode {
    /// No dispatcher: the profile socket is a request socket and the
    /// transport's round-robin fan-out load-balances across daemons
    /// (spec.md §4.5).
    None,
    /// Dispatcher runs as a separate OS process.
    Process,
    /// Dispatcher runs as a task within the host's own tokio runtime,
    /// sharing the host's address space.
    Thread,
}

impl DispatcherMode {
    pub fn is_enabled(self) -> bool {
        !matches!(self, DispatcherMode::None)
    }
}

/// Parameters supplied to `configure()` (spec.md §4.1).
#[derive(Debug, Clone)]
pub struct ProfileConfig {
    /// Advisory daemon count; actual pool size is the set of connected
    /// pipes (SPEC_FULL.md §10 "Auto-resizing pool").
    pub n: i64,
    /// Explicit dial-in URL. When absent, one is derived from an ephemeral
    /// local endpoint.
    pub url: Option<String>,
    pub dispatcher: DispatcherMode,
    /// Requeue a task whose executing daemon disconnected, rather than
    /// failing it with `ConnectionReset` (spec.md §4.3.4).
    pub retry: bool,
    pub options: DaemonOptions,
    /// TLS requested (scheme `tls+tcp://`, or explicitly set here).
    pub tls: bool,
}

impl ProfileConfig {
    /// Validate arguments per spec.md §4.1 error table, before any state is
    /// allocated.
    pub fn validate(&self) -> Result<(), crate::error::MrdError> {
        if self.n <= 0 && self.url.is_none() {
            return Err(crate::error::MrdError::NothingToDo);
        }
        Ok(())
    }
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            n: 1,
            url: None,
            dispatcher: DispatcherMode::Process,
            retry: false,
            options: DaemonOptions::default(),
            tls: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_n_with_no_url_is_nothing_to_do() {
        let cfg = ProfileConfig { n: 0, url: None, ..ProfileConfig::default() };
        assert!(matches!(cfg.validate(), Err(crate::error::MrdError::NothingToDo)));
    }

    #[test]
    fn zero_n_with_url_is_allowed_for_remote_dial_in() {
        let cfg =
            ProfileConfig { n: 0, url: Some("tcp://[::1]:0".into()), ..ProfileConfig::default() };
        assert!(cfg.validate().is_ok());
    }
}

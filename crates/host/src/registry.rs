// SPDX-License-Identifier: MIT

//! The process-wide profile registry (spec.md §4.1 "Profile").
//!
//! Mutated under an async mutex, not `parking_lot`'s, because `configure`
//! and `reset` (SPEC_FULL.md §6) hold the lock across real socket binds,
//! child spawns, and a handshake round trip — work a sync mutex guard
//! cannot soundly span. `status`/`submit` only borrow the lock long enough
//! to clone a profile's socket handle, so concurrent task submissions
//! across profiles never wait on each other.

use crate::client::ProfileClient;
use crate::router::DirectRouter;
use mrd_core::{MrdError, ProfileConfig, ProfileName, RngCursor, RngSeed, TaskId};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::process::Child;
use tokio::sync::{Mutex, Notify};

/// How a profile's task traffic actually reaches its daemons.
pub enum ProfileSocket {
    /// Routed through a dispatcher child process.
    Dispatcher(Arc<ProfileClient>),
    /// Fanned out directly by the host, no dispatcher in between.
    Direct(Arc<DirectRouter>),
}

/// Everything the host keeps for one configured profile.
pub struct ProfileHandle {
    pub config: ProfileConfig,
    /// The daemon dial-in URL: the dispatcher's daemon-facing socket in
    /// dispatcher mode, or the profile socket itself in direct mode.
    pub url: String,
    pub rng_seeds: Vec<RngSeed>,
    pub msgid: u32,
    pub socket: ProfileSocket,
    pub dispatcher_child: Option<Child>,
    pub daemon_children: Vec<Child>,
    /// Notified whenever a new daemon pipe is added, so a synchronous
    /// launch can block on actual dial-in (spec.md §4.4).
    pub wake: Arc<Notify>,
}

/// Process-wide map of configured profiles plus the shared RNG cursor
/// (spec.md §5: "RNG-stream state is private to each profile but derived
/// from the process-wide ... cursor advanced atomically").
pub struct ProfileRegistry {
    profiles: HashMap<ProfileName, ProfileHandle>,
    rng_cursor: RngCursor,
}

static REGISTRY: Lazy<Arc<Mutex<ProfileRegistry>>> =
    Lazy::new(|| Arc::new(Mutex::new(ProfileRegistry::new())));

/// Handle to the process-wide registry.
pub fn global() -> Arc<Mutex<ProfileRegistry>> {
    Arc::clone(&REGISTRY)
}

impl ProfileRegistry {
    fn new() -> Self {
        Self { profiles: HashMap::new(), rng_cursor: RngCursor::new() }
    }

    pub fn contains(&self, name: &ProfileName) -> bool {
        self.profiles.contains_key(name)
    }

    /// Draw `n` fresh seeds from the process-wide cursor. Only meaningful
    /// while holding the registry lock across a `configure` call, so two
    /// profiles configured concurrently never collide on a seed.
    pub fn take_seeds(&mut self, n: usize) -> Vec<RngSeed> {
        self.rng_cursor.take(n)
    }

    pub fn insert(&mut self, name: ProfileName, handle: ProfileHandle) {
        self.profiles.insert(name, handle);
    }

    pub fn status(&self, name: &ProfileName) -> Result<&ProfileHandle, MrdError> {
        self.profiles.get(name).ok_or_else(|| MrdError::UnknownProfile(name.clone()))
    }

    pub fn status_mut(&mut self, name: &ProfileName) -> Result<&mut ProfileHandle, MrdError> {
        self.profiles.get_mut(name).ok_or_else(|| MrdError::UnknownProfile(name.clone()))
    }

    /// Remove a profile's bookkeeping from the map. Callers are
    /// responsible for tearing down its sockets and children first
    /// (`lifecycle::reset` does this) — by the time this runs, `handle`
    /// is only held for its RNG seeds and caller-side logging.
    pub fn remove(&mut self, name: &ProfileName) -> Result<ProfileHandle, MrdError> {
        self.profiles.remove(name).ok_or_else(|| MrdError::UnknownProfile(name.clone()))
    }

    /// Draw the next monotonically increasing task id from a profile's
    /// `msgid` counter (spec.md §4.2: "the host's `msgid` counter
    /// increments monotonically"). Never hands out `0` — that id is
    /// reserved for control frames.
    pub fn next_task_id(&mut self, name: &ProfileName) -> Result<TaskId, MrdError> {
        let handle = self.status_mut(name)?;
        handle.msgid = handle.msgid.wrapping_add(1);
        if handle.msgid == 0 {
            handle.msgid = 1;
        }
        Ok(TaskId::new(handle.msgid))
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(seeds: Vec<RngSeed>) -> ProfileHandle {
        ProfileHandle {
            config: ProfileConfig::default(),
            url: "tcp://127.0.0.1:0".into(),
            rng_seeds: seeds,
            msgid: 0,
            socket: ProfileSocket::Direct(Arc::new(DirectRouter::empty())),
            dispatcher_child: None,
            daemon_children: Vec::new(),
            wake: Arc::new(Notify::new()),
        }
    }

    #[test]
    fn configuring_the_same_profile_twice_is_rejected() {
        let mut registry = ProfileRegistry::new();
        let name = ProfileName::new("default");
        assert!(!registry.contains(&name));
        registry.insert(name.clone(), handle(Vec::new()));
        assert!(registry.contains(&name));
    }

    #[test]
    fn reset_then_configure_generates_disjoint_rng_seeds() {
        let mut registry = ProfileRegistry::new();
        let name = ProfileName::new("default");
        let first_seeds = registry.take_seeds(2);
        registry.insert(name.clone(), handle(first_seeds.clone()));
        registry.remove(&name).expect("resets");
        let second_seeds = registry.take_seeds(2);
        assert_ne!(first_seeds[0].0, second_seeds[0].0);
    }

    #[test]
    fn status_of_unknown_profile_is_an_error() {
        let registry = ProfileRegistry::new();
        let err = registry.status(&ProfileName::new("missing")).expect_err("must fail");
        assert!(matches!(err, MrdError::UnknownProfile(_)));
    }

    #[test]
    fn next_task_id_never_hands_out_zero_even_after_wraparound() {
        let mut registry = ProfileRegistry::new();
        let name = ProfileName::new("default");
        let mut h = handle(Vec::new());
        h.msgid = u32::MAX;
        registry.insert(name.clone(), h);
        let id = registry.next_task_id(&name).expect("exists");
        assert_eq!(id.0, 1);
    }
}

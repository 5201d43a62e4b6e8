//! Process-wide mutable state.
//!
//! Each resource is its own guarded cell shared through `Arc`. Components get
//! access through the narrow capability traits below instead of the concrete
//! types, so the relay pipeline can only check the mute window while the bot
//! can change it.

mod connectivity;
mod dedup;
mod mute;

pub use connectivity::{ConnectivityState, ConnectivityTracker, Dependency};
pub use dedup::{DedupStore, MAX_SIZE};
pub use mute::MuteTracker;

use std::sync::Arc;

/// Read side of the mute window.
pub trait MuteGate: Send + Sync {
    fn is_muted(&self) -> bool;
}

/// Full control over the mute window, used by operator commands.
pub trait MuteControl: MuteGate {
    fn mute(&self, minutes: f64);
    fn unmute(&self);
    fn status_text(&self) -> String;
}

/// Dedup check-and-mark used by the relay pipeline.
pub trait DedupGate: Send + Sync {
    fn was_notified(&self, id: &str) -> bool;
    /// Atomically mark `id`; `true` if this call inserted it.
    fn claim(&self, id: &str) -> bool;
}

/// Connectivity writes and status lines.
pub trait ConnectivityReporter: Send + Sync {
    fn set_state(&self, dependency: Dependency, up: bool) -> bool;
    fn status_text(&self, dependency: Dependency) -> String;
}

impl MuteGate for MuteTracker {
    fn is_muted(&self) -> bool {
        MuteTracker::is_muted(self)
    }
}

impl MuteControl for MuteTracker {
    fn mute(&self, minutes: f64) {
        MuteTracker::mute(self, minutes)
    }

    fn unmute(&self) {
        MuteTracker::unmute(self)
    }

    fn status_text(&self) -> String {
        MuteTracker::status_text(self)
    }
}

impl DedupGate for DedupStore {
    fn was_notified(&self, id: &str) -> bool {
        DedupStore::was_notified(self, id)
    }

    fn claim(&self, id: &str) -> bool {
        DedupStore::claim(self, id)
    }
}

impl ConnectivityReporter for ConnectivityTracker {
    fn set_state(&self, dependency: Dependency, up: bool) -> bool {
        ConnectivityTracker::set_state(self, dependency, up)
    }

    fn status_text(&self, dependency: Dependency) -> String {
        ConnectivityTracker::status_text(self, dependency)
    }
}

/// The shared state cells, created once in `main`.
#[derive(Debug, Clone, Default)]
pub struct SharedState {
    pub mute: Arc<MuteTracker>,
    pub dedup: Arc<DedupStore>,
    pub connectivity: Arc<ConnectivityTracker>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }
}

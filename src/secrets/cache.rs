//! In-memory cache of the three tolerated secret versions plus a blacklist
//! of values already confirmed invalid.
//!
//! The whole state is wiped on a fixed interval by a background janitor.
//! Nothing here talks to the store; the authorizer decides when to refresh.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::types::SecretString;
use crate::utils::PeriodicTask;

/// Default interval between wholesale clears.
pub const DEFAULT_CLEAR_INTERVAL: Duration = Duration::from_secs(20 * 60);

/// Callback invoked after every janitor clear.
pub type CleanupHook = Box<dyn Fn() + Send + Sync + 'static>;

/// One cached secret version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretSnapshot {
    pub value: SecretString,
    /// When the value was last read from the store. `None` means the slot
    /// holds nothing.
    pub fetched_at: Option<DateTime<Utc>>,
}

impl SecretSnapshot {
    pub fn new(value: impl Into<SecretString>, fetched_at: DateTime<Utc>) -> Self {
        Self { value: value.into(), fetched_at: Some(fetched_at) }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty() && self.fetched_at.is_none()
    }

    /// Age relative to `now`. Timestamps in the future count as age zero.
    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.fetched_at.map(|t| (now - t).to_std().unwrap_or(Duration::ZERO))
    }

    /// An empty snapshot is older than anything.
    pub fn older_than(&self, now: DateTime<Utc>, limit: Duration) -> bool {
        self.age(now).map_or(true, |age| age > limit)
    }

    /// An empty snapshot is younger than nothing.
    pub fn younger_than(&self, now: DateTime<Utc>, limit: Duration) -> bool {
        self.age(now).is_some_and(|age| age < limit)
    }

    /// True when the snapshot holds a value equal to `candidate`.
    pub fn matches(&self, candidate: &str) -> bool {
        !self.value.is_empty() && self.value.matches(candidate)
    }
}

/// Point-in-time copy of the cached slots.
#[derive(Debug, Clone, Default)]
pub struct CacheView {
    pub current: SecretSnapshot,
    pub previous: SecretSnapshot,
    pub pending: SecretSnapshot,
    /// True iff `current` holds something.
    pub found: bool,
}

#[derive(Default)]
struct CacheState {
    current: SecretSnapshot,
    previous: SecretSnapshot,
    pending: SecretSnapshot,
    blacklist: HashSet<String>,
}

/// Thread-safe cache shared between the authorizer and its janitor.
pub struct SecretCache {
    state: Mutex<CacheState>,
    janitor: PeriodicTask,
}

impl SecretCache {
    pub fn new(clear_interval: Duration) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            janitor: PeriodicTask::new("secret-cache-janitor", clear_interval),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_CLEAR_INTERVAL)
    }

    pub fn clear_interval(&self) -> Duration {
        self.janitor.period()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self) -> CacheView {
        let state = self.lock();
        CacheView {
            current: state.current.clone(),
            previous: state.previous.clone(),
            pending: state.pending.clone(),
            found: !state.current.is_empty(),
        }
    }

    /// Replace all three slots at once.
    pub fn set(&self, current: SecretSnapshot, previous: SecretSnapshot, pending: SecretSnapshot) {
        let mut state = self.lock();
        state.current = current;
        state.previous = previous;
        state.pending = pending;
    }

    pub fn blacklist(&self, value: &str) {
        self.lock().blacklist.insert(value.to_string());
    }

    pub fn is_blacklisted(&self, value: &str) -> bool {
        self.lock().blacklist.contains(value)
    }

    pub fn blacklist_len(&self) -> usize {
        self.lock().blacklist.len()
    }

    /// Reset every slot and the blacklist.
    pub fn clear(&self) {
        let mut state = self.lock();
        *state = CacheState::default();
        debug!("Secret cache cleared");
    }

    /// Start the janitor. It clears the cache every interval and once more
    /// when `shutdown` fires or [`stop`](Self::stop) is called.
    ///
    /// Returns `None` if the janitor is already running or was stopped.
    pub fn run(
        self: &Arc<Self>,
        shutdown: CancellationToken,
        on_cleanup: Option<CleanupHook>,
    ) -> Option<JoinHandle<()>> {
        let cache: Weak<Self> = Arc::downgrade(self);
        self.janitor.spawn(shutdown, move || {
            if let Some(cache) = cache.upgrade() {
                cache.clear();
            }
            if let Some(hook) = on_cleanup.as_ref() {
                hook();
            }
        })
    }

    /// Stop the janitor. Idempotent.
    pub fn stop(&self) {
        self.janitor.stop();
    }
}

impl Default for SecretCache {
    fn default() -> Self {
        Self::with_defaults()
    }
}

//! Tuning knobs for the cache store and the search debounce.

use std::time::Duration;

/// Default quiet period before a search keystroke becomes a query change.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(400);

/// Default retention of an unobserved entry before garbage collection.
pub const DEFAULT_CACHE_TIME: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// How long an entry with no subscribers survives `collect_garbage`.
    pub cache_time: Duration,
    /// Age after which a successful entry is treated as stale on the next
    /// subscription. `None` means entries only go stale through invalidation.
    pub stale_time: Option<Duration>,
    pub debounce_delay: Duration,
    /// Period of the background collector. `None` leaves collection to
    /// explicit `collect_garbage` calls.
    pub gc_interval: Option<Duration>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cache_time: DEFAULT_CACHE_TIME,
            stale_time: None,
            debounce_delay: DEFAULT_DEBOUNCE,
            gc_interval: None,
        }
    }
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_time(mut self, cache_time: Duration) -> Self {
        self.cache_time = cache_time;
        self
    }

    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }

    pub fn with_debounce(mut self, delay: Duration) -> Self {
        self.debounce_delay = delay;
        self
    }

    pub fn with_gc_interval(mut self, every: Duration) -> Self {
        self.gc_interval = Some(every);
        self
    }
}

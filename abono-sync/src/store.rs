//! Process-wide keyed cache of server-derived state.
//!
//! The store maps a [`QueryIdentity`] to a [`CacheEntry`] and fans entry
//! changes out to subscribers. It owns three guarantees:
//!
//! - one in-flight fetch per identity; concurrent fetches share its outcome
//! - per-identity notifications are delivered in subscription order and a
//!   notification pass is never interleaved with another one
//! - invalidation marks entries stale without dropping their payload
//!
//! All shared state sits behind a single mutex. The lock is never held
//! across an await point or while a listener runs; store calls made from a
//! listener are applied immediately but their notifications are queued and
//! delivered once the current pass finishes.

use crate::config::SyncConfig;
use crate::identity::{IdentityPrefix, QueryIdentity};
use abono_core::{ApiError, Timestamp};
use chrono::Utc;
use futures_util::future::{join_all, BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Type-erased cached value.
pub type Payload = Arc<dyn Any + Send + Sync>;

pub type FetchFuture = BoxFuture<'static, Result<Payload, ApiError>>;

/// Produces a fresh request for one identity each time it is called.
pub type Fetcher = Arc<dyn Fn() -> FetchFuture + Send + Sync>;

/// Handle on an in-flight fetch. Every clone resolves to the same outcome.
pub type InFlight = Shared<FetchFuture>;

type Listener = Arc<dyn Fn(&CacheEntry) + Send + Sync>;

/// Erase a typed fetch function into a [`Fetcher`].
pub fn erase_fetcher<T, F, Fut>(fetch: F) -> Fetcher
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
{
    Arc::new(move || {
        fetch()
            .map(|outcome| outcome.map(|value| Arc::new(value) as Payload))
            .boxed()
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// Snapshot of one cache entry as seen by a subscriber.
#[derive(Clone)]
pub struct CacheEntry {
    pub identity: QueryIdentity,
    pub status: QueryStatus,
    pub payload: Option<Payload>,
    pub error: Option<ApiError>,
    pub last_fetched_at: Option<Timestamp>,
    pub is_stale: bool,
    pub subscriber_count: usize,
}

impl CacheEntry {
    fn new(identity: QueryIdentity) -> Self {
        Self {
            identity,
            status: QueryStatus::Idle,
            payload: None,
            error: None,
            last_fetched_at: None,
            is_stale: false,
            subscriber_count: 0,
        }
    }

    /// The payload downcast to `T`, if present and of that type.
    pub fn data<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.payload
            .clone()
            .and_then(|payload| payload.downcast::<T>().ok())
    }

    pub fn has_data(&self) -> bool {
        self.payload.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    /// Whether a subscriber arriving now should trigger a fetch.
    pub fn needs_fetch(&self) -> bool {
        matches!(self.status, QueryStatus::Idle | QueryStatus::Error) || self.is_stale
    }

    fn older_than(&self, age: Duration) -> bool {
        if self.status != QueryStatus::Success {
            return false;
        }
        match (self.last_fetched_at, chrono::Duration::from_std(age)) {
            (Some(at), Ok(age)) => Utc::now().signed_duration_since(at) >= age,
            _ => false,
        }
    }
}

impl fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("identity", &self.identity.canonical())
            .field("status", &self.status)
            .field("has_data", &self.payload.is_some())
            .field("error", &self.error)
            .field("last_fetched_at", &self.last_fetched_at)
            .field("is_stale", &self.is_stale)
            .field("subscriber_count", &self.subscriber_count)
            .finish()
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Subscriptions that found fresh data.
    pub hits: u64,
    /// Subscriptions that found nothing usable.
    pub misses: u64,
    /// Fetches that joined an in-flight request instead of issuing one.
    pub coalesced: u64,
    pub network_fetches: u64,
    pub evictions: u64,
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Slot {
    entry: CacheEntry,
    listeners: Vec<(u64, Listener)>,
    /// Bumped by every invalidation. Fetches started in an older epoch may
    /// have been answered before the write that invalidated the entry.
    epoch: u64,
    /// Epoch the current payload was fetched in.
    data_epoch: u64,
    in_flight: Option<(u64, InFlight)>,
    fetcher: Option<Fetcher>,
    released_at: Option<Instant>,
}

impl Slot {
    fn new(identity: QueryIdentity) -> Self {
        Self {
            entry: CacheEntry::new(identity),
            listeners: Vec::new(),
            epoch: 0,
            data_epoch: 0,
            in_flight: None,
            fetcher: None,
            released_at: Some(Instant::now()),
        }
    }

    fn collectable(&self, cache_time: Duration) -> bool {
        self.entry.subscriber_count == 0
            && self.in_flight.is_none()
            && self
                .released_at
                .is_some_and(|released| released.elapsed() >= cache_time)
    }

    fn apply_result(&mut self, payload: Payload, epoch: u64) {
        self.data_epoch = epoch;
        let entry = &mut self.entry;
        entry.status = QueryStatus::Success;
        entry.payload = Some(payload);
        entry.error = None;
        entry.last_fetched_at = Some(Utc::now());
        entry.is_stale = epoch != self.epoch;
    }

    fn apply_error(&mut self, error: ApiError) {
        self.entry.status = QueryStatus::Error;
        self.entry.error = Some(error);
    }
}

enum Notice {
    All(QueryIdentity),
    One(QueryIdentity, u64),
}

#[derive(Default)]
struct Inner {
    slots: HashMap<QueryIdentity, Slot>,
    next_listener: u64,
    queue: VecDeque<Notice>,
    notifying: bool,
    stats: CacheStats,
}

impl Inner {
    fn slot_mut(&mut self, identity: &QueryIdentity) -> &mut Slot {
        self.slots
            .entry(identity.clone())
            .or_insert_with(|| Slot::new(identity.clone()))
    }

    fn resolve(&self, notice: &Notice) -> Option<(CacheEntry, Vec<Listener>)> {
        match notice {
            Notice::All(identity) => {
                let slot = self.slots.get(identity)?;
                let listeners = slot.listeners.iter().map(|(_, l)| l.clone()).collect();
                Some((slot.entry.clone(), listeners))
            }
            Notice::One(identity, id) => {
                let slot = self.slots.get(identity)?;
                let listener = slot
                    .listeners
                    .iter()
                    .find(|(candidate, _)| candidate == id)
                    .map(|(_, l)| l.clone())?;
                Some((slot.entry.clone(), vec![listener]))
            }
        }
    }
}

/// Resets the notifying flag if a listener unwinds mid-pass.
struct NotifyGuard<'a> {
    store: &'a CacheStore,
    finished: bool,
}

impl Drop for NotifyGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.store.lock().notifying = false;
        }
    }
}

/// Shared handle on the cache. Cloning is cheap; all clones see one store.
#[derive(Clone)]
pub struct CacheStore {
    inner: Arc<Mutex<Inner>>,
    config: Arc<SyncConfig>,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(SyncConfig::default())
    }
}

impl fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("entries", &self.len())
            .field("config", &self.config)
            .finish()
    }
}

impl CacheStore {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the entry for `identity`, if one exists.
    pub fn get(&self, identity: &QueryIdentity) -> Option<CacheEntry> {
        self.lock()
            .slots
            .get(identity)
            .map(|slot| slot.entry.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            entry_count: inner.slots.len() as u64,
            ..inner.stats.clone()
        }
    }

    /// Register `listener` for `identity`, creating an idle entry if needed.
    ///
    /// The current entry is delivered right away, then every later change.
    /// The returned token unsubscribes when dropped.
    pub fn subscribe<F>(&self, identity: &QueryIdentity, listener: F) -> Subscription
    where
        F: Fn(&CacheEntry) + Send + Sync + 'static,
    {
        let id = {
            let mut inner = self.lock();
            let id = inner.next_listener;
            inner.next_listener += 1;

            let stale_time = self.config.stale_time;
            let slot = inner.slot_mut(identity);
            slot.listeners.push((id, Arc::new(listener)));
            slot.entry.subscriber_count += 1;
            slot.released_at = None;
            if stale_time.is_some_and(|age| slot.entry.older_than(age)) {
                slot.entry.is_stale = true;
            }
            let hit = slot.entry.status == QueryStatus::Success && !slot.entry.is_stale;

            if hit {
                inner.stats.hits += 1;
            } else {
                inner.stats.misses += 1;
            }
            inner.queue.push_back(Notice::One(identity.clone(), id));
            id
        };
        self.drain();

        Subscription {
            store: self.clone(),
            identity: identity.clone(),
            id,
            active: true,
        }
    }

    fn unsubscribe(&self, identity: &QueryIdentity, id: u64) {
        let mut inner = self.lock();
        if let Some(slot) = inner.slots.get_mut(identity) {
            let before = slot.listeners.len();
            slot.listeners.retain(|(candidate, _)| *candidate != id);
            if slot.listeners.len() < before {
                slot.entry.subscriber_count = slot.entry.subscriber_count.saturating_sub(1);
                if slot.entry.subscriber_count == 0 {
                    slot.released_at = Some(Instant::now());
                }
            }
        }
    }

    /// Mark `identity` as loading. Any existing payload is kept.
    pub fn set_loading(&self, identity: &QueryIdentity) {
        self.update(identity, |slot| slot.entry.status = QueryStatus::Loading);
    }

    pub fn set_result(&self, identity: &QueryIdentity, payload: Payload) {
        self.update(identity, |slot| {
            let epoch = slot.epoch;
            slot.apply_result(payload, epoch);
        });
    }

    /// Record a failure. The last known-good payload is kept.
    pub fn set_error(&self, identity: &QueryIdentity, error: ApiError) {
        self.update(identity, |slot| slot.apply_error(error));
    }

    fn update(&self, identity: &QueryIdentity, apply: impl FnOnce(&mut Slot)) {
        {
            let mut inner = self.lock();
            apply(inner.slot_mut(identity));
            inner.queue.push_back(Notice::All(identity.clone()));
        }
        self.drain();
    }

    /// Fetch `identity` with `fetcher`, or join the fetch already in flight.
    ///
    /// Only a fetch started since the entry's last invalidation is joined;
    /// an older one gets superseded by a new request. The fetcher is
    /// remembered so the entry can be refetched after an invalidation. The
    /// returned future is lazy: poll it (or spawn it) to drive the request.
    pub fn fetch(&self, identity: &QueryIdentity, fetcher: Fetcher) -> InFlight {
        let shared = {
            let mut inner = self.lock();
            let slot = inner.slot_mut(identity);
            slot.fetcher = Some(fetcher.clone());
            let epoch = slot.epoch;
            let current = slot
                .in_flight
                .as_ref()
                .filter(|(started, _)| *started == epoch)
                .map(|(_, in_flight)| in_flight.clone());

            if let Some(in_flight) = current {
                inner.stats.coalesced += 1;
                debug!(identity = %identity, "Joined in-flight fetch");
                return in_flight;
            }

            let store = self.clone();
            let key = identity.clone();
            let shared = async move {
                let outcome = fetcher().await;
                store.complete(&key, epoch, &outcome);
                outcome
            }
            .boxed()
            .shared();

            let slot = inner.slot_mut(identity);
            if slot.in_flight.is_some() {
                debug!(identity = %identity, "Superseded fetch started before invalidation");
            }
            slot.in_flight = Some((epoch, shared.clone()));
            slot.entry.status = QueryStatus::Loading;
            inner.stats.network_fetches += 1;
            inner.queue.push_back(Notice::All(identity.clone()));
            shared
        };
        self.drain();
        shared
    }

    fn complete(&self, identity: &QueryIdentity, epoch: u64, outcome: &Result<Payload, ApiError>) {
        {
            let mut inner = self.lock();
            let Some(slot) = inner.slots.get_mut(identity) else {
                return;
            };
            if slot.in_flight.as_ref().is_some_and(|(started, _)| *started == epoch) {
                slot.in_flight = None;
            }
            // A newer request is running or has already landed.
            let superseded = epoch != slot.epoch
                && (slot.in_flight.is_some() || epoch < slot.data_epoch);
            if superseded {
                debug!(identity = %identity, "Dropped result of superseded fetch");
                return;
            }
            match outcome {
                Ok(payload) => {
                    debug!(identity = %identity, "Fetch succeeded");
                    // Answered before the last invalidation: stays stale.
                    slot.apply_result(payload.clone(), epoch);
                }
                Err(error) => {
                    warn!(identity = %identity, error = %error, "Fetch failed");
                    slot.apply_error(error.clone());
                }
            }
            inner.queue.push_back(Notice::All(identity.clone()));
        }
        self.drain();
    }

    /// Refetch `identity` with its registered fetcher.
    ///
    /// Returns `None` when the identity was never fetched.
    pub async fn refetch(&self, identity: &QueryIdentity) -> Option<Result<Payload, ApiError>> {
        let fetcher = self
            .lock()
            .slots
            .get(identity)
            .and_then(|slot| slot.fetcher.clone())?;
        Some(self.fetch(identity, fetcher).await)
    }

    /// Mark every entry matching `prefix` stale, keeping payloads.
    ///
    /// Returns the matched identities that currently have subscribers, in
    /// canonical order. Unobserved entries refetch on their next
    /// subscription instead.
    pub fn invalidate(&self, prefix: &IdentityPrefix) -> Vec<QueryIdentity> {
        let subscribed = {
            let mut inner = self.lock();
            let mut matched = Vec::new();
            let mut subscribed = Vec::new();
            for (identity, slot) in inner.slots.iter_mut() {
                if prefix.matches(identity) {
                    slot.entry.is_stale = true;
                    slot.epoch += 1;
                    matched.push(identity.clone());
                    if slot.entry.subscriber_count > 0 {
                        subscribed.push(identity.clone());
                    }
                }
            }
            matched.sort();
            subscribed.sort();
            debug!(
                prefix = %prefix,
                matched = matched.len(),
                subscribed = subscribed.len(),
                "Invalidated cache entries"
            );
            inner
                .queue
                .extend(matched.into_iter().map(Notice::All));
            subscribed
        };
        self.drain();
        subscribed
    }

    /// Invalidate every prefix, then refetch the subscribed identities
    /// concurrently. Refetch failures stay on their entries.
    pub async fn invalidate_and_refetch(&self, prefixes: &[IdentityPrefix]) -> Vec<QueryIdentity> {
        let mut targets: Vec<QueryIdentity> = Vec::new();
        for prefix in prefixes {
            for identity in self.invalidate(prefix) {
                if !targets.contains(&identity) {
                    targets.push(identity);
                }
            }
        }
        join_all(targets.iter().map(|identity| self.refetch(identity))).await;
        targets
    }

    /// Evict entries nobody has observed for at least `cache_time`.
    pub fn collect_garbage(&self) -> usize {
        let cache_time = self.config.cache_time;
        let mut inner = self.lock();
        let before = inner.slots.len();
        inner.slots.retain(|_, slot| !slot.collectable(cache_time));
        let evicted = before - inner.slots.len();
        inner.stats.evictions += evicted as u64;
        if evicted > 0 {
            debug!(evicted, "Collected unobserved cache entries");
        }
        evicted
    }

    /// Sweep unobserved entries every `gc_interval`, when one is set.
    ///
    /// The task only keeps a weak handle on the store and stops once every
    /// clone has been dropped. Requires a Tokio runtime.
    pub fn spawn_collector(&self) -> Option<JoinHandle<()>> {
        let every = self.config.gc_interval.filter(|every| !every.is_zero())?;
        let inner = Arc::downgrade(&self.inner);
        let config = self.config.clone();

        Some(tokio::spawn(async move {
            let mut ticks = interval(every);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            debug!(interval_ms = every.as_millis() as u64, "Cache collector started");
            loop {
                ticks.tick().await;
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                let store = CacheStore {
                    inner,
                    config: config.clone(),
                };
                store.collect_garbage();
            }
            debug!("Cache collector stopped");
        }))
    }

    fn drain(&self) {
        {
            let mut inner = self.lock();
            if inner.notifying {
                return;
            }
            inner.notifying = true;
        }
        let mut guard = NotifyGuard {
            store: self,
            finished: false,
        };

        loop {
            let next = {
                let mut inner = self.lock();
                match inner.queue.pop_front() {
                    Some(notice) => inner.resolve(&notice),
                    None => {
                        inner.notifying = false;
                        guard.finished = true;
                        return;
                    }
                }
            };
            if let Some((entry, listeners)) = next {
                for listener in listeners {
                    listener(&entry);
                }
            }
        }
    }
}

/// Live registration of a listener. Unsubscribes on drop.
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription {
    store: CacheStore,
    identity: QueryIdentity,
    id: u64,
    active: bool,
}

impl Subscription {
    pub fn identity(&self) -> &QueryIdentity {
        &self.identity
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.active {
            self.active = false;
            self.store.unsubscribe(&self.identity, self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("identity", &self.identity.canonical())
            .field("id", &self.id)
            .finish()
    }
}

//! Per-view query bindings.
//!
//! A [`QueryBinder`] ties one view to one query identity at a time. It
//! subscribes to the store, fetches when the entry needs it, and publishes a
//! typed [`QueryView`] over a `watch` channel. When the identity changes
//! (next page, new filter) the previous data stays visible, flagged as a
//! placeholder, until the new identity resolves.

use crate::identity::QueryIdentity;
use crate::store::{erase_fetcher, CacheEntry, CacheStore, Fetcher, QueryStatus, Subscription};
use abono_core::{ApiError, ApiResult, Timestamp};
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

/// What to bind: an identity, how to fetch it, and whether fetching is
/// allowed yet.
pub struct QuerySpec<T> {
    identity: QueryIdentity,
    fetcher: Fetcher,
    enabled: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> QuerySpec<T> {
    pub fn new<F, Fut>(identity: QueryIdentity, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        Self {
            identity,
            fetcher: erase_fetcher(fetch),
            enabled: true,
            _marker: PhantomData,
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl<T> QuerySpec<T> {
    pub fn identity(&self) -> &QueryIdentity {
        &self.identity
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl<T> Clone for QuerySpec<T> {
    fn clone(&self) -> Self {
        Self {
            identity: self.identity.clone(),
            fetcher: self.fetcher.clone(),
            enabled: self.enabled,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for QuerySpec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySpec")
            .field("identity", &self.identity.canonical())
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Typed snapshot of a bound query.
#[derive(Debug)]
pub struct QueryView<T> {
    pub status: QueryStatus,
    pub data: Option<Arc<T>>,
    pub error: Option<ApiError>,
    pub is_stale: bool,
    /// `data` belongs to the previously bound identity.
    pub is_placeholder: bool,
    pub last_fetched_at: Option<Timestamp>,
}

impl<T> QueryView<T> {
    fn idle() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            is_stale: false,
            is_placeholder: false,
            last_fetched_at: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.status == QueryStatus::Idle
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    /// Loading with nothing to show yet.
    pub fn is_first_load(&self) -> bool {
        self.is_loading() && self.data.is_none()
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_deref()
    }
}

impl<T> Clone for QueryView<T> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            is_stale: self.is_stale,
            is_placeholder: self.is_placeholder,
            last_fetched_at: self.last_fetched_at,
        }
    }
}

struct BindState<T> {
    generation: u64,
    placeholder: Option<Arc<T>>,
}

/// Live binding of one view to the cache.
///
/// Must be created and driven from within a Tokio runtime: fetches are
/// spawned so that dropping a binder never aborts a request other views
/// may be waiting on.
pub struct QueryBinder<T> {
    store: CacheStore,
    spec: QuerySpec<T>,
    state: Arc<Mutex<BindState<T>>>,
    sender: Arc<watch::Sender<QueryView<T>>>,
    receiver: watch::Receiver<QueryView<T>>,
    subscription: Option<Subscription>,
}

impl<T: Send + Sync + 'static> QueryBinder<T> {
    /// Bind `spec` and fetch if the entry is idle, stale or errored.
    pub fn mount(store: CacheStore, spec: QuerySpec<T>) -> Self {
        let (sender, receiver) = watch::channel(QueryView::idle());
        let mut binder = Self {
            store,
            spec,
            state: Arc::new(Mutex::new(BindState {
                generation: 0,
                placeholder: None,
            })),
            sender: Arc::new(sender),
            receiver,
            subscription: None,
        };
        binder.bind(None);
        binder
    }

    /// Switch to a new spec.
    ///
    /// Same identity: only the enabled flag and fetcher are updated, and a
    /// fetch starts if the query just became enabled. New identity: the
    /// current data becomes the placeholder and the binding moves over.
    pub fn set_query(&mut self, spec: QuerySpec<T>) {
        if spec.identity == self.spec.identity {
            let was_enabled = self.spec.enabled;
            self.spec = spec;
            if self.spec.enabled && !was_enabled {
                self.fetch_if_needed();
            }
            return;
        }

        let placeholder = if spec.enabled {
            self.receiver.borrow().data.clone()
        } else {
            None
        };
        self.spec = spec;
        self.bind(placeholder);
    }

    /// Force a refetch of the bound identity. Joins a fetch already in
    /// flight. A disabled query is left alone.
    pub async fn refresh(&self) -> ApiResult<()> {
        if !self.spec.enabled {
            return Ok(());
        }
        self.store
            .fetch(&self.spec.identity, self.spec.fetcher.clone())
            .await
            .map(|_| ())
    }

    pub fn identity(&self) -> &QueryIdentity {
        &self.spec.identity
    }

    pub fn is_enabled(&self) -> bool {
        self.spec.enabled
    }

    /// Latest view.
    pub fn view(&self) -> QueryView<T> {
        self.receiver.borrow().clone()
    }

    /// An independent receiver for render loops.
    pub fn watch(&self) -> watch::Receiver<QueryView<T>> {
        self.sender.subscribe()
    }

    /// Wait for the next change and return it.
    pub async fn changed(&mut self) -> QueryView<T> {
        // The sender lives as long as `self`, so this cannot fail.
        let _ = self.receiver.changed().await;
        self.receiver.borrow_and_update().clone()
    }

    /// Wait until the bound query is no longer loading.
    pub async fn settled(&mut self) -> QueryView<T> {
        let settled = self
            .receiver
            .wait_for(|view| !view.is_loading())
            .await
            .map(|view| (*view).clone());
        settled.unwrap_or_else(|_| self.view())
    }

    fn bind(&mut self, placeholder: Option<Arc<T>>) {
        // Drop the old registration before its identity loses the view.
        self.subscription.take();

        let generation = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.generation += 1;
            state.placeholder = placeholder;
            state.generation
        };

        let state = self.state.clone();
        let sender = self.sender.clone();
        let listener = move |entry: &CacheEntry| {
            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.generation != generation {
                return;
            }
            let (data, is_placeholder) = match entry.data::<T>() {
                Some(data) => {
                    state.placeholder = None;
                    (Some(data), false)
                }
                None => (state.placeholder.clone(), state.placeholder.is_some()),
            };
            sender.send_replace(QueryView {
                status: entry.status,
                data,
                error: entry.error.clone(),
                is_stale: entry.is_stale,
                is_placeholder,
                last_fetched_at: entry.last_fetched_at,
            });
        };

        self.subscription = Some(self.store.subscribe(&self.spec.identity, listener));
        self.fetch_if_needed();
    }

    fn fetch_if_needed(&self) {
        if !self.spec.enabled {
            return;
        }
        let needs_fetch = self
            .store
            .get(&self.spec.identity)
            .is_some_and(|entry| !entry.is_loading() && entry.needs_fetch());
        if needs_fetch {
            let in_flight = self.store.fetch(&self.spec.identity, self.spec.fetcher.clone());
            tokio::spawn(in_flight);
        }
    }
}

impl<T> fmt::Debug for QueryBinder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryBinder")
            .field("spec", &self.spec)
            .field("status", &self.receiver.borrow().status)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn page_spec(page: u32, calls: Arc<AtomicUsize>, gate: Option<Arc<Notify>>) -> QuerySpec<Vec<u32>> {
        QuerySpec::new(QueryIdentity::new("items").with("page", page), move || {
            let calls = calls.clone();
            let gate = gate.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if let Some(gate) = gate {
                    gate.notified().await;
                }
                Ok(vec![page * 10, page * 10 + 1])
            }
        })
    }

    #[tokio::test]
    async fn mount_fetches_and_publishes_data() {
        let store = CacheStore::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut binder = QueryBinder::mount(store, page_spec(0, calls.clone(), None));
        assert!(binder.view().is_first_load());

        let view = binder.settled().await;
        assert!(view.is_success());
        assert_eq!(view.data(), Some(&vec![0, 1]));
        assert!(!view.is_placeholder);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disabled_query_stays_idle() {
        let store = CacheStore::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut binder =
            QueryBinder::mount(store.clone(), page_spec(0, calls.clone(), None).enabled(false));
        tokio::task::yield_now().await;
        assert!(binder.view().is_idle());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        binder.set_query(page_spec(0, calls.clone(), None));
        let view = binder.settled().await;
        assert!(view.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn previous_page_stays_visible_while_next_loads() {
        let store = CacheStore::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut binder = QueryBinder::mount(store.clone(), page_spec(0, calls.clone(), None));
        binder.settled().await;

        let gate = Arc::new(Notify::new());
        binder.set_query(page_spec(1, calls.clone(), Some(gate.clone())));
        let view = binder.view();
        assert!(view.is_loading());
        assert!(view.is_placeholder);
        assert_eq!(view.data(), Some(&vec![0, 1]));

        gate.notify_one();
        let view = binder.settled().await;
        assert!(view.is_success());
        assert!(!view.is_placeholder);
        assert_eq!(view.data(), Some(&vec![10, 11]));
    }

    #[tokio::test]
    async fn failed_page_keeps_placeholder_with_error() {
        let store = CacheStore::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut binder = QueryBinder::mount(store.clone(), page_spec(0, calls, None));
        binder.settled().await;

        let failing = QuerySpec::<Vec<u32>>::new(QueryIdentity::new("items").with("page", 1u32), || async {
            Err(ApiError::server(500, "boom"))
        });
        binder.set_query(failing);
        let view = binder.settled().await;
        assert!(view.is_error());
        assert!(view.is_placeholder);
        assert_eq!(view.data(), Some(&vec![0, 1]));
        assert_eq!(view.error, Some(ApiError::server(500, "boom")));
    }

    #[tokio::test]
    async fn fresh_entry_is_not_refetched_on_remount() {
        let store = CacheStore::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut first = QueryBinder::mount(store.clone(), page_spec(0, calls.clone(), None));
        first.settled().await;
        drop(first);

        let second = QueryBinder::mount(store.clone(), page_spec(0, calls.clone(), None));
        assert!(second.view().is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.stats().hits, 1);

        second.refresh().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

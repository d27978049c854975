//! Mutation dispatch and post-success invalidation.

use crate::identity::{IdentityPrefix, QueryIdentity};
use crate::store::CacheStore;
use abono_core::ApiError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// A create, update or delete against the remote API.
///
/// `C` is whatever the mutation needs to execute, usually a
/// `dyn ConsoleApi`. The invalidation rule is static per mutation kind and
/// scoped by the ids the mutation carries.
#[async_trait]
pub trait Mutation<C: ?Sized + Send + Sync>: Send + Sync {
    type Output: Send;

    /// Short name used in logs, e.g. `create_payment`.
    fn kind(&self) -> &'static str;

    /// Prefixes whose cached data is stale once this mutation succeeds.
    fn invalidates(&self) -> Vec<IdentityPrefix>;

    async fn execute(&self, ctx: &C) -> Result<Self::Output, ApiError>;
}

/// Result of a successful dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched<O> {
    pub output: O,
    /// Subscribed identities that were refetched.
    pub refetched: Vec<QueryIdentity>,
}

/// Runs mutations and keeps the cache consistent with their effects.
pub struct MutationDispatcher<C: ?Sized> {
    ctx: Arc<C>,
    store: CacheStore,
}

impl<C: ?Sized> Clone for MutationDispatcher<C> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            store: self.store.clone(),
        }
    }
}

impl<C: ?Sized + Send + Sync> MutationDispatcher<C> {
    pub fn new(ctx: Arc<C>, store: CacheStore) -> Self {
        Self { ctx, store }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn context(&self) -> &Arc<C> {
        &self.ctx
    }

    /// Execute `mutation` once and return its output.
    ///
    /// On success every prefix of its rule is invalidated and the subscribed
    /// identities are refetched before this returns. Refetch failures are
    /// recorded on their entries only. On failure nothing is invalidated.
    pub async fn mutate<M>(&self, mutation: M) -> Result<M::Output, ApiError>
    where
        M: Mutation<C>,
    {
        self.dispatch(mutation).await.map(|dispatched| dispatched.output)
    }

    /// Like [`mutate`](Self::mutate), also reporting what was refetched.
    pub async fn dispatch<M>(&self, mutation: M) -> Result<Dispatched<M::Output>, ApiError>
    where
        M: Mutation<C>,
    {
        let kind = mutation.kind();
        let output = match mutation.execute(&self.ctx).await {
            Ok(output) => output,
            Err(error) => {
                warn!(mutation = kind, error = %error, "Mutation failed");
                return Err(error);
            }
        };

        let prefixes = mutation.invalidates();
        let refetched = self.store.invalidate_and_refetch(&prefixes).await;
        info!(
            mutation = kind,
            invalidated = prefixes.len(),
            refetched = refetched.len(),
            "Mutation applied"
        );
        Ok(Dispatched { output, refetched })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::{QueryBinder, QuerySpec};
    use crate::store::erase_fetcher;
    use futures_util::future::{BoxFuture, FutureExt};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct Counter {
        value: AtomicUsize,
        fail: bool,
    }

    struct Bump;

    #[async_trait]
    impl Mutation<Counter> for Bump {
        type Output = usize;

        fn kind(&self) -> &'static str {
            "bump"
        }

        fn invalidates(&self) -> Vec<IdentityPrefix> {
            vec![IdentityPrefix::new("counter")]
        }

        async fn execute(&self, ctx: &Counter) -> Result<usize, ApiError> {
            if ctx.fail {
                return Err(ApiError::server(409, "conflict"));
            }
            Ok(ctx.value.fetch_add(1, Ordering::SeqCst) + 1)
        }
    }

    async fn watched_counter(store: &CacheStore, ctx: Arc<Counter>) -> QueryIdentity {
        let key = QueryIdentity::new("counter");
        let fetcher = erase_fetcher(move || {
            let value = ctx.value.load(Ordering::SeqCst);
            async move { Ok::<_, ApiError>(value) }
        });
        store.fetch(&key, fetcher).await.unwrap();
        key
    }

    /// Holds the first request after it has read the counter.
    struct Gate {
        held: AtomicBool,
        started: Notify,
        release: Notify,
    }

    impl Gate {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                held: AtomicBool::new(true),
                started: Notify::new(),
                release: Notify::new(),
            })
        }
    }

    fn held_read(
        ctx: Arc<Counter>,
        gate: Arc<Gate>,
    ) -> impl Fn() -> BoxFuture<'static, Result<usize, ApiError>> + Send + Sync + 'static {
        move || {
            let value = ctx.value.load(Ordering::SeqCst);
            let hold = gate.held.swap(false, Ordering::SeqCst);
            let gate = gate.clone();
            async move {
                if hold {
                    gate.started.notify_one();
                    gate.release.notified().await;
                }
                Ok(value)
            }
            .boxed()
        }
    }

    fn counter(fail: bool) -> Arc<Counter> {
        Arc::new(Counter {
            value: AtomicUsize::new(0),
            fail,
        })
    }

    #[tokio::test]
    async fn success_refetches_subscribed_entries() {
        let store = CacheStore::default();
        let ctx = Arc::new(Counter {
            value: AtomicUsize::new(0),
            fail: false,
        });
        let key = watched_counter(&store, ctx.clone()).await;
        let _sub = store.subscribe(&key, |_| {});

        let dispatcher = MutationDispatcher::new(ctx, store.clone());
        let dispatched = dispatcher.dispatch(Bump).await.unwrap();
        assert_eq!(dispatched.output, 1);
        assert_eq!(dispatched.refetched, vec![key.clone()]);

        let entry = store.get(&key).unwrap();
        assert!(!entry.is_stale);
        assert_eq!(entry.data::<usize>().map(|v| *v), Some(1));
    }

    #[tokio::test]
    async fn failure_leaves_cache_untouched() {
        let store = CacheStore::default();
        let ctx = Arc::new(Counter {
            value: AtomicUsize::new(0),
            fail: true,
        });
        let key = watched_counter(&store, ctx.clone()).await;
        let _sub = store.subscribe(&key, |_| {});

        let dispatcher = MutationDispatcher::new(ctx, store.clone());
        let err = dispatcher.mutate(Bump).await.unwrap_err();
        assert_eq!(err, ApiError::server(409, "conflict"));
        assert!(!store.get(&key).unwrap().is_stale);
        assert_eq!(store.stats().network_fetches, 1);
    }

    #[tokio::test]
    async fn unobserved_entries_are_only_marked_stale() {
        let store = CacheStore::default();
        let ctx = Arc::new(Counter {
            value: AtomicUsize::new(0),
            fail: false,
        });
        let key = watched_counter(&store, ctx.clone()).await;

        let dispatcher = MutationDispatcher::new(ctx, store.clone());
        let dispatched = dispatcher.dispatch(Bump).await.unwrap();
        assert!(dispatched.refetched.is_empty());
        assert!(store.get(&key).unwrap().is_stale);
        assert_eq!(store.stats().network_fetches, 1);
    }

    #[tokio::test]
    async fn refetch_does_not_join_a_request_answered_before_the_write() {
        let store = CacheStore::default();
        let ctx = counter(false);
        let gate = Gate::new();
        let key = QueryIdentity::new("counter");
        let _sub = store.subscribe(&key, |_| {});

        let early = store.fetch(&key, erase_fetcher(held_read(ctx.clone(), gate.clone())));
        let early = tokio::spawn(early);
        gate.started.notified().await;

        let dispatcher = MutationDispatcher::new(ctx, store.clone());
        let dispatched = dispatcher.dispatch(Bump).await.unwrap();
        assert_eq!(dispatched.refetched, vec![key.clone()]);
        let entry = store.get(&key).unwrap();
        assert_eq!(entry.data::<usize>().map(|v| *v), Some(1));
        assert!(!entry.is_stale);

        // The older request still resolves for its own callers, but its
        // answer never replaces the newer one.
        gate.release.notify_one();
        let early = early.await.unwrap().unwrap();
        assert_eq!(early.downcast::<usize>().ok().map(|v| *v), Some(0));
        let entry = store.get(&key).unwrap();
        assert_eq!(entry.data::<usize>().map(|v| *v), Some(1));
        assert!(!entry.is_stale);
        assert_eq!(store.stats().network_fetches, 2);
    }

    #[tokio::test]
    async fn view_mounted_during_a_mutation_ends_on_written_data() {
        let store = CacheStore::default();
        let ctx = counter(false);
        let gate = Gate::new();
        let key = QueryIdentity::new("counter");

        let spec = QuerySpec::new(key.clone(), held_read(ctx.clone(), gate.clone()));
        let mut binder = QueryBinder::mount(store.clone(), spec);
        gate.started.notified().await;
        assert!(binder.view().is_first_load());

        let dispatcher = MutationDispatcher::new(ctx, store.clone());
        let dispatched = dispatcher.dispatch(Bump).await.unwrap();
        assert_eq!(dispatched.refetched, vec![key.clone()]);
        let view = binder.settled().await;
        assert_eq!(view.data(), Some(&1));
        assert!(!view.is_stale);

        gate.release.notify_one();
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        let view = binder.view();
        assert_eq!(view.data(), Some(&1));
        assert!(!view.is_stale);
        assert_eq!(store.stats().network_fetches, 2);
    }
}

//! Abono Sync - Client-Side Query Cache
//!
//! Keeps server-derived state consistent across independently rendered
//! views:
//!
//! - [`CacheStore`]: keyed entries, subscriptions, request coalescing,
//!   invalidation and garbage collection
//! - [`QueryBinder`]: binds one view to one identity with placeholder data
//!   across identity changes
//! - [`MutationDispatcher`]: runs a mutation, then invalidates and refetches
//! - [`DebounceGate`]: trailing-edge debounce for search input
//! - [`PageCursor`] / [`PagedList`]: pagination state

pub mod binder;
pub mod config;
pub mod debounce;
pub mod identity;
pub mod mutation;
pub mod pagination;
pub mod store;

pub use binder::{QueryBinder, QuerySpec, QueryView};
pub use config::SyncConfig;
pub use debounce::DebounceGate;
pub use identity::{IdentityPrefix, ParamValue, QueryIdentity};
pub use mutation::{Dispatched, Mutation, MutationDispatcher};
pub use pagination::{PageCursor, PagedList};
pub use store::{
    erase_fetcher, CacheEntry, CacheStats, CacheStore, Fetcher, InFlight, Payload, QueryStatus,
    Subscription,
};

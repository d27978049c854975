//! Abono console client.
//!
//! REST adapter, configuration, the query catalogue and mutation rules the
//! console screens share, headless screen models, and the `abono` CLI.

pub mod api_client;
pub mod cli;
pub mod config;
pub mod error;
pub mod mutations;
pub mod queries;
pub mod screens;
pub mod telemetry;

use crate::api_client::RestClient;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::mutations::Api;
use abono_sync::{CacheStore, MutationDispatcher};
use std::sync::Arc;

/// Build the process-wide store and dispatcher over the REST adapter.
///
/// Starts the cache collector when `sync.gc_interval_ms` is set, so this
/// must be called from within a Tokio runtime.
pub fn connect(config: &ClientConfig) -> Result<MutationDispatcher<Api>, ClientError> {
    let api: Arc<Api> = Arc::new(RestClient::new(config)?);
    let store = CacheStore::new(config.sync_config());
    // Detached: the collector stops once the store is dropped.
    let _ = store.spawn_collector();
    Ok(MutationDispatcher::new(api, store))
}

//! Per-credential connection pool.

use crate::store::{Credential, RecordStore, StoreConnection, StoreError};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

/// A pooled connection. The store connection is treated as not safe for
/// concurrent calls, so callers lock it for the duration of each call.
pub type PooledConnection = Arc<Mutex<Box<dyn StoreConnection>>>;

/// Lazily opens and caches one connection per credential identity.
///
/// Concurrent first requests for the same credential perform exactly one
/// connection setup; everyone else waits on that initialization and shares
/// the resulting handle. A failed setup is not cached, so a later request
/// may retry it.
pub struct ConnectionPool {
    store: Arc<dyn RecordStore>,
    connections: DashMap<String, Arc<OnceCell<PooledConnection>>>,
}

impl ConnectionPool {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            connections: DashMap::new(),
        }
    }

    /// Get the connection for `credential`, opening it on first use.
    pub async fn get(&self, credential: &Credential) -> Result<PooledConnection, StoreError> {
        let cell = self
            .connections
            .entry(credential.client_id.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let connection = cell
            .get_or_try_init(|| async {
                debug!(client_id = %credential.client_id, "opening store connection");
                let connection = self.store.connect(credential).await?;
                Ok::<_, StoreError>(Arc::new(Mutex::new(connection)))
            })
            .await?;

        Ok(connection.clone())
    }

    /// Number of credentials with an initialized connection.
    pub fn open_connections(&self) -> usize {
        self.connections
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }
}

//! # bulkpurge
//!
//! Concurrent bulk deletion of a rate-limited record collection,
//! parallelized across multiple client credentials.
//!
//! The engine lists every record id in the target collection up front,
//! splits the set into one contiguous shard per credential, slices each
//! shard into fixed-size batches, and submits every batch as one
//! best-effort multi-delete behind a global concurrency gate. Per-record
//! faults are logged and never abort a batch; a failed batch never aborts
//! its siblings; the whole list-and-delete pass repeats for the configured
//! number of attempts.
//!
//! ```rust,no_run
//! use bulkpurge::{PurgeConfig, RunOrchestrator};
//! use bulkpurge::sink::FileErrorSink;
//! use bulkpurge::store::{DataverseConfig, DataverseStore};
//! use std::path::Path;
//! use std::sync::Arc;
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = PurgeConfig::load(Path::new("bulkpurge.yaml"))?;
//!     let store = Arc::new(DataverseStore::new(DataverseConfig {
//!         endpoint: config.endpoint.clone(),
//!         tenant_id: config.tenant_id.clone(),
//!         timeout: config.request_timeout(),
//!         authority: None,
//!         entity_set: config.entity_set.clone(),
//!         id_attribute: config.id_attribute.clone(),
//!     })?);
//!     let sink = Arc::new(FileErrorSink::create(&config.error_log)?);
//!     let (_shutdown_tx, shutdown_rx) = watch::channel(false);
//!
//!     let orchestrator = RunOrchestrator::new(store, sink, config, shutdown_rx);
//!     let summary = orchestrator.run().await?;
//!     println!("deleted {} records", summary.total_deleted());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod monitor;
pub mod sink;
pub mod store;

pub use config::PurgeConfig;
pub use engine::{AttemptReport, ProgressSnapshot, RunOrchestrator, RunState, RunSummary};
pub use error::{PurgeError, Result};
pub use store::{Credential, RecordId, RecordStore, StoreConnection};

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Configuration surface.
//!
//! Values only: the target collection, sizing knobs, credentials and the
//! store endpoint. Loading (file + environment) and validation live in the
//! sibling modules.

mod loader;
mod validation;

use crate::store::Credential;
use serde::Deserialize;
use std::time::Duration;

fn default_batch_size() -> usize {
    100
}

fn default_page_size() -> u32 {
    5000
}

fn default_retries() -> u32 {
    1
}

fn default_error_log() -> String {
    "error.log".to_string()
}

fn default_progress_interval_secs() -> u64 {
    2
}

fn default_request_timeout_secs() -> u64 {
    120
}

/// Full configuration for one purge run.
#[derive(Debug, Clone, Deserialize)]
pub struct PurgeConfig {
    /// Store endpoint, e.g. `https://org.crm.dynamics.com`
    pub endpoint: String,
    /// Entra tenant id used for client-credential token requests
    pub tenant_id: String,
    /// Logical name of the target collection
    pub collection: String,
    /// Number of record ids per delete batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Listing page size
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Maximum batches in flight across all credentials
    pub concurrency: usize,
    /// Number of full list-and-delete attempts; 1 means exactly one pass
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Path of the append-only error log
    #[serde(default = "default_error_log")]
    pub error_log: String,
    /// Seconds between progress snapshots
    #[serde(default = "default_progress_interval_secs")]
    pub progress_interval_secs: u64,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Credentials to parallelize across; minimum one
    pub credentials: Vec<Credential>,
    /// Entity set override when the plural is not `<collection>s`
    #[serde(default)]
    pub entity_set: Option<String>,
    /// Primary id attribute override when it is not `<collection>id`
    #[serde(default)]
    pub id_attribute: Option<String>,
}

impl PurgeConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

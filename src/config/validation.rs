//! Configuration validation.

use super::PurgeConfig;
use crate::error::{PurgeError, Result};
use std::collections::HashSet;

impl PurgeConfig {
    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(PurgeError::Config(format!(
                "endpoint must be an http(s) URL, got '{}'",
                self.endpoint
            )));
        }
        if self.tenant_id.is_empty() {
            return Err(PurgeError::Config("tenant_id must not be empty".into()));
        }
        if self.collection.is_empty() {
            return Err(PurgeError::Config("collection must not be empty".into()));
        }
        if self.batch_size == 0 {
            return Err(PurgeError::Config("batch_size must be positive".into()));
        }
        if self.page_size == 0 {
            return Err(PurgeError::Config("page_size must be positive".into()));
        }
        if self.concurrency == 0 {
            return Err(PurgeError::Config("concurrency must be positive".into()));
        }
        if self.credentials.is_empty() {
            return Err(PurgeError::Config(
                "at least one credential is required".into(),
            ));
        }

        let mut seen = HashSet::new();
        for credential in &self.credentials {
            if credential.client_id.is_empty() || credential.client_secret.is_empty() {
                return Err(PurgeError::Config(
                    "credentials must carry a client_id and client_secret".into(),
                ));
            }
            // The pool keys connections by client id; duplicates would
            // silently collapse two shards onto one connection.
            if !seen.insert(credential.client_id.as_str()) {
                return Err(PurgeError::Config(format!(
                    "duplicate credential client_id '{}'",
                    credential.client_id
                )));
            }
        }

        Ok(())
    }
}

//! Configuration loading.

use super::PurgeConfig;
use crate::error::{PurgeError, Result};
use config::{Config, Environment, File};
use std::path::Path;
use tracing::debug;

impl PurgeConfig {
    /// Load from a YAML file with `BULKPURGE_`-prefixed environment
    /// overrides (`BULKPURGE_BATCH_SIZE=500` overrides `batch_size`).
    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading configuration");

        let settings = Config::builder()
            .add_source(File::from(path))
            .add_source(Environment::with_prefix("BULKPURGE").separator("__"))
            .build()
            .map_err(|e| PurgeError::Config(e.to_string()))?;

        let config: PurgeConfig = settings
            .try_deserialize()
            .map_err(|e| PurgeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_yaml_with_defaults_applied() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("purge.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            concat!(
                "endpoint: https://org.crm.dynamics.com\n",
                "tenant_id: 11111111-2222-3333-4444-555555555555\n",
                "collection: widget\n",
                "concurrency: 8\n",
                "credentials:\n",
                "  - client_id: app-1\n",
                "    client_secret: s3cret\n",
            )
        )
        .unwrap();

        let config = PurgeConfig::load(&path).unwrap();
        assert_eq!(config.collection, "widget");
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.page_size, 5000);
        assert_eq!(config.retries, 1);
        assert_eq!(config.error_log, "error.log");
        assert_eq!(config.credentials.len(), 1);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let result = PurgeConfig::load(Path::new("/nonexistent/purge.yaml"));
        assert!(matches!(result, Err(PurgeError::Config(_))));
    }

    #[test]
    fn invalid_values_fail_validation_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("purge.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            concat!(
                "endpoint: https://org.crm.dynamics.com\n",
                "tenant_id: tenant\n",
                "collection: widget\n",
                "concurrency: 0\n",
                "credentials:\n",
                "  - client_id: app-1\n",
                "    client_secret: s3cret\n",
            )
        )
        .unwrap();

        assert!(matches!(
            PurgeConfig::load(&path),
            Err(PurgeError::Config(_))
        ));
    }
}

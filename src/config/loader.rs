//! Configuration Loader
//!
//! Environment-aware configuration loading. Sources, lowest precedence first:
//!
//! 1. `<dir>/edi-config.yaml` (required)
//! 2. `<dir>/edi-config.<environment>.yaml` (optional)
//! 3. `EDI_*` environment variables, `__` separating nested keys
//!    (e.g. `EDI_BACKOFF__MAX_RETRIES=3`)

use super::error::{ConfigResult, ConfigurationError};
use super::EdiConfig;
use config::{Config, Environment, File};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const BASE_CONFIG_FILE: &str = "edi-config.yaml";
const ENV_PREFIX: &str = "EDI";

pub struct ConfigManager {
    config: EdiConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            environment = environment,
            directory = %config_directory.display(),
            "Loading EDI configuration"
        );

        let config = Self::load_and_merge_config(&config_directory, environment)?;
        config.validate()?;

        info!(
            environment = environment,
            backends = config.backends.len(),
            exchange_types = config.exchange_types.len(),
            "EDI configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already-built configuration (tests, embedding applications)
    pub fn from_config(config: EdiConfig, environment: &str) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: Self::default_config_directory(),
        }))
    }

    pub fn config(&self) -> &EdiConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Current environment from `EDI_ENV`, then `APP_ENV`, defaulting to development
    pub fn detect_environment() -> String {
        env::var("EDI_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    fn default_config_directory() -> PathBuf {
        env::var("EDI_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }

    fn load_and_merge_config(
        config_directory: &Path,
        environment: &str,
    ) -> ConfigResult<EdiConfig> {
        let base_path = config_directory.join(BASE_CONFIG_FILE);
        if !base_path.is_file() {
            return Err(ConfigurationError::ConfigFileNotFound { path: base_path });
        }
        let override_path = config_directory.join(format!("edi-config.{environment}.yaml"));

        let settings = Config::builder()
            .add_source(File::from(base_path.as_path()))
            .add_source(File::from(override_path.as_path()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize::<EdiConfig>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const BASE: &str = r#"
backoff:
  base_delay_seconds: 30
  max_delay_seconds: 600
backends:
  - id: 1
    name: Demo partner
    backend_type: demo
exchange_types:
  - id: 10
    code: INVOICE_OUT
    direction: output
    backend_type: demo
    exchange_file_auto_generate: true
    handlers:
      send:
        usage: demo.output.send.sftp
"#;

    #[test]
    fn test_missing_base_file() {
        let dir = tempfile::tempdir().unwrap();
        let err =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test");
        assert!(matches!(
            err,
            Err(ConfigurationError::ConfigFileNotFound { .. })
        ));
    }

    #[test]
    fn test_environment_override_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("edi-config.yaml"), BASE).unwrap();
        fs::write(
            dir.path().join("edi-config.staging.yaml"),
            "backoff:\n  base_delay_seconds: 5\n",
        )
        .unwrap();

        let manager =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "staging")
                .unwrap();
        let config = manager.config();

        assert_eq!(manager.environment(), "staging");
        assert_eq!(config.backoff.base_delay_seconds, 5);
        assert_eq!(config.backoff.max_delay_seconds, 600);
        assert_eq!(config.backends.len(), 1);
        assert_eq!(config.exchange_types[0].code, "INVOICE_OUT");
        assert_eq!(
            config.exchange_types[0].handlers["send"].usage,
            "demo.output.send.sftp"
        );
        assert!(config.sync.skip_sent);
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("edi-config.yaml"),
            "backoff:\n  base_delay_seconds: 0\n",
        )
        .unwrap();

        let err =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test");
        assert!(matches!(err, Err(ConfigurationError::InvalidValue { .. })));
    }
}

//! # EDI Configuration System
//!
//! Layered configuration: a base YAML file, an optional environment override
//! file and `EDI_*` environment variables, merged by the `config` crate and
//! deserialized into [`EdiConfig`].
//!
//! Besides engine tuning (backoff, sweep defaults, encoding defaults, event
//! channel capacity) the configuration declares the backends and exchange types
//! that [`crate::models::ExchangeCatalog`] is built from.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use edi_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let max_retries = manager.config().backoff.max_retries;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::system;
use crate::encoding::EncodingErrorPolicy;
use crate::models::{BackendId, ExchangeDirection, ExchangeTypeId};
use crate::models::exchange_type::HandlerOverride;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring edi-config.yaml
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EdiConfig {
    /// Backoff applied when an action asks to be retried
    #[serde(default)]
    pub backoff: BackoffConfig,

    /// Batch synchronizer defaults
    #[serde(default)]
    pub sync: SyncConfig,

    /// Defaults for textual output encoding
    #[serde(default)]
    pub encoding: EncodingConfig,

    /// Notification event channel settings
    #[serde(default)]
    pub events: EventsConfig,

    /// PostgreSQL record store, when used
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    #[serde(default)]
    pub backends: Vec<BackendConfig>,

    #[serde(default)]
    pub exchange_types: Vec<ExchangeTypeConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub base_delay_seconds: u64,
    pub max_delay_seconds: u64,
    pub multiplier: f64,
    pub max_retries: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_seconds: 60,
            max_delay_seconds: 3600,
            multiplier: 2.0,
            max_retries: 5,
        }
    }
}

impl BackoffConfig {
    /// Exponential delay for a 1-based attempt number, capped at `max_delay_seconds`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.max(1).saturating_sub(1).min(32) as i32;
        let seconds = self.base_delay_seconds as f64 * self.multiplier.powi(exponent);
        let capped = seconds.min(self.max_delay_seconds as f64).max(0.0);
        Duration::from_secs_f64(capped)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Only generate missing output during output sweeps
    pub skip_send: bool,
    /// Ignore already sent records during output sweeps
    pub skip_sent: bool,
    /// Priority of jobs dispatched by sweeps (lower runs first)
    pub default_priority: u8,
    /// Priority of the send job chained after a generate job
    pub chained_send_priority: u8,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            skip_send: false,
            skip_sent: true,
            default_priority: system::DEFAULT_JOB_PRIORITY,
            chained_send_priority: system::CHAINED_SEND_PRIORITY,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EncodingConfig {
    pub default_encoding: String,
    pub default_error_policy: EncodingErrorPolicy,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            default_encoding: system::DEFAULT_ENCODING.to_string(),
            default_error_policy: EncodingErrorPolicy::Strict,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EventsConfig {
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: system::DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    pub id: BackendId,
    pub name: String,
    pub backend_type: String,
    #[serde(default)]
    pub company_id: Option<i64>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub output_sent_processed_auto: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExchangeTypeConfig {
    pub id: ExchangeTypeId,
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
    pub direction: ExchangeDirection,
    pub backend_type: String,
    #[serde(default)]
    pub backend_id: Option<BackendId>,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub encoding_out_error_handler: Option<EncodingErrorPolicy>,
    #[serde(default)]
    pub allow_empty_files_on_receive: bool,
    #[serde(default)]
    pub exchange_file_auto_generate: bool,
    /// Handler overrides keyed by action name (`generate`, `send`, ...)
    #[serde(default)]
    pub handlers: HashMap<String, HandlerOverride>,
}

impl EdiConfig {
    /// Validate values and cross references between backends and exchange types
    pub fn validate(&self) -> ConfigResult<()> {
        if self.backoff.base_delay_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "backoff.base_delay_seconds",
                "0",
                "retry delay must be positive",
            ));
        }
        if self.backoff.max_delay_seconds < self.backoff.base_delay_seconds {
            return Err(ConfigurationError::invalid_value(
                "backoff.max_delay_seconds",
                self.backoff.max_delay_seconds.to_string(),
                "must not be lower than backoff.base_delay_seconds",
            ));
        }
        if !(self.backoff.multiplier >= 1.0) {
            return Err(ConfigurationError::invalid_value(
                "backoff.multiplier",
                self.backoff.multiplier.to_string(),
                "must be at least 1.0",
            ));
        }
        if self.events.channel_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "events.channel_capacity",
                "0",
                "channel capacity must be positive",
            ));
        }

        let mut backend_ids = HashSet::new();
        for backend in &self.backends {
            if !backend_ids.insert(backend.id) {
                return Err(ConfigurationError::duplicate(
                    "backend",
                    backend.id.to_string(),
                ));
            }
            if backend.backend_type.trim().is_empty() {
                return Err(ConfigurationError::invalid_value(
                    format!("backends[{}].backend_type", backend.id),
                    "",
                    "backend type code cannot be empty",
                ));
            }
        }

        let mut type_ids = HashSet::new();
        let mut scoped_codes = HashSet::new();
        for exchange_type in &self.exchange_types {
            if !type_ids.insert(exchange_type.id) {
                return Err(ConfigurationError::duplicate(
                    "exchange type",
                    exchange_type.id.to_string(),
                ));
            }
            if exchange_type.code.trim().is_empty() {
                return Err(ConfigurationError::invalid_value(
                    format!("exchange_types[{}].code", exchange_type.id),
                    "",
                    "exchange type code cannot be empty",
                ));
            }
            if let Some(backend_id) = exchange_type.backend_id {
                if !backend_ids.contains(&backend_id) {
                    return Err(ConfigurationError::unknown_reference(
                        "backend",
                        backend_id.to_string(),
                        format!("exchange type {}", exchange_type.code),
                    ));
                }
            }
            let scope = (
                exchange_type.code.clone(),
                exchange_type.backend_type.clone(),
                exchange_type.backend_id,
            );
            if !scoped_codes.insert(scope) {
                return Err(ConfigurationError::duplicate(
                    "exchange type code",
                    exchange_type.code.clone(),
                ));
            }
            for (action, handler_override) in &exchange_type.handlers {
                if action.parse::<crate::constants::ExchangeAction>().is_err() {
                    return Err(ConfigurationError::invalid_value(
                        format!("exchange_types[{}].handlers", exchange_type.code),
                        action.clone(),
                        "unknown action key",
                    ));
                }
                if handler_override.usage.trim().is_empty() {
                    return Err(ConfigurationError::invalid_value(
                        format!("exchange_types[{}].handlers.{action}.usage", exchange_type.code),
                        "",
                        "override usage cannot be empty",
                    ));
                }
            }
        }

        Ok(())
    }
}

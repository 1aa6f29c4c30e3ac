//! # Structured Logging Module
//!
//! Environment-aware structured logging to the console and to a JSON log file,
//! for following exchange lifecycles across asynchronous jobs.

use chrono::Utc;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::constants::ExchangeAction;
use crate::models::{BackendId, RecordId};

static LOGGER_INITIALIZED: OnceLock<Option<WorkerGuard>> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// Safe to call more than once. When a global subscriber is already installed
/// the existing one is kept.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);

        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .with_ansi(true)
            .with_filter(env_filter(&log_level));

        let log_dir = PathBuf::from("log");
        let file_output = match fs::create_dir_all(&log_dir) {
            Ok(()) => {
                let pid = process::id();
                let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
                let file_name = format!("{environment}.{pid}.{timestamp}.log");
                let appender = tracing_appender::rolling::never(&log_dir, &file_name);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                Some((writer, guard, log_dir.join(file_name)))
            }
            Err(_) => None,
        };

        match file_output {
            Some((writer, guard, log_path)) => {
                let file_layer = fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_level(true)
                    .with_ansi(false)
                    .json()
                    .with_filter(env_filter(&log_level));

                let installed = tracing_subscriber::registry()
                    .with(console_layer)
                    .with(file_layer)
                    .try_init()
                    .is_ok();

                if !installed {
                    tracing::debug!("Global tracing subscriber already initialized");
                    return None;
                }

                tracing::info!(
                    pid = process::id(),
                    environment = %environment,
                    log_file = %log_path.display(),
                    "🔧 STRUCTURED LOGGING: Initialized with file output"
                );
                Some(guard)
            }
            None => {
                if tracing_subscriber::registry()
                    .with(console_layer)
                    .try_init()
                    .is_err()
                {
                    tracing::debug!("Global tracing subscriber already initialized");
                }
                tracing::warn!(
                    environment = %environment,
                    "🔧 STRUCTURED LOGGING: log directory unavailable, console output only"
                );
                None
            }
        }
    });
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Current environment from `EDI_ENV`, then `APP_ENV`
fn get_environment() -> String {
    std::env::var("EDI_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for a lifecycle action on one record
pub fn log_exchange_operation(
    action: ExchangeAction,
    record_id: RecordId,
    identifier: &str,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        action = %action,
        record_id = record_id,
        identifier = %identifier,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📦 EXCHANGE_OPERATION"
    );
}

/// Log structured data for a synchronizer sweep
pub fn log_sync_operation(
    operation: &str,
    backend_id: BackendId,
    dispatched: usize,
    checked: usize,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        backend_id = backend_id,
        dispatched = dispatched,
        checked = checked,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "🔄 SYNC_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(get_log_level("test"), "debug");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("staging"), "debug");
    }

    #[test]
    fn test_helpers_do_not_require_a_subscriber() {
        log_exchange_operation(ExchangeAction::Send, 1, "EDI/2026/00001", "ok", None);
        log_sync_operation("sync_output", 1, 2, 0, Some("test"));
        log_error("synchronizer", "sync_input", "boom", None);
    }
}

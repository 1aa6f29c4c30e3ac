//! # Exchange Catalog
//!
//! Read-only view over the configured backends and exchange types. Built once
//! at startup, usually from [`EdiConfig`].

use super::{Backend, BackendId, ExchangeDirection, ExchangeType, ExchangeTypeId};
use crate::config::{ConfigResult, ConfigurationError, EdiConfig};
use crate::constants::ExchangeAction;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct ExchangeCatalog {
    backends: HashMap<BackendId, Backend>,
    exchange_types: HashMap<ExchangeTypeId, ExchangeType>,
}

impl ExchangeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the catalog from validated configuration
    pub fn from_config(config: &EdiConfig) -> ConfigResult<Self> {
        let mut catalog = Self::new();

        for backend_config in &config.backends {
            let mut backend = Backend::new(
                backend_config.id,
                backend_config.name.clone(),
                backend_config.backend_type.clone(),
            )
            .with_auto_process(backend_config.output_sent_processed_auto);
            backend.company_id = backend_config.company_id;
            backend.active = backend_config.active;
            catalog.add_backend(backend);
        }

        for type_config in &config.exchange_types {
            let mut exchange_type = ExchangeType::new(
                type_config.id,
                type_config.code.clone(),
                type_config.direction,
                type_config.backend_type.clone(),
            )
            .with_encoding(
                type_config
                    .encoding
                    .clone()
                    .unwrap_or_else(|| config.encoding.default_encoding.clone()),
                type_config
                    .encoding_out_error_handler
                    .unwrap_or(config.encoding.default_error_policy),
            )
            .with_auto_generate(type_config.exchange_file_auto_generate)
            .with_allow_empty_files(type_config.allow_empty_files_on_receive);

            if let Some(name) = &type_config.name {
                exchange_type.name = name.clone();
            }
            exchange_type.backend_id = type_config.backend_id;

            for (action_key, handler_override) in &type_config.handlers {
                let action = action_key.parse::<ExchangeAction>().map_err(|reason| {
                    ConfigurationError::invalid_value(
                        format!("exchange_types[{}].handlers", type_config.code),
                        action_key.clone(),
                        reason,
                    )
                })?;
                exchange_type
                    .handler_overrides
                    .insert(action, handler_override.clone());
            }

            catalog.add_exchange_type(exchange_type);
        }

        Ok(catalog)
    }

    pub fn add_backend(&mut self, backend: Backend) -> &mut Self {
        self.backends.insert(backend.id, backend);
        self
    }

    pub fn add_exchange_type(&mut self, exchange_type: ExchangeType) -> &mut Self {
        self.exchange_types.insert(exchange_type.id, exchange_type);
        self
    }

    pub fn backend_count(&self) -> usize {
        self.backends.len()
    }

    pub fn exchange_type_count(&self) -> usize {
        self.exchange_types.len()
    }

    pub fn backend(&self, id: BackendId) -> Option<&Backend> {
        self.backends.get(&id)
    }

    pub fn exchange_type(&self, id: ExchangeTypeId) -> Option<&ExchangeType> {
        self.exchange_types.get(&id)
    }

    /// Active backends ordered by id
    pub fn active_backends(&self) -> Vec<&Backend> {
        let mut backends: Vec<&Backend> = self.backends.values().filter(|b| b.active).collect();
        backends.sort_by_key(|b| b.id);
        backends
    }

    /// Find the exchange type a backend uses for a code.
    ///
    /// Types bound to the backend win over generic types of its backend type.
    pub fn exchange_type_for_code(&self, backend: &Backend, code: &str) -> Option<&ExchangeType> {
        let mut candidates: Vec<&ExchangeType> = self
            .exchange_types
            .values()
            .filter(|t| t.code == code)
            .filter(|t| match t.backend_id {
                Some(backend_id) => backend_id == backend.id,
                None => t.backend_type_code == backend.backend_type_code,
            })
            .collect();
        candidates.sort_by_key(|t| (t.backend_id.is_none(), t.id));
        candidates.into_iter().next()
    }

    /// Output exchange types a backend auto-generates content for
    pub fn auto_generate_output_types(&self, backend: &Backend) -> Vec<&ExchangeType> {
        let mut types: Vec<&ExchangeType> = self
            .exchange_types
            .values()
            .filter(|t| t.direction == ExchangeDirection::Output && t.exchange_file_auto_generate)
            .filter(|t| match t.backend_id {
                Some(backend_id) => backend_id == backend.id,
                None => t.backend_type_code == backend.backend_type_code,
            })
            .collect();
        types.sort_by_key(|t| t.id);
        types
    }
}

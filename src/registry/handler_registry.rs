//! # Handler Registry
//!
//! Registrations keyed by (usage, backend type?, exchange type?). The registry
//! is assembled once at startup through [`HandlerRegistryBuilder`], frozen into
//! an immutable [`HandlerRegistry`] and shared behind an `Arc`. It can also be
//! installed as the process-wide registry.
//!
//! ## Usage
//!
//! ```rust
//! use async_trait::async_trait;
//! use edi_core::orchestration::error_classifier::HandlerResult;
//! use edi_core::registry::{
//!     HandlerFactory, HandlerRegistration, HandlerRegistry, SendHandler, WorkContext,
//! };
//!
//! struct SftpSend;
//!
//! #[async_trait]
//! impl SendHandler for SftpSend {
//!     async fn send(&self, _ctx: &WorkContext) -> HandlerResult<()> {
//!         Ok(())
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut builder = HandlerRegistry::builder();
//! builder.register(
//!     HandlerRegistration::new("sftp_send", "output.send", HandlerFactory::send(|_| SftpSend))
//!         .for_backend_type("demo"),
//! )?;
//! let registry = builder.build();
//! assert_eq!(registry.stats().total, 1);
//! # Ok(())
//! # }
//! ```

use super::handler::HandlerFactory;
use crate::config::{ConfigResult, ConfigurationError};
use crate::constants::ExchangeAction;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

static GLOBAL_REGISTRY: OnceLock<Arc<HandlerRegistry>> = OnceLock::new();

/// One registered handler
#[derive(Debug, Clone)]
pub struct HandlerRegistration {
    pub name: String,
    pub usage: String,
    /// Restrict to backends of this type
    pub backend_type: Option<String>,
    /// Restrict to exchange types with this code
    pub exchange_type: Option<String>,
    pub factory: HandlerFactory,
}

impl HandlerRegistration {
    pub fn new(name: impl Into<String>, usage: impl Into<String>, factory: HandlerFactory) -> Self {
        Self {
            name: name.into(),
            usage: usage.into(),
            backend_type: None,
            exchange_type: None,
            factory,
        }
    }

    pub fn for_backend_type(mut self, code: impl Into<String>) -> Self {
        self.backend_type = Some(code.into());
        self
    }

    pub fn for_exchange_type(mut self, code: impl Into<String>) -> Self {
        self.exchange_type = Some(code.into());
        self
    }

    pub fn capability(&self) -> ExchangeAction {
        self.factory.capability()
    }
}

#[derive(Debug, Default)]
pub struct HandlerRegistryBuilder {
    registrations: Vec<HandlerRegistration>,
}

impl HandlerRegistryBuilder {
    /// Add a registration; the usage must not be empty
    pub fn register(&mut self, registration: HandlerRegistration) -> ConfigResult<&mut Self> {
        if registration.usage.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                format!("handler {}.usage", registration.name),
                "",
                "handler usage cannot be empty",
            ));
        }
        debug!(
            name = %registration.name,
            usage = %registration.usage,
            capability = %registration.capability(),
            backend_type = registration.backend_type.as_deref(),
            exchange_type = registration.exchange_type.as_deref(),
            "Registered EDI handler"
        );
        self.registrations.push(registration);
        Ok(self)
    }

    /// Freeze the registrations
    pub fn build(self) -> HandlerRegistry {
        let mut by_usage: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, registration) in self.registrations.iter().enumerate() {
            by_usage
                .entry(registration.usage.clone())
                .or_default()
                .push(index);
        }
        info!(handlers = self.registrations.len(), "EDI handler registry built");
        HandlerRegistry {
            registrations: self.registrations,
            by_usage,
        }
    }
}

/// Registry statistics for introspection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub total: usize,
    pub per_capability: HashMap<ExchangeAction, usize>,
    pub usages: Vec<String>,
}

/// Immutable handler registry
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    registrations: Vec<HandlerRegistration>,
    /// Registration indexes per usage, in registration order
    by_usage: HashMap<String, Vec<usize>>,
}

impl HandlerRegistry {
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::default()
    }

    /// Registrations for a usage with their registration order
    pub fn for_usage<'a>(
        &'a self,
        usage: &str,
    ) -> impl Iterator<Item = (usize, &'a HandlerRegistration)> + 'a {
        self.by_usage
            .get(usage)
            .into_iter()
            .flatten()
            .filter_map(|&index| self.registrations.get(index).map(|r| (index, r)))
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    pub fn stats(&self) -> RegistryStats {
        let mut per_capability = HashMap::new();
        for registration in &self.registrations {
            *per_capability.entry(registration.capability()).or_insert(0) += 1;
        }
        let usages: BTreeSet<String> = self.by_usage.keys().cloned().collect();
        RegistryStats {
            total: self.registrations.len(),
            per_capability,
            usages: usages.into_iter().collect(),
        }
    }

    /// Install as the process-wide registry.
    ///
    /// Returns the registry back when one is already installed.
    pub fn install_global(registry: Arc<HandlerRegistry>) -> Result<(), Arc<HandlerRegistry>> {
        GLOBAL_REGISTRY.set(registry)
    }

    pub fn global() -> Option<Arc<HandlerRegistry>> {
        GLOBAL_REGISTRY.get().cloned()
    }
}

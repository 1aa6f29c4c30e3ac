//! # Handler Resolution
//!
//! Picks the handler for a record and an action key.
//!
//! Usage candidates are tried in order: the override usage configured on the
//! exchange type for the action, then the generic `<direction>.<action>` usage.
//! The first candidate with at least one match wins; matches are never merged
//! across candidates. Within the winning candidate a handler bound to the
//! backend type outranks an unbound one, then a handler bound to the exchange
//! type outranks an unbound one, then registration order decides. A handler
//! bound to another backend type or exchange type never matches.

use crate::constants::ExchangeAction;
use crate::error::{EdiError, Result};
use crate::models::{Backend, ExchangeRecord, ExchangeType};
use crate::registry::{Handler, HandlerRegistration, HandlerRegistry, WorkContext};
use std::sync::Arc;
use tracing::debug;

/// A handler instantiated for one record and action
#[derive(Debug)]
pub struct ResolvedHandler {
    /// Registration name
    pub name: String,
    pub handler: Handler,
    pub context: WorkContext,
}

#[derive(Debug, Clone)]
pub struct HandlerResolver {
    registry: Arc<HandlerRegistry>,
}

impl HandlerResolver {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Ordered usage candidates for an action
    pub fn usage_candidates(exchange_type: &ExchangeType, action: ExchangeAction) -> Vec<String> {
        let generic = format!("{}.{}", exchange_type.direction, action);
        match exchange_type.handler_override(action) {
            Some(handler_override) if handler_override.usage != generic => {
                vec![handler_override.usage.clone(), generic]
            }
            _ => vec![generic],
        }
    }

    /// Registration that would serve the action, without instantiating it
    pub fn best_match<'a>(
        &'a self,
        backend: &Backend,
        exchange_type: &ExchangeType,
        action: ExchangeAction,
    ) -> Option<(String, &'a HandlerRegistration)> {
        Self::usage_candidates(exchange_type, action)
            .into_iter()
            .find_map(|usage| {
                self.registry
                    .for_usage(&usage)
                    .filter(|(_, registration)| {
                        matches(registration, backend, exchange_type, action)
                    })
                    .min_by_key(|(index, registration)| {
                        (
                            registration.backend_type.is_none(),
                            registration.exchange_type.is_none(),
                            *index,
                        )
                    })
                    .map(|(_, registration)| (usage, registration))
            })
    }

    /// Resolve and instantiate the handler for an action.
    ///
    /// With `safe` a missing handler yields `None`; otherwise it fails with
    /// [`EdiError::HandlerNotFound`] naming every candidate tried.
    pub fn resolve(
        &self,
        backend: &Backend,
        exchange_type: &ExchangeType,
        record: &ExchangeRecord,
        action: ExchangeAction,
        safe: bool,
    ) -> Result<Option<ResolvedHandler>> {
        let Some((usage, registration)) = self.best_match(backend, exchange_type, action) else {
            let candidates = Self::usage_candidates(exchange_type, action);
            debug!(
                record_id = record.id,
                action = %action,
                candidates = ?candidates,
                safe = safe,
                "No EDI handler matched"
            );
            return if safe {
                Ok(None)
            } else {
                Err(EdiError::HandlerNotFound { candidates })
            };
        };

        let mut context = WorkContext::new(
            backend.clone(),
            exchange_type.clone(),
            record.clone(),
            action,
            usage.clone(),
        );
        if let Some(handler_override) = exchange_type.handler_override(action) {
            if handler_override.usage == usage {
                context = context.with_extra(&handler_override.work_ctx, &handler_override.env_ctx);
            }
        }

        debug!(
            record_id = record.id,
            action = %action,
            usage = %usage,
            handler = %registration.name,
            "Resolved EDI handler"
        );

        Ok(Some(ResolvedHandler {
            name: registration.name.clone(),
            handler: registration.factory.instantiate(&context),
            context,
        }))
    }
}

fn matches(
    registration: &HandlerRegistration,
    backend: &Backend,
    exchange_type: &ExchangeType,
    action: ExchangeAction,
) -> bool {
    registration.capability() == action
        && registration
            .backend_type
            .as_deref()
            .map_or(true, |code| code == backend.backend_type_code)
        && registration
            .exchange_type
            .as_deref()
            .map_or(true, |code| code == exchange_type.code)
}

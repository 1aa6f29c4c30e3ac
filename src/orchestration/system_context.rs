use crate::config::{ConfigManager, EdiConfig};
use crate::error::Result;
use crate::events::{EventPublisher, EventPublisherNotifier, ExchangeNotifier};
use crate::models::ExchangeCatalog;
use crate::orchestration::error_classifier::{ErrorClassifier, StandardErrorClassifier};
use crate::orchestration::handler_resolver::HandlerResolver;
use crate::orchestration::job_queue::{InMemoryJobQueue, JobQueue};
use crate::persistence::{ExchangeStore, InMemoryExchangeStore};
use crate::registry::HandlerRegistry;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Shared engine dependencies and configuration
///
/// This serves as a dependency injection container providing access to:
/// - Exchange record store
/// - Catalog of configured backends and exchange types
/// - Handler resolver over the frozen registry
/// - Error classifier
/// - Notifier and job queue collaborators
pub struct SystemContext {
    /// System instance ID
    pub system_id: Uuid,

    pub config: Arc<EdiConfig>,

    pub catalog: Arc<ExchangeCatalog>,

    pub store: Arc<dyn ExchangeStore>,

    pub resolver: HandlerResolver,

    pub classifier: Arc<dyn ErrorClassifier>,

    pub notifier: Arc<dyn ExchangeNotifier>,

    pub job_queue: Arc<dyn JobQueue>,
}

impl std::fmt::Debug for SystemContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemContext")
            .field("system_id", &self.system_id)
            .field("config", &"Arc<EdiConfig>")
            .field(
                "catalog",
                &format!(
                    "ExchangeCatalog(backends={}, exchange_types={})",
                    self.catalog.backend_count(),
                    self.catalog.exchange_type_count()
                ),
            )
            .field("store", &"Arc<dyn ExchangeStore>")
            .field(
                "resolver",
                &format!("HandlerResolver(handlers={})", self.resolver.registry().len()),
            )
            .field("classifier", &"Arc<dyn ErrorClassifier>")
            .field("notifier", &"Arc<dyn ExchangeNotifier>")
            .field("job_queue", &"Arc<dyn JobQueue>")
            .finish()
    }
}

impl SystemContext {
    pub fn builder() -> SystemContextBuilder {
        SystemContextBuilder::default()
    }

    /// Create SystemContext from a loaded configuration manager
    ///
    /// Connects the PostgreSQL record store and applies migrations when a
    /// database is configured; otherwise records are kept in memory. The handler
    /// registry falls back to the process-wide instance.
    pub async fn from_config_manager(
        config_manager: Arc<ConfigManager>,
        registry: Option<Arc<HandlerRegistry>>,
    ) -> Result<Self> {
        info!(
            environment = %config_manager.environment(),
            "🔧 Initializing SystemContext from configuration"
        );

        let config = Arc::new(config_manager.config().clone());
        let mut builder = Self::builder().with_config(config.clone());
        if let Some(registry) = registry {
            builder = builder.with_registry(registry);
        }
        if let Some(store) = Self::connect_store(&config).await? {
            builder = builder.with_store(store);
        }

        builder.build()
    }

    #[cfg(feature = "postgres")]
    async fn connect_store(config: &EdiConfig) -> Result<Option<Arc<dyn ExchangeStore>>> {
        let Some(database) = &config.database else {
            return Ok(None);
        };
        let store = crate::persistence::PgExchangeStore::connect(database).await?;
        store.migrate().await?;
        info!("✅ Exchange record store connected and migrated");
        Ok(Some(Arc::new(store)))
    }

    #[cfg(not(feature = "postgres"))]
    async fn connect_store(_config: &EdiConfig) -> Result<Option<Arc<dyn ExchangeStore>>> {
        Ok(None)
    }
}

/// Assembles a [`SystemContext`], defaulting every collaborator left unset
#[derive(Default)]
pub struct SystemContextBuilder {
    config: Option<Arc<EdiConfig>>,
    catalog: Option<Arc<ExchangeCatalog>>,
    store: Option<Arc<dyn ExchangeStore>>,
    registry: Option<Arc<HandlerRegistry>>,
    classifier: Option<Arc<dyn ErrorClassifier>>,
    notifier: Option<Arc<dyn ExchangeNotifier>>,
    job_queue: Option<Arc<dyn JobQueue>>,
}

impl SystemContextBuilder {
    pub fn with_config(mut self, config: Arc<EdiConfig>) -> Self {
        self.config = Some(config);
        self
    }

    /// Use an explicit catalog instead of building one from the configuration
    pub fn with_catalog(mut self, catalog: ExchangeCatalog) -> Self {
        self.catalog = Some(Arc::new(catalog));
        self
    }

    pub fn with_store(mut self, store: Arc<dyn ExchangeStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_registry(mut self, registry: Arc<HandlerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn ExchangeNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_job_queue(mut self, job_queue: Arc<dyn JobQueue>) -> Self {
        self.job_queue = Some(job_queue);
        self
    }

    pub fn build(self) -> Result<SystemContext> {
        let config = self.config.unwrap_or_default();

        let catalog = match self.catalog {
            Some(catalog) => catalog,
            None => Arc::new(ExchangeCatalog::from_config(&config)?),
        };

        let registry = self
            .registry
            .or_else(HandlerRegistry::global)
            .unwrap_or_else(|| Arc::new(HandlerRegistry::builder().build()));

        let notifier = self.notifier.unwrap_or_else(|| {
            Arc::new(EventPublisherNotifier::new(EventPublisher::new(
                config.events.channel_capacity,
            )))
        });

        let context = SystemContext {
            system_id: Uuid::new_v4(),
            catalog,
            store: self
                .store
                .unwrap_or_else(|| Arc::new(InMemoryExchangeStore::new())),
            resolver: HandlerResolver::new(registry),
            classifier: self
                .classifier
                .unwrap_or_else(|| Arc::new(StandardErrorClassifier::new())),
            notifier,
            job_queue: self
                .job_queue
                .unwrap_or_else(|| Arc::new(InMemoryJobQueue::new())),
            config,
        };

        info!(
            system_id = %context.system_id,
            backends = context.catalog.backend_count(),
            exchange_types = context.catalog.exchange_type_count(),
            handlers = context.resolver.registry().len(),
            "✅ SystemContext ready"
        );
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Backend, ExchangeDirection, ExchangeType};

    #[test]
    fn test_builder_defaults() {
        let context = SystemContext::builder().build().unwrap();
        assert_eq!(context.catalog.backend_count(), 0);
        assert_eq!(context.config.backoff.max_retries, EdiConfig::default().backoff.max_retries);
    }

    #[test]
    fn test_explicit_catalog_wins() {
        let mut catalog = ExchangeCatalog::new();
        catalog
            .add_backend(Backend::new(1, "ACME", "demo"))
            .add_exchange_type(ExchangeType::new(
                10,
                "INVOICE_OUT",
                ExchangeDirection::Output,
                "demo",
            ));

        let context = SystemContext::builder().with_catalog(catalog).build().unwrap();
        assert!(context.catalog.backend(1).is_some());
        assert!(format!("{context:?}").contains("exchange_types=1"));
    }
}

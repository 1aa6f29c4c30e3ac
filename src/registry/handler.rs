//! # Pluggable Handlers
//!
//! One trait per capability. A registration supplies exactly one capability
//! through its [`HandlerFactory`] variant, so the resolver never has to probe a
//! handler for the methods it implements.
//!
//! Handlers read the record and produce content. They never write state, error
//! or timestamps: the lifecycle state machine does that from their results.

use crate::constants::{system, ExchangeAction};
use crate::models::{Backend, ExchangeRecord, ExchangeType};
use crate::orchestration::error_classifier::HandlerResult;
use crate::state_machine::ExchangeState;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Everything a handler knows about the exchange it works on
#[derive(Debug, Clone)]
pub struct WorkContext {
    pub backend: Backend,
    pub exchange_type: ExchangeType,
    /// Snapshot of the record when the action started
    pub record: ExchangeRecord,
    pub action: ExchangeAction,
    /// Usage the handler was resolved for
    pub usage: String,
    /// Extra keys declared by the exchange type override
    pub work_ctx: HashMap<String, Value>,
    /// Environment keys; always carries the framework action key
    pub env_ctx: HashMap<String, Value>,
}

impl WorkContext {
    pub fn new(
        backend: Backend,
        exchange_type: ExchangeType,
        record: ExchangeRecord,
        action: ExchangeAction,
        usage: impl Into<String>,
    ) -> Self {
        let mut env_ctx = HashMap::new();
        env_ctx.insert(
            system::FRAMEWORK_ACTION_KEY.to_string(),
            Value::String(action.as_str().to_string()),
        );
        Self {
            backend,
            exchange_type,
            record,
            action,
            usage: usage.into(),
            work_ctx: HashMap::new(),
            env_ctx,
        }
    }

    /// Merge override-declared keys; the framework action key cannot be replaced
    pub fn with_extra(
        mut self,
        work_ctx: &HashMap<String, Value>,
        env_ctx: &HashMap<String, Value>,
    ) -> Self {
        self.work_ctx
            .extend(work_ctx.iter().map(|(k, v)| (k.clone(), v.clone())));
        for (key, value) in env_ctx {
            if key != system::FRAMEWORK_ACTION_KEY {
                self.env_ctx.insert(key.clone(), value.clone());
            }
        }
        self
    }

    pub fn work_value(&self, key: &str) -> Option<&Value> {
        self.work_ctx.get(key)
    }

    /// File content of the record snapshot
    pub fn file(&self) -> Option<&[u8]> {
        self.record.file_bytes()
    }
}

/// Output of a generate handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedContent {
    /// Already encoded
    Bytes(Vec<u8>),
    /// Encoded with the exchange type's charset and error policy
    Text(String),
}

impl GeneratedContent {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Bytes(bytes) => bytes.is_empty(),
            Self::Text(text) => text.is_empty(),
        }
    }
}

impl From<Vec<u8>> for GeneratedContent {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<String> for GeneratedContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for GeneratedContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// State and error a check handler wants written
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckOutcome {
    /// `None` keeps the current state
    pub state: Option<ExchangeState>,
    pub error: Option<String>,
    pub message: Option<String>,
}

impl CheckOutcome {
    pub fn unchanged() -> Self {
        Self::default()
    }

    pub fn to_state(state: ExchangeState) -> Self {
        Self {
            state: Some(state),
            ..Self::default()
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[async_trait]
pub trait GenerateHandler: Send + Sync {
    /// `None` means nothing to generate
    async fn generate(&self, ctx: &WorkContext) -> HandlerResult<Option<GeneratedContent>>;
}

#[async_trait]
pub trait SendHandler: Send + Sync {
    async fn send(&self, ctx: &WorkContext) -> HandlerResult<()>;
}

#[async_trait]
pub trait ReceiveHandler: Send + Sync {
    /// `None` means nothing received yet
    async fn receive(&self, ctx: &WorkContext) -> HandlerResult<Option<Vec<u8>>>;
}

#[async_trait]
pub trait ProcessHandler: Send + Sync {
    /// Optional message replacing the default success message
    async fn process(&self, ctx: &WorkContext) -> HandlerResult<Option<String>>;
}

#[async_trait]
pub trait CheckHandler: Send + Sync {
    async fn check(&self, ctx: &WorkContext) -> HandlerResult<CheckOutcome>;
}

#[async_trait]
pub trait ValidateHandler: Send + Sync {
    async fn validate(&self, ctx: &WorkContext, content: Option<&[u8]>) -> HandlerResult<()>;
}

/// An instantiated handler tagged with its capability
pub enum Handler {
    Generate(Box<dyn GenerateHandler>),
    Send(Box<dyn SendHandler>),
    Receive(Box<dyn ReceiveHandler>),
    Process(Box<dyn ProcessHandler>),
    Check(Box<dyn CheckHandler>),
    Validate(Box<dyn ValidateHandler>),
}

impl Handler {
    pub fn capability(&self) -> ExchangeAction {
        match self {
            Self::Generate(_) => ExchangeAction::Generate,
            Self::Send(_) => ExchangeAction::Send,
            Self::Receive(_) => ExchangeAction::Receive,
            Self::Process(_) => ExchangeAction::Process,
            Self::Check(_) => ExchangeAction::Check,
            Self::Validate(_) => ExchangeAction::Validate,
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler").field(&self.capability()).finish()
    }
}

type Factory<T> = Arc<dyn Fn(&WorkContext) -> Box<T> + Send + Sync>;

/// Builds a handler of one capability from a work context
#[derive(Clone)]
pub enum HandlerFactory {
    Generate(Factory<dyn GenerateHandler>),
    Send(Factory<dyn SendHandler>),
    Receive(Factory<dyn ReceiveHandler>),
    Process(Factory<dyn ProcessHandler>),
    Check(Factory<dyn CheckHandler>),
    Validate(Factory<dyn ValidateHandler>),
}

impl HandlerFactory {
    pub fn generate<H, F>(factory: F) -> Self
    where
        H: GenerateHandler + 'static,
        F: Fn(&WorkContext) -> H + Send + Sync + 'static,
    {
        Self::Generate(Arc::new(move |ctx: &WorkContext| -> Box<dyn GenerateHandler> {
            Box::new(factory(ctx))
        }))
    }

    pub fn send<H, F>(factory: F) -> Self
    where
        H: SendHandler + 'static,
        F: Fn(&WorkContext) -> H + Send + Sync + 'static,
    {
        Self::Send(Arc::new(move |ctx: &WorkContext| -> Box<dyn SendHandler> {
            Box::new(factory(ctx))
        }))
    }

    pub fn receive<H, F>(factory: F) -> Self
    where
        H: ReceiveHandler + 'static,
        F: Fn(&WorkContext) -> H + Send + Sync + 'static,
    {
        Self::Receive(Arc::new(move |ctx: &WorkContext| -> Box<dyn ReceiveHandler> {
            Box::new(factory(ctx))
        }))
    }

    pub fn process<H, F>(factory: F) -> Self
    where
        H: ProcessHandler + 'static,
        F: Fn(&WorkContext) -> H + Send + Sync + 'static,
    {
        Self::Process(Arc::new(move |ctx: &WorkContext| -> Box<dyn ProcessHandler> {
            Box::new(factory(ctx))
        }))
    }

    pub fn check<H, F>(factory: F) -> Self
    where
        H: CheckHandler + 'static,
        F: Fn(&WorkContext) -> H + Send + Sync + 'static,
    {
        Self::Check(Arc::new(move |ctx: &WorkContext| -> Box<dyn CheckHandler> {
            Box::new(factory(ctx))
        }))
    }

    pub fn validate<H, F>(factory: F) -> Self
    where
        H: ValidateHandler + 'static,
        F: Fn(&WorkContext) -> H + Send + Sync + 'static,
    {
        Self::Validate(Arc::new(move |ctx: &WorkContext| -> Box<dyn ValidateHandler> {
            Box::new(factory(ctx))
        }))
    }

    /// Action key this factory's handlers serve
    pub fn capability(&self) -> ExchangeAction {
        match self {
            Self::Generate(_) => ExchangeAction::Generate,
            Self::Send(_) => ExchangeAction::Send,
            Self::Receive(_) => ExchangeAction::Receive,
            Self::Process(_) => ExchangeAction::Process,
            Self::Check(_) => ExchangeAction::Check,
            Self::Validate(_) => ExchangeAction::Validate,
        }
    }

    pub fn instantiate(&self, ctx: &WorkContext) -> Handler {
        match self {
            Self::Generate(factory) => Handler::Generate(factory(ctx)),
            Self::Send(factory) => Handler::Send(factory(ctx)),
            Self::Receive(factory) => Handler::Receive(factory(ctx)),
            Self::Process(factory) => Handler::Process(factory(ctx)),
            Self::Check(factory) => Handler::Check(factory(ctx)),
            Self::Validate(factory) => Handler::Validate(factory(ctx)),
        }
    }
}

impl fmt::Debug for HandlerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HandlerFactory")
            .field(&self.capability())
            .finish()
    }
}

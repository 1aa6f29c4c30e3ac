use async_trait::async_trait;
use edi_core::constants::{ExchangeAction, StatusMessage};
use edi_core::events::{ExchangeNotifier, NotificationError};
use edi_core::models::{ExchangeRecord, RecordId};
use edi_core::orchestration::{HandlerError, HandlerResult};
use edi_core::registry::{
    CheckHandler, CheckOutcome, GenerateHandler, GeneratedContent, ProcessHandler,
    ReceiveHandler, SendHandler, ValidateHandler, WorkContext,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Queue of results a scripted handler returns, one per call.
///
/// Once the queue is empty every call returns the fallback value.
pub struct Script<T> {
    results: Mutex<VecDeque<HandlerResult<T>>>,
    fallback: T,
    calls: AtomicUsize,
    contexts: Mutex<Vec<WorkContext>>,
}

impl<T: Clone> Script<T> {
    pub fn new(fallback: T) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(VecDeque::new()),
            fallback,
            calls: AtomicUsize::new(0),
            contexts: Mutex::new(Vec::new()),
        })
    }

    pub fn push_ok(&self, value: T) -> &Self {
        self.results.lock().push_back(Ok(value));
        self
    }

    pub fn push_err(&self, error: HandlerError) -> &Self {
        self.results.lock().push_back(Err(error));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Work contexts the handler was invoked with
    pub fn contexts(&self) -> Vec<WorkContext> {
        self.contexts.lock().clone()
    }

    fn next(&self, ctx: &WorkContext) -> HandlerResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.contexts.lock().push(ctx.clone());
        self.results
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

pub struct ScriptedGenerate(pub Arc<Script<Option<GeneratedContent>>>);

#[async_trait]
impl GenerateHandler for ScriptedGenerate {
    async fn generate(&self, ctx: &WorkContext) -> HandlerResult<Option<GeneratedContent>> {
        self.0.next(ctx)
    }
}

pub struct ScriptedSend(pub Arc<Script<()>>);

#[async_trait]
impl SendHandler for ScriptedSend {
    async fn send(&self, ctx: &WorkContext) -> HandlerResult<()> {
        self.0.next(ctx)
    }
}

pub struct ScriptedReceive(pub Arc<Script<Option<Vec<u8>>>>);

#[async_trait]
impl ReceiveHandler for ScriptedReceive {
    async fn receive(&self, ctx: &WorkContext) -> HandlerResult<Option<Vec<u8>>> {
        self.0.next(ctx)
    }
}

pub struct ScriptedProcess(pub Arc<Script<Option<String>>>);

#[async_trait]
impl ProcessHandler for ScriptedProcess {
    async fn process(&self, ctx: &WorkContext) -> HandlerResult<Option<String>> {
        self.0.next(ctx)
    }
}

pub struct ScriptedCheck(pub Arc<Script<CheckOutcome>>);

#[async_trait]
impl CheckHandler for ScriptedCheck {
    async fn check(&self, ctx: &WorkContext) -> HandlerResult<CheckOutcome> {
        self.0.next(ctx)
    }
}

/// Validator that also remembers the content it was given
pub struct ScriptedValidate {
    pub script: Arc<Script<()>>,
    pub seen: Arc<Mutex<Vec<Option<Vec<u8>>>>>,
}

#[async_trait]
impl ValidateHandler for ScriptedValidate {
    async fn validate(&self, ctx: &WorkContext, content: Option<&[u8]>) -> HandlerResult<()> {
        self.seen.lock().push(content.map(<[u8]>::to_vec));
        self.script.next(ctx)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    ActionComplete {
        record_id: RecordId,
        action: ExchangeAction,
        message: Option<String>,
    },
    Error {
        record_id: RecordId,
        message: StatusMessage,
    },
    Done {
        record_id: RecordId,
    },
}

/// Notifier keeping every notification in memory
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().clone()
    }

    pub fn completions(&self, action: ExchangeAction) -> usize {
        self.notifications
            .lock()
            .iter()
            .filter(|n| matches!(n, Notification::ActionComplete { action: a, .. } if *a == action))
            .count()
    }

    pub fn errors(&self) -> usize {
        self.notifications
            .lock()
            .iter()
            .filter(|n| matches!(n, Notification::Error { .. }))
            .count()
    }

    pub fn dones(&self) -> usize {
        self.notifications
            .lock()
            .iter()
            .filter(|n| matches!(n, Notification::Done { .. }))
            .count()
    }

    /// Make every delivery fail after recording it
    pub fn fail_deliveries(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    fn record(&self, notification: Notification) -> Result<(), NotificationError> {
        self.notifications.lock().push(notification);
        if self.failing.load(Ordering::SeqCst) {
            Err(NotificationError::Delivery("mail server down".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ExchangeNotifier for RecordingNotifier {
    async fn notify_action_complete(
        &self,
        record: &ExchangeRecord,
        action: ExchangeAction,
        message: Option<&str>,
    ) -> Result<(), NotificationError> {
        self.record(Notification::ActionComplete {
            record_id: record.id,
            action,
            message: message.map(str::to_string),
        })
    }

    async fn notify_error(
        &self,
        record: &ExchangeRecord,
        message: StatusMessage,
    ) -> Result<(), NotificationError> {
        self.record(Notification::Error {
            record_id: record.id,
            message,
        })
    }

    async fn notify_done(&self, record: &ExchangeRecord) -> Result<(), NotificationError> {
        self.record(Notification::Done {
            record_id: record.id,
        })
    }
}

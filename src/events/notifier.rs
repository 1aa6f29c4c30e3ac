use super::{EventPublisher, ExchangeNotifier, NotificationError};
use crate::constants::{events, ExchangeAction, StatusMessage};
use crate::models::{BackendId, ExchangeRecord, RecordId};
use crate::state_machine::ExchangeState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Context attached to every published exchange event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeEventPayload {
    pub record_id: RecordId,
    pub identifier: String,
    pub backend_id: BackendId,
    pub type_code: String,
    pub state: ExchangeState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<ExchangeAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_key: Option<String>,
}

impl ExchangeEventPayload {
    pub fn for_record(record: &ExchangeRecord) -> Self {
        Self {
            record_id: record.id,
            identifier: record.identifier.clone(),
            backend_id: record.backend_id,
            type_code: record.type_code.clone(),
            state: record.state,
            action: None,
            message: None,
            message_key: None,
        }
    }
}

/// Notifier publishing exchange events on an [`EventPublisher`]
#[derive(Debug, Clone, Default)]
pub struct EventPublisherNotifier {
    publisher: EventPublisher,
}

impl EventPublisherNotifier {
    pub fn new(publisher: EventPublisher) -> Self {
        Self { publisher }
    }

    pub fn publisher(&self) -> &EventPublisher {
        &self.publisher
    }

    fn publish(&self, name: &str, payload: ExchangeEventPayload) -> Result<(), NotificationError> {
        self.publisher.publish(name, serde_json::to_value(payload)?)
    }
}

#[async_trait]
impl ExchangeNotifier for EventPublisherNotifier {
    async fn notify_action_complete(
        &self,
        record: &ExchangeRecord,
        action: ExchangeAction,
        message: Option<&str>,
    ) -> Result<(), NotificationError> {
        let payload = ExchangeEventPayload {
            action: Some(action),
            message: message.map(str::to_string),
            ..ExchangeEventPayload::for_record(record)
        };
        self.publish(events::action_completed(action), payload)
    }

    async fn notify_error(
        &self,
        record: &ExchangeRecord,
        message: StatusMessage,
    ) -> Result<(), NotificationError> {
        let payload = ExchangeEventPayload {
            message: Some(message.text().to_string()),
            message_key: Some(message.key().to_string()),
            ..ExchangeEventPayload::for_record(record)
        };
        self.publish(events::EXCHANGE_ERROR, payload)
    }

    async fn notify_done(&self, record: &ExchangeRecord) -> Result<(), NotificationError> {
        self.publish(events::EXCHANGE_DONE, ExchangeEventPayload::for_record(record))
    }
}

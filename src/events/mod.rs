//! # Exchange Notifications
//!
//! The [`ExchangeNotifier`] seam used by the lifecycle state machine, and a
//! notifier publishing on a tokio broadcast channel. Notification failures are
//! logged by the caller and never affect record state.

pub mod notifier;
pub mod publisher;

pub use notifier::{EventPublisherNotifier, ExchangeEventPayload};
pub use publisher::{EventPublisher, PublishedEvent};

use crate::constants::{ExchangeAction, StatusMessage};
use crate::models::ExchangeRecord;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Event channel is closed")]
    ChannelClosed,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait ExchangeNotifier: Send + Sync {
    /// A lifecycle action finished without raising
    async fn notify_action_complete(
        &self,
        record: &ExchangeRecord,
        action: ExchangeAction,
        message: Option<&str>,
    ) -> Result<(), NotificationError>;

    /// A record entered an error state
    async fn notify_error(
        &self,
        record: &ExchangeRecord,
        message: StatusMessage,
    ) -> Result<(), NotificationError>;

    /// A record reached its final successful state
    async fn notify_done(&self, record: &ExchangeRecord) -> Result<(), NotificationError>;
}

//! # System Constants
//!
//! Action keys, status messages and event names shared by the state machine,
//! the synchronizer and the notification layer.

use serde::{Deserialize, Serialize};
use std::fmt;

// Re-export state types for convenience
pub use crate::state_machine::ExchangeState;

/// Keys under which handlers are resolved and lifecycle actions are dispatched.
///
/// `Validate` is a handler key only: it is never dispatched as a job and is not
/// accepted by [`ExchangeAction::parse_lifecycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeAction {
    Generate,
    Send,
    Receive,
    Process,
    Check,
    Validate,
}

impl ExchangeAction {
    /// Actions that can be triggered on a record.
    pub const LIFECYCLE: [ExchangeAction; 5] = [
        Self::Generate,
        Self::Send,
        Self::Process,
        Self::Receive,
        Self::Check,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generate => "generate",
            Self::Send => "send",
            Self::Receive => "receive",
            Self::Process => "process",
            Self::Check => "check",
            Self::Validate => "validate",
        }
    }

    pub fn is_lifecycle(&self) -> bool {
        !matches!(self, Self::Validate)
    }

    /// Parse a lifecycle action name, rejecting `validate` and unknown names.
    pub fn parse_lifecycle(value: &str) -> Option<Self> {
        Self::LIFECYCLE
            .into_iter()
            .find(|action| action.as_str() == value)
    }
}

impl fmt::Display for ExchangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExchangeAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generate" => Ok(Self::Generate),
            "send" => Ok(Self::Send),
            "receive" => Ok(Self::Receive),
            "process" => Ok(Self::Process),
            "check" => Ok(Self::Check),
            "validate" => Ok(Self::Validate),
            _ => Err(format!("Invalid exchange action: {s}")),
        }
    }
}

/// Human-readable status messages attached to action outcomes and notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusMessage {
    GenerateOk,
    ValidateKo,
    SendOk,
    SendKo,
    ReceiveOk,
    ReceiveKo,
    ProcessOk,
    ProcessKo,
}

impl StatusMessage {
    pub fn key(&self) -> &'static str {
        match self {
            Self::GenerateOk => "generate_ok",
            Self::ValidateKo => "validate_ko",
            Self::SendOk => "send_ok",
            Self::SendKo => "send_ko",
            Self::ReceiveOk => "receive_ok",
            Self::ReceiveKo => "receive_ko",
            Self::ProcessOk => "process_ok",
            Self::ProcessKo => "process_ko",
        }
    }

    pub fn text(&self) -> &'static str {
        match self {
            Self::GenerateOk => "Exchange data generated",
            Self::ValidateKo => "Exchange not valid",
            Self::SendOk => "Exchange sent",
            Self::SendKo => {
                "An error happened while sending. Please check exchange record info."
            }
            Self::ReceiveOk => "Exchange received successfully",
            Self::ReceiveKo => "Exchange not received",
            Self::ProcessOk => "Exchange processed successfully",
            Self::ProcessKo => "Exchange processed with errors",
        }
    }
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Results returned when an action's state guard turns it into a no-op.
pub mod noop_messages {
    pub const ALREADY_SENT: &str = "Nothing to do. Likely already sent.";
    pub const ALREADY_RECEIVED: &str = "Nothing to do. Likely already received.";
    pub const ALREADY_PROCESSED: &str = "Nothing to do. Likely already processed.";
    pub const NOTHING_RECEIVED: &str = "Nothing received yet.";
    pub const NOTHING_GENERATED: &str = "Nothing generated.";
}

/// Event names published by the notification layer.
pub mod events {
    pub const EXCHANGE_GENERATE_COMPLETED: &str = "edi.exchange.generate.completed";
    pub const EXCHANGE_SEND_COMPLETED: &str = "edi.exchange.send.completed";
    pub const EXCHANGE_RECEIVE_COMPLETED: &str = "edi.exchange.receive.completed";
    pub const EXCHANGE_PROCESS_COMPLETED: &str = "edi.exchange.process.completed";
    pub const EXCHANGE_CHECK_COMPLETED: &str = "edi.exchange.check.completed";
    pub const EXCHANGE_ERROR: &str = "edi.exchange.error";
    pub const EXCHANGE_DONE: &str = "edi.exchange.done";

    use super::ExchangeAction;

    /// Completion event name for a lifecycle action.
    pub fn action_completed(action: ExchangeAction) -> &'static str {
        match action {
            ExchangeAction::Generate => EXCHANGE_GENERATE_COMPLETED,
            ExchangeAction::Send => EXCHANGE_SEND_COMPLETED,
            ExchangeAction::Receive => EXCHANGE_RECEIVE_COMPLETED,
            ExchangeAction::Process => EXCHANGE_PROCESS_COMPLETED,
            ExchangeAction::Check | ExchangeAction::Validate => EXCHANGE_CHECK_COMPLETED,
        }
    }
}

/// System-wide defaults used when configuration does not override them.
pub mod system {
    pub const DEFAULT_ENCODING: &str = "UTF-8";
    pub const DEFAULT_JOB_PRIORITY: u8 = 10;
    pub const CHAINED_SEND_PRIORITY: u8 = 0;
    pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1000;
    pub const IDENTIFIER_PREFIX: &str = "EDI";
    /// Extra environment key always injected into a handler's work context.
    pub const FRAMEWORK_ACTION_KEY: &str = "edi_framework_action";
}

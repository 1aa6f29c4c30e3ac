use serde::{Deserialize, Serialize};
use std::fmt;

/// Exchange record state definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeState {
    /// Initial state when the record is created
    New,
    /// Output generated and waiting to be sent
    OutputPending,
    /// Output sent, waiting for a confirmation or a check
    OutputSent,
    /// Output sent and processed by the counterpart
    OutputSentAndProcessed,
    /// Sending failed with a recordable error
    OutputErrorOnSend,
    /// Output sent but the counterpart reported an error
    OutputSentAndError,
    /// Generated or received content was rejected by validation
    ValidateError,
    /// Input waiting to be received
    InputPending,
    /// Receiving failed with a recordable error
    InputReceiveError,
    /// Input received and waiting to be processed
    InputReceived,
    /// Input processed successfully
    InputProcessed,
    /// Processing failed with a recordable error
    InputProcessedError,
}

impl ExchangeState {
    pub const ALL: [ExchangeState; 12] = [
        Self::New,
        Self::OutputPending,
        Self::OutputSent,
        Self::OutputSentAndProcessed,
        Self::OutputErrorOnSend,
        Self::OutputSentAndError,
        Self::ValidateError,
        Self::InputPending,
        Self::InputReceiveError,
        Self::InputReceived,
        Self::InputProcessed,
        Self::InputProcessedError,
    ];

    /// Check if this is a terminal success state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::OutputSentAndProcessed | Self::InputProcessed)
    }

    /// Check if this is an error state; error states are retry points, never terminal
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::OutputErrorOnSend
                | Self::OutputSentAndError
                | Self::ValidateError
                | Self::InputReceiveError
                | Self::InputProcessedError
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::OutputPending => "output_pending",
            Self::OutputSent => "output_sent",
            Self::OutputSentAndProcessed => "output_sent_and_processed",
            Self::OutputErrorOnSend => "output_error_on_send",
            Self::OutputSentAndError => "output_sent_and_error",
            Self::ValidateError => "validate_error",
            Self::InputPending => "input_pending",
            Self::InputReceiveError => "input_receive_error",
            Self::InputReceived => "input_received",
            Self::InputProcessed => "input_processed",
            Self::InputProcessedError => "input_processed_error",
        }
    }
}

impl fmt::Display for ExchangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExchangeState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("Invalid exchange state: {s}"))
    }
}

/// Default state for new exchange records
impl Default for ExchangeState {
    fn default() -> Self {
        Self::New
    }
}

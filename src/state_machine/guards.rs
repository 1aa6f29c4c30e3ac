use super::errors::{wrong_direction, GuardError, GuardResult};
use super::states::ExchangeState;
use crate::models::{ExchangeDirection, ExchangeRecord, ExchangeType};

/// Precondition of a lifecycle action.
///
/// `Err` is a guard violation and aborts the action. `Ok(false)` means the
/// record is not in a state the action applies to and the action is a no-op.
pub trait ActionGuard {
    fn check(&self, record: &ExchangeRecord, exchange_type: &ExchangeType) -> GuardResult<bool>;

    /// Get a description of this guard for logging
    fn description(&self) -> &'static str;
}

fn require_direction(record: &ExchangeRecord, expected: ExchangeDirection) -> GuardResult<()> {
    if record.direction == expected {
        Ok(())
    } else {
        Err(wrong_direction(record.id, expected, record.direction))
    }
}

/// Output record without a file, unless regeneration is forced
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateGuard {
    pub force: bool,
}

impl ActionGuard for GenerateGuard {
    fn check(&self, record: &ExchangeRecord, _exchange_type: &ExchangeType) -> GuardResult<bool> {
        require_direction(record, ExchangeDirection::Output)?;
        if record.has_file() && !self.force {
            return Err(GuardError::FileAlreadyPresent {
                record_id: record.id,
            });
        }
        Ok(true)
    }

    fn description(&self) -> &'static str {
        "Output record without file (or forced regeneration)"
    }
}

/// Output record with a file, pending or failed on send
#[derive(Debug, Clone, Copy, Default)]
pub struct SendGuard;

impl SendGuard {
    pub const STATES: [ExchangeState; 2] =
        [ExchangeState::OutputPending, ExchangeState::OutputErrorOnSend];
}

impl ActionGuard for SendGuard {
    fn check(&self, record: &ExchangeRecord, _exchange_type: &ExchangeType) -> GuardResult<bool> {
        require_direction(record, ExchangeDirection::Output)?;
        if !record.has_file() {
            return Err(GuardError::FileMissing {
                record_id: record.id,
            });
        }
        Ok(Self::STATES.contains(&record.state))
    }

    fn description(&self) -> &'static str {
        "Output record with file in a sendable state"
    }
}

/// Input record waiting for content
#[derive(Debug, Clone, Copy, Default)]
pub struct ReceiveGuard;

impl ReceiveGuard {
    pub const STATES: [ExchangeState; 2] =
        [ExchangeState::InputPending, ExchangeState::InputReceiveError];
}

impl ActionGuard for ReceiveGuard {
    fn check(&self, record: &ExchangeRecord, _exchange_type: &ExchangeType) -> GuardResult<bool> {
        require_direction(record, ExchangeDirection::Input)?;
        Ok(Self::STATES.contains(&record.state))
    }

    fn description(&self) -> &'static str {
        "Input record in a receivable state"
    }
}

/// Received input record, with a file unless the type allows empty files
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessGuard;

impl ProcessGuard {
    pub const STATES: [ExchangeState; 2] = [
        ExchangeState::InputReceived,
        ExchangeState::InputProcessedError,
    ];
}

impl ActionGuard for ProcessGuard {
    fn check(&self, record: &ExchangeRecord, exchange_type: &ExchangeType) -> GuardResult<bool> {
        require_direction(record, ExchangeDirection::Input)?;
        if !record.has_file() && !exchange_type.allow_empty_files_on_receive {
            return Err(GuardError::EmptyFileNotAllowed {
                record_id: record.id,
            });
        }
        Ok(Self::STATES.contains(&record.state))
    }

    fn description(&self) -> &'static str {
        "Received input record in a processable state"
    }
}

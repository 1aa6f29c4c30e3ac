use crate::models::{ExchangeDirection, RecordId};
use thiserror::Error;

/// Precondition failures of lifecycle actions.
///
/// Raised before any handler runs; the record is never touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    #[error("Record {record_id} has direction {actual}, action requires {expected}")]
    WrongDirection {
        record_id: RecordId,
        expected: ExchangeDirection,
        actual: ExchangeDirection,
    },

    #[error("Record {record_id} has no file")]
    FileMissing { record_id: RecordId },

    #[error("Record {record_id} already has a file, use force to regenerate")]
    FileAlreadyPresent { record_id: RecordId },

    #[error("Record {record_id} has no file and its exchange type does not allow empty files")]
    EmptyFileNotAllowed { record_id: RecordId },
}

pub type GuardResult<T> = Result<T, GuardError>;

pub fn wrong_direction(
    record_id: RecordId,
    expected: ExchangeDirection,
    actual: ExchangeDirection,
) -> GuardError {
    GuardError::WrongDirection {
        record_id,
        expected,
        actual,
    }
}

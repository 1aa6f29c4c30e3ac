use super::{BackendId, ExchangeDirection, ExchangeTypeId, RecordId};
use crate::constants::system;
use crate::encoding::{decode_at_rest, encode_at_rest, EncodingError};
use crate::state_machine::ExchangeState;
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// File content attached to an exchange record.
///
/// Opaque bytes in memory, base64 at rest. Never empty: empty content is
/// represented by the absence of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeFile(Vec<u8>);

impl ExchangeFile {
    /// Wrap content, returning `None` for empty content.
    pub fn from_bytes(content: Vec<u8>) -> Option<Self> {
        if content.is_empty() {
            None
        } else {
            Some(Self(content))
        }
    }

    pub fn from_base64(encoded: &str) -> Result<Option<Self>, EncodingError> {
        decode_at_rest(encoded).map(Self::from_bytes)
    }

    pub fn to_base64(&self) -> String {
        encode_at_rest(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl Serialize for ExchangeFile {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for ExchangeFile {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        let encoded = String::deserialize(deserializer)?;
        Self::from_base64(&encoded)
            .map_err(D::Error::custom)?
            .ok_or_else(|| D::Error::custom("exchange file content cannot be empty"))
    }
}

/// One unit of work: one document, one direction, one backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRecord {
    pub id: RecordId,
    pub identifier: String,
    pub backend_id: BackendId,
    pub type_id: ExchangeTypeId,
    pub type_code: String,
    pub direction: ExchangeDirection,
    pub state: ExchangeState,
    pub file: Option<ExchangeFile>,
    pub error: Option<String>,
    pub exchanged_on: Option<DateTime<Utc>>,
    /// Business document this exchange relates to
    pub model: Option<String>,
    pub res_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExchangeRecord {
    pub fn has_file(&self) -> bool {
        self.file.is_some()
    }

    pub fn file_bytes(&self) -> Option<&[u8]> {
        self.file.as_ref().map(ExchangeFile::as_bytes)
    }

    /// Default identifier, e.g. `EDI/2026/00042`
    pub fn default_identifier(id: RecordId, created_at: DateTime<Utc>) -> String {
        format!(
            "{}/{}/{:05}",
            system::IDENTIFIER_PREFIX,
            created_at.year(),
            id
        )
    }
}

/// Values for a record about to be created.
///
/// Built by [`crate::orchestration::ExchangeBackend::create_record`], which fills
/// backend, type and direction from the resolved exchange type.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExchangeRecord {
    pub identifier: Option<String>,
    pub backend_id: BackendId,
    pub type_id: ExchangeTypeId,
    pub type_code: String,
    pub direction: ExchangeDirection,
    /// `new`, or `input_pending` for input announced by a partner
    pub state: ExchangeState,
    pub model: Option<String>,
    pub res_id: Option<i64>,
}

/// Caller-supplied values for record creation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeRecordValues {
    pub identifier: Option<String>,
    pub model: Option<String>,
    pub res_id: Option<i64>,
    /// Create an input record directly in `input_pending`
    pub awaiting_input: bool,
}

impl ExchangeRecordValues {
    pub fn for_document(model: impl Into<String>, res_id: i64) -> Self {
        Self {
            identifier: None,
            model: Some(model.into()),
            res_id: Some(res_id),
            awaiting_input: false,
        }
    }

    pub fn awaiting_input(mut self) -> Self {
        self.awaiting_input = true;
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }
}

/// A single atomic write of the lifecycle-controlled fields of a record.
///
/// Only the state machine builds updates, which keeps it the sole writer of
/// state, error, file and exchange timestamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordUpdate {
    state: Option<ExchangeState>,
    error: Option<Option<String>>,
    file: Option<Option<ExchangeFile>>,
    exchanged_on: Option<DateTime<Utc>>,
}

impl RecordUpdate {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn state(mut self, state: ExchangeState) -> Self {
        self.state = Some(state);
        self
    }

    pub(crate) fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(Some(error.into()));
        self
    }

    pub(crate) fn clear_error(mut self) -> Self {
        self.error = Some(None);
        self
    }

    pub(crate) fn file(mut self, file: Option<ExchangeFile>) -> Self {
        self.file = Some(file);
        self
    }

    pub(crate) fn stamp(mut self, at: DateTime<Utc>) -> Self {
        self.exchanged_on = Some(at);
        self
    }

    pub fn new_state(&self) -> Option<ExchangeState> {
        self.state
    }

    /// `Some(None)` clears the error, `None` leaves it untouched
    pub fn new_error(&self) -> Option<Option<&str>> {
        self.error.as_ref().map(Option::as_deref)
    }

    pub fn new_file(&self) -> Option<Option<&ExchangeFile>> {
        self.file.as_ref().map(Option::as_ref)
    }

    pub fn new_exchanged_on(&self) -> Option<DateTime<Utc>> {
        self.exchanged_on
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_none()
            && self.error.is_none()
            && self.file.is_none()
            && self.exchanged_on.is_none()
    }

    /// Apply the update to an in-memory record.
    pub fn apply_to(&self, record: &mut ExchangeRecord) {
        if let Some(state) = self.state {
            record.state = state;
        }
        if let Some(error) = &self.error {
            record.error = error.clone();
        }
        if let Some(file) = &self.file {
            record.file = file.clone();
        }
        if let Some(at) = self.exchanged_on {
            record.exchanged_on = Some(at);
        }
        record.updated_at = Utc::now();
    }
}

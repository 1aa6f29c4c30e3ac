//! # Exchange Models
//!
//! Backends, exchange types and exchange records, plus the catalog of configured
//! backends and exchange types.

pub mod backend;
pub mod catalog;
pub mod exchange_record;
pub mod exchange_type;

pub type RecordId = i64;
pub type BackendId = i64;
pub type ExchangeTypeId = i64;

pub use backend::Backend;
pub use catalog::ExchangeCatalog;
pub use exchange_record::{
    ExchangeFile, ExchangeRecord, ExchangeRecordValues, NewExchangeRecord, RecordUpdate,
};
pub use exchange_type::{ExchangeDirection, ExchangeType, HandlerOverride};

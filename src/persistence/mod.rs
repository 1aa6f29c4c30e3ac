//! # Record Persistence
//!
//! The [`ExchangeStore`] seam between the lifecycle engine and record storage,
//! the declarative [`Domain`] filter used for selections, and two stores: an
//! in-memory one and a PostgreSQL one.

pub mod domain;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod store;

pub use domain::{Domain, Field, FieldValue};
pub use memory::InMemoryExchangeStore;
#[cfg(feature = "postgres")]
pub use postgres::PgExchangeStore;
pub use store::ExchangeStore;

use crate::models::RecordId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Exchange record {0} not found")]
    RecordNotFound(RecordId),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Stored exchange record {record_id} is invalid: {reason}")]
    CorruptRecord { record_id: RecordId, reason: String },
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

use super::{Domain, PersistenceResult};
use crate::models::{ExchangeRecord, NewExchangeRecord, RecordId, RecordUpdate};
use async_trait::async_trait;

/// Storage of exchange records.
///
/// Every lifecycle action performs exactly one [`ExchangeStore::write`] per
/// invocation, so implementations must apply an update atomically.
#[async_trait]
pub trait ExchangeStore: Send + Sync {
    /// Insert a record in state `new`, assigning id and default identifier
    async fn create(&self, record: NewExchangeRecord) -> PersistenceResult<ExchangeRecord>;

    async fn find(&self, id: RecordId) -> PersistenceResult<Option<ExchangeRecord>>;

    /// Apply an update and return the record as written
    async fn write(
        &self,
        id: RecordId,
        update: &RecordUpdate,
    ) -> PersistenceResult<ExchangeRecord>;

    /// Records matching the domain, ordered by id
    async fn search(&self, domain: &Domain) -> PersistenceResult<Vec<ExchangeRecord>>;

    async fn count(&self, domain: &Domain) -> PersistenceResult<i64>;

    /// Fetch a record that must exist
    async fn get(&self, id: RecordId) -> PersistenceResult<ExchangeRecord> {
        self.find(id)
            .await?
            .ok_or(super::PersistenceError::RecordNotFound(id))
    }
}

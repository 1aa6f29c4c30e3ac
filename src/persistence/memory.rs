use super::{Domain, ExchangeStore, PersistenceError, PersistenceResult};
use crate::models::{ExchangeRecord, NewExchangeRecord, RecordId, RecordUpdate};
use crate::state_machine::ExchangeState;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};

/// Concurrent in-memory record store
#[derive(Debug)]
pub struct InMemoryExchangeStore {
    records: DashMap<RecordId, ExchangeRecord>,
    next_id: AtomicI64,
}

impl InMemoryExchangeStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for InMemoryExchangeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeStore for InMemoryExchangeStore {
    async fn create(&self, record: NewExchangeRecord) -> PersistenceResult<ExchangeRecord> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let created = ExchangeRecord {
            id,
            identifier: record
                .identifier
                .unwrap_or_else(|| ExchangeRecord::default_identifier(id, now)),
            backend_id: record.backend_id,
            type_id: record.type_id,
            type_code: record.type_code,
            direction: record.direction,
            state: record.state,
            file: None,
            error: None,
            exchanged_on: None,
            model: record.model,
            res_id: record.res_id,
            created_at: now,
            updated_at: now,
        };
        self.records.insert(id, created.clone());
        Ok(created)
    }

    async fn find(&self, id: RecordId) -> PersistenceResult<Option<ExchangeRecord>> {
        Ok(self.records.get(&id).map(|entry| entry.value().clone()))
    }

    async fn write(
        &self,
        id: RecordId,
        update: &RecordUpdate,
    ) -> PersistenceResult<ExchangeRecord> {
        let mut entry = self
            .records
            .get_mut(&id)
            .ok_or(PersistenceError::RecordNotFound(id))?;
        update.apply_to(entry.value_mut());
        Ok(entry.value().clone())
    }

    async fn search(&self, domain: &Domain) -> PersistenceResult<Vec<ExchangeRecord>> {
        let mut records: Vec<ExchangeRecord> = self
            .records
            .iter()
            .filter(|entry| domain.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by_key(|record| record.id);
        Ok(records)
    }

    async fn count(&self, domain: &Domain) -> PersistenceResult<i64> {
        let count = self
            .records
            .iter()
            .filter(|entry| domain.matches(entry.value()))
            .count();
        Ok(count as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExchangeDirection, ExchangeFile};
    use crate::persistence::Field;

    fn new_record(type_id: i64, direction: ExchangeDirection) -> NewExchangeRecord {
        NewExchangeRecord {
            identifier: None,
            backend_id: 1,
            type_id,
            type_code: "INVOICE_OUT".to_string(),
            direction,
            state: ExchangeState::New,
            model: Some("account.move".to_string()),
            res_id: Some(3),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_ids_and_identifiers() {
        let store = InMemoryExchangeStore::new();
        let first = store.create(new_record(10, ExchangeDirection::Output)).await.unwrap();
        let second = store
            .create(NewExchangeRecord {
                identifier: Some("PARTNER-REF".to_string()),
                ..new_record(10, ExchangeDirection::Output)
            })
            .await
            .unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(first.state, ExchangeState::New);
        assert!(first.identifier.ends_with("/00001"));
        assert_eq!(second.identifier, "PARTNER-REF");
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_write_applies_update() {
        let store = InMemoryExchangeStore::new();
        let record = store.create(new_record(10, ExchangeDirection::Output)).await.unwrap();

        let update = RecordUpdate::new()
            .state(ExchangeState::OutputPending)
            .file(ExchangeFile::from_bytes(b"UNA:+.?".to_vec()))
            .clear_error();
        let written = store.write(record.id, &update).await.unwrap();

        assert_eq!(written.state, ExchangeState::OutputPending);
        assert_eq!(written.file_bytes(), Some(&b"UNA:+.?"[..]));
        assert_eq!(store.get(record.id).await.unwrap(), written);
    }

    #[tokio::test]
    async fn test_write_missing_record() {
        let store = InMemoryExchangeStore::new();
        let err = store.write(99, &RecordUpdate::new()).await.unwrap_err();
        assert!(matches!(err, PersistenceError::RecordNotFound(99)));
    }

    #[tokio::test]
    async fn test_search_and_count() {
        let store = InMemoryExchangeStore::new();
        store.create(new_record(10, ExchangeDirection::Output)).await.unwrap();
        store.create(new_record(11, ExchangeDirection::Input)).await.unwrap();
        store.create(new_record(10, ExchangeDirection::Output)).await.unwrap();

        let domain = Domain::equal(Field::TypeId, 10i64);
        let found = store.search(&domain).await.unwrap();
        assert_eq!(found.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(store.count(&Domain::All).await.unwrap(), 3);
    }
}

//! PostgreSQL exchange record store.
//!
//! File content is stored base64-encoded in a text column. Updates are a single
//! `UPDATE ... RETURNING` statement, so each lifecycle write is atomic.

use super::{Domain, ExchangeStore, PersistenceError, PersistenceResult};
use crate::config::DatabaseConfig;
use crate::models::{
    ExchangeDirection, ExchangeFile, ExchangeRecord, NewExchangeRecord, RecordId, RecordUpdate,
};
use crate::state_machine::ExchangeState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use tracing::{debug, info};

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

const RECORD_COLUMNS: &str = "id, identifier, backend_id, type_id, type_code, direction, state, \
     file_content, error, exchanged_on, model, res_id, created_at, updated_at";

#[derive(Debug, Clone, FromRow)]
struct ExchangeRecordRow {
    id: i64,
    identifier: String,
    backend_id: i64,
    type_id: i64,
    type_code: String,
    direction: String,
    state: String,
    file_content: Option<String>,
    error: Option<String>,
    exchanged_on: Option<DateTime<Utc>>,
    model: Option<String>,
    res_id: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ExchangeRecordRow> for ExchangeRecord {
    type Error = PersistenceError;

    fn try_from(row: ExchangeRecordRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| PersistenceError::CorruptRecord {
            record_id: row.id,
            reason,
        };

        let direction = row.direction.parse::<ExchangeDirection>().map_err(corrupt)?;
        let state = row.state.parse::<ExchangeState>().map_err(corrupt)?;
        let file = match row.file_content.as_deref() {
            Some(encoded) => {
                ExchangeFile::from_base64(encoded).map_err(|e| corrupt(e.to_string()))?
            }
            None => None,
        };

        Ok(ExchangeRecord {
            id: row.id,
            identifier: row.identifier,
            backend_id: row.backend_id,
            type_id: row.type_id,
            type_code: row.type_code,
            direction,
            state,
            file,
            error: row.error,
            exchanged_on: row.exchanged_on,
            model: row.model,
            res_id: row.res_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PgExchangeStore {
    pool: PgPool,
}

impl PgExchangeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> PersistenceResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;
        info!(max_connections = config.max_connections, "Connected exchange record store");
        Ok(Self::new(pool))
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> PersistenceResult<()> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ExchangeStore for PgExchangeStore {
    async fn create(&self, record: NewExchangeRecord) -> PersistenceResult<ExchangeRecord> {
        let (id,): (i64,) = sqlx::query_as(
            "SELECT nextval(pg_get_serial_sequence('edi_exchange_records', 'id'))",
        )
        .fetch_one(&self.pool)
        .await?;

        let identifier = record
            .identifier
            .unwrap_or_else(|| ExchangeRecord::default_identifier(id, Utc::now()));

        let sql = format!(
            "INSERT INTO edi_exchange_records \
             (id, identifier, backend_id, type_id, type_code, direction, state, model, res_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {RECORD_COLUMNS}"
        );
        let row: ExchangeRecordRow = sqlx::query_as(&sql)
            .bind(id)
            .bind(identifier)
            .bind(record.backend_id)
            .bind(record.type_id)
            .bind(record.type_code)
            .bind(record.direction.as_str())
            .bind(record.state.as_str())
            .bind(record.model)
            .bind(record.res_id)
            .fetch_one(&self.pool)
            .await?;

        debug!(record_id = id, "Created exchange record");
        row.try_into()
    }

    async fn find(&self, id: RecordId) -> PersistenceResult<Option<ExchangeRecord>> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM edi_exchange_records WHERE id = $1");
        let row: Option<ExchangeRecordRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(ExchangeRecord::try_from).transpose()
    }

    async fn write(
        &self,
        id: RecordId,
        update: &RecordUpdate,
    ) -> PersistenceResult<ExchangeRecord> {
        let mut query =
            QueryBuilder::<Postgres>::new("UPDATE edi_exchange_records SET updated_at = NOW()");

        if let Some(state) = update.new_state() {
            query.push(", state = ").push_bind(state.as_str());
        }
        if let Some(error) = update.new_error() {
            query.push(", error = ").push_bind(error.map(str::to_string));
        }
        if let Some(file) = update.new_file() {
            query
                .push(", file_content = ")
                .push_bind(file.map(ExchangeFile::to_base64));
        }
        if let Some(at) = update.new_exchanged_on() {
            query.push(", exchanged_on = ").push_bind(at);
        }
        query
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" RETURNING ")
            .push(RECORD_COLUMNS);

        let row: Option<ExchangeRecordRow> = query
            .build_query_as()
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or(PersistenceError::RecordNotFound(id))?.try_into()
    }

    async fn search(&self, domain: &Domain) -> PersistenceResult<Vec<ExchangeRecord>> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {RECORD_COLUMNS} FROM edi_exchange_records WHERE "
        ));
        domain.push_sql(&mut query);
        query.push(" ORDER BY id");

        let rows: Vec<ExchangeRecordRow> = query.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(ExchangeRecord::try_from).collect()
    }

    async fn count(&self, domain: &Domain) -> PersistenceResult<i64> {
        let mut query =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM edi_exchange_records WHERE ");
        domain.push_sql(&mut query);

        let (count,): (i64,) = query.build_query_as().fetch_one(&self.pool).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::Field;

    async fn store() -> Option<PgExchangeStore> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let store = PgExchangeStore::connect(&DatabaseConfig {
            url,
            max_connections: 2,
        })
        .await
        .ok()?;
        store.migrate().await.ok()?;
        Some(store)
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_round_trip_through_postgres() {
        let Some(store) = store().await else {
            return;
        };

        let created = store
            .create(NewExchangeRecord {
                identifier: None,
                backend_id: 1,
                type_id: 10,
                type_code: "INVOICE_OUT".to_string(),
                direction: ExchangeDirection::Output,
                state: ExchangeState::New,
                model: None,
                res_id: None,
            })
            .await
            .unwrap();
        assert!(created.identifier.starts_with("EDI/"));

        let update = RecordUpdate::new()
            .state(ExchangeState::OutputPending)
            .file(ExchangeFile::from_bytes(b"UNB+UNOC:3".to_vec()));
        let written = store.write(created.id, &update).await.unwrap();
        assert_eq!(written.file_bytes(), Some(&b"UNB+UNOC:3"[..]));

        let pending = Domain::equal(Field::Id, created.id)
            .and(Domain::equal(Field::State, ExchangeState::OutputPending))
            .and(Domain::equal(Field::HasFile, true));
        assert_eq!(store.count(&pending).await.unwrap(), 1);
        assert_eq!(store.search(&pending).await.unwrap()[0].id, created.id);
    }
}

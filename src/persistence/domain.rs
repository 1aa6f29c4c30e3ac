//! # Record Domains
//!
//! Declarative filters over exchange records. A [`Domain`] is evaluated in
//! memory by [`Domain::matches`] and translated to a SQL predicate by
//! [`Domain::push_sql`], so every store applies the same selection semantics.

use crate::models::{ExchangeDirection, ExchangeRecord};
use crate::state_machine::ExchangeState;
use sqlx::{Postgres, QueryBuilder};

/// Filterable record fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Id,
    BackendId,
    TypeId,
    TypeCode,
    Direction,
    State,
    /// Whether file content is attached
    HasFile,
    Identifier,
    Model,
    ResId,
}

impl Field {
    fn column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::BackendId => "backend_id",
            Self::TypeId => "type_id",
            Self::TypeCode => "type_code",
            Self::Direction => "direction",
            Self::State => "state",
            Self::HasFile => "(file_content IS NOT NULL)",
            Self::Identifier => "identifier",
            Self::Model => "model",
            Self::ResId => "res_id",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Text(String),
    Bool(bool),
    Null,
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<ExchangeState> for FieldValue {
    fn from(value: ExchangeState) -> Self {
        Self::Text(value.as_str().to_string())
    }
}

impl From<ExchangeDirection> for FieldValue {
    fn from(value: ExchangeDirection) -> Self {
        Self::Text(value.as_str().to_string())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Compound record filter
#[derive(Debug, Clone, PartialEq)]
pub enum Domain {
    /// Matches every record
    All,
    Eq(Field, FieldValue),
    In(Field, Vec<FieldValue>),
    And(Vec<Domain>),
    Or(Vec<Domain>),
}

impl Domain {
    pub fn equal(field: Field, value: impl Into<FieldValue>) -> Self {
        Self::Eq(field, value.into())
    }

    pub fn is_in<V: Into<FieldValue>>(field: Field, values: impl IntoIterator<Item = V>) -> Self {
        Self::In(field, values.into_iter().map(Into::into).collect())
    }

    /// Conjunction of two domains, flattening nested conjunctions
    pub fn and(self, other: Domain) -> Self {
        match (self, other) {
            (Self::All, other) => other,
            (this, Self::All) => this,
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            }
            (Self::And(mut left), other) => {
                left.push(other);
                Self::And(left)
            }
            (this, other) => Self::And(vec![this, other]),
        }
    }

    pub fn or(self, other: Domain) -> Self {
        match (self, other) {
            (Self::Or(mut left), Self::Or(right)) => {
                left.extend(right);
                Self::Or(left)
            }
            (Self::Or(mut left), other) => {
                left.push(other);
                Self::Or(left)
            }
            (this, other) => Self::Or(vec![this, other]),
        }
    }

    /// Evaluate the domain against a record
    pub fn matches(&self, record: &ExchangeRecord) -> bool {
        match self {
            Self::All => true,
            Self::Eq(field, value) => field_value(record, *field) == *value,
            Self::In(field, values) => {
                let actual = field_value(record, *field);
                values.iter().any(|value| *value == actual)
            }
            Self::And(domains) => domains.iter().all(|domain| domain.matches(record)),
            Self::Or(domains) => domains.iter().any(|domain| domain.matches(record)),
        }
    }

    /// Append the domain as a SQL predicate with bound parameters
    pub fn push_sql(&self, query: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Self::All => {
                query.push("TRUE");
            }
            Self::Eq(field, FieldValue::Null) => {
                query.push(field.column()).push(" IS NULL");
            }
            Self::Eq(field, value) => {
                query.push(field.column()).push(" = ");
                push_bind_value(query, value);
            }
            Self::In(_, values) if values.is_empty() => {
                query.push("FALSE");
            }
            Self::In(field, values) => {
                query.push(field.column()).push(" IN (");
                let mut separated = false;
                for value in values {
                    if separated {
                        query.push(", ");
                    }
                    push_bind_value(query, value);
                    separated = true;
                }
                query.push(")");
            }
            Self::And(domains) => push_compound(query, domains, " AND ", "TRUE"),
            Self::Or(domains) => push_compound(query, domains, " OR ", "FALSE"),
        }
    }
}

fn push_compound(
    query: &mut QueryBuilder<'_, Postgres>,
    domains: &[Domain],
    operator: &str,
    empty: &str,
) {
    if domains.is_empty() {
        query.push(empty);
        return;
    }
    query.push("(");
    for (index, domain) in domains.iter().enumerate() {
        if index > 0 {
            query.push(operator);
        }
        domain.push_sql(query);
    }
    query.push(")");
}

fn push_bind_value(query: &mut QueryBuilder<'_, Postgres>, value: &FieldValue) {
    match value {
        FieldValue::Int(v) => {
            query.push_bind(*v);
        }
        FieldValue::Text(v) => {
            query.push_bind(v.clone());
        }
        FieldValue::Bool(v) => {
            query.push_bind(*v);
        }
        FieldValue::Null => {
            query.push("NULL");
        }
    }
}

fn field_value(record: &ExchangeRecord, field: Field) -> FieldValue {
    match field {
        Field::Id => FieldValue::Int(record.id),
        Field::BackendId => FieldValue::Int(record.backend_id),
        Field::TypeId => FieldValue::Int(record.type_id),
        Field::TypeCode => FieldValue::Text(record.type_code.clone()),
        Field::Direction => record.direction.into(),
        Field::State => record.state.into(),
        Field::HasFile => FieldValue::Bool(record.has_file()),
        Field::Identifier => FieldValue::Text(record.identifier.clone()),
        Field::Model => record.model.clone().into(),
        Field::ResId => record.res_id.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExchangeFile;
    use chrono::Utc;

    fn record(state: ExchangeState, file: Option<&[u8]>) -> ExchangeRecord {
        ExchangeRecord {
            id: 7,
            identifier: "EDI/2026/00007".to_string(),
            backend_id: 1,
            type_id: 10,
            type_code: "INVOICE_OUT".to_string(),
            direction: ExchangeDirection::Output,
            state,
            file: file.and_then(|bytes| ExchangeFile::from_bytes(bytes.to_vec())),
            error: None,
            exchanged_on: None,
            model: None,
            res_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_compound_matching() {
        let domain = Domain::equal(Field::BackendId, 1i64)
            .and(Domain::equal(Field::Direction, ExchangeDirection::Output))
            .and(Domain::is_in(
                Field::State,
                [ExchangeState::OutputPending, ExchangeState::OutputSentAndError],
            ));

        assert!(domain.matches(&record(ExchangeState::OutputPending, Some(b"x"))));
        assert!(!domain.matches(&record(ExchangeState::New, None)));
    }

    #[test]
    fn test_has_file_and_null_values() {
        let no_file = Domain::equal(Field::HasFile, false);
        assert!(no_file.matches(&record(ExchangeState::New, None)));
        assert!(!no_file.matches(&record(ExchangeState::New, Some(b"x"))));

        let fresh = record(ExchangeState::New, None);
        assert!(Domain::equal(Field::Model, None::<String>).matches(&fresh));
    }

    #[test]
    fn test_or_and_empty_in() {
        let domain = Domain::equal(Field::State, ExchangeState::New)
            .or(Domain::equal(Field::State, ExchangeState::OutputSent));
        assert!(domain.matches(&record(ExchangeState::OutputSent, None)));
        let fresh = record(ExchangeState::New, None);
        assert!(!Domain::is_in(Field::Id, Vec::<i64>::new()).matches(&fresh));
        assert_eq!(Domain::All.and(Domain::equal(Field::Id, 7i64)), Domain::equal(Field::Id, 7i64));
    }

    #[test]
    fn test_sql_translation() {
        let domain = Domain::equal(Field::BackendId, 1i64)
            .and(Domain::equal(Field::HasFile, false))
            .and(Domain::is_in(Field::Id, [3i64, 4]))
            .and(Domain::equal(Field::Model, None::<String>));

        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM edi_exchange_records WHERE ");
        domain.push_sql(&mut query);

        assert_eq!(
            query.sql(),
            "SELECT * FROM edi_exchange_records WHERE (backend_id = $1 AND \
             (file_content IS NOT NULL) = $2 AND id IN ($3, $4) AND model IS NULL)"
        );
    }
}

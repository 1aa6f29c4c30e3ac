//! Proptest strategies for exchange records, domains and handler registrations

use chrono::{TimeZone, Utc};
use edi_core::encoding::EncodingErrorPolicy;
use edi_core::models::{ExchangeDirection, ExchangeFile, ExchangeRecord};
use edi_core::persistence::{Domain, Field, FieldValue};
use edi_core::state_machine::ExchangeState;
use proptest::prelude::*;

pub fn exchange_state_strategy() -> impl Strategy<Value = ExchangeState> {
    prop::sample::select(ExchangeState::ALL.to_vec())
}

pub fn direction_strategy() -> impl Strategy<Value = ExchangeDirection> {
    prop_oneof![Just(ExchangeDirection::Input), Just(ExchangeDirection::Output)]
}

pub fn encoding_policy_strategy() -> impl Strategy<Value = EncodingErrorPolicy> {
    prop_oneof![
        Just(EncodingErrorPolicy::Strict),
        Just(EncodingErrorPolicy::Replace),
        Just(EncodingErrorPolicy::Ignore),
        Just(EncodingErrorPolicy::XmlCharRefReplace),
    ]
}

/// Text mixing ASCII, Latin-1 and characters outside Latin-1
pub fn mixed_text_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            4 => prop::char::range('a', 'z'),
            2 => prop::char::range('\u{e0}', '\u{ff}'),
            1 => prop::sample::select(vec!['€', 'Ω', '中', '✓']),
        ],
        0..40,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

/// Record with small value ranges so that generated domains match often
pub fn exchange_record_strategy() -> impl Strategy<Value = ExchangeRecord> {
    (
        1i64..50,
        1i64..4,
        prop::sample::select(vec![10i64, 20, 21]),
        direction_strategy(),
        exchange_state_strategy(),
        any::<bool>(),
        prop::option::of(1i64..5),
    )
        .prop_map(|(id, backend_id, type_id, direction, state, has_file, res_id)| {
            let created_at = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
            ExchangeRecord {
                id,
                identifier: ExchangeRecord::default_identifier(id, created_at),
                backend_id,
                type_id,
                type_code: format!("TYPE_{type_id}"),
                direction,
                state,
                file: if has_file {
                    ExchangeFile::from_bytes(b"UNA:+.? '".to_vec())
                } else {
                    None
                },
                error: None,
                exchanged_on: None,
                model: res_id.map(|_| "account.move".to_string()),
                res_id,
                created_at,
                updated_at: created_at,
            }
        })
}

fn leaf_domain_strategy() -> impl Strategy<Value = Domain> {
    prop_oneof![
        Just(Domain::All),
        (1i64..4).prop_map(|id| Domain::equal(Field::BackendId, id)),
        prop::sample::select(vec![10i64, 20, 21]).prop_map(|id| Domain::equal(Field::TypeId, id)),
        direction_strategy().prop_map(|direction| Domain::equal(Field::Direction, direction)),
        prop::collection::vec(exchange_state_strategy(), 0..4)
            .prop_map(|states| Domain::is_in(Field::State, states)),
        any::<bool>().prop_map(|has_file| Domain::equal(Field::HasFile, has_file)),
        prop::option::of(1i64..5).prop_map(|res_id| Domain::equal(Field::ResId, res_id)),
        prop::collection::vec(1i64..50, 0..6).prop_map(|ids| Domain::is_in(Field::Id, ids)),
    ]
}

pub fn domain_strategy() -> impl Strategy<Value = Domain> {
    leaf_domain_strategy().prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..4).prop_map(Domain::And),
            prop::collection::vec(inner, 1..4).prop_map(Domain::Or),
        ]
    })
}

/// How a registration is restricted on one axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Unbound,
    /// Bound to the value the lookup uses
    Matching,
    /// Bound to some other value
    Other,
}

impl Binding {
    pub fn value(&self, matching: &str) -> Option<String> {
        match self {
            Self::Unbound => None,
            Self::Matching => Some(matching.to_string()),
            Self::Other => Some(format!("not_{matching}")),
        }
    }

    pub fn matches(&self) -> bool {
        *self != Self::Other
    }
}

fn binding_strategy() -> impl Strategy<Value = Binding> {
    prop_oneof![
        Just(Binding::Unbound),
        Just(Binding::Matching),
        Just(Binding::Other),
    ]
}

/// Backend type and exchange type bindings of one registration
pub type RegistrationShape = (Binding, Binding);

pub fn registration_shapes_strategy() -> impl Strategy<Value = Vec<RegistrationShape>> {
    prop::collection::vec((binding_strategy(), binding_strategy()), 0..8)
}

/// Expected winner among shapes registered in order, by index
pub fn expected_winner(shapes: &[RegistrationShape]) -> Option<usize> {
    shapes
        .iter()
        .enumerate()
        .filter(|(_, (backend, exchange))| backend.matches() && exchange.matches())
        .min_by_key(|(index, (backend, exchange))| {
            (
                *backend == Binding::Unbound,
                *exchange == Binding::Unbound,
                *index,
            )
        })
        .map(|(index, _)| index)
}

/// Value the record exposes for a field, as used by domain evaluation
pub fn field_of(record: &ExchangeRecord, field: Field) -> FieldValue {
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

/// Reference evaluation of a domain, independent of [`Domain::matches`]
pub fn reference_matches(domain: &Domain, record: &ExchangeRecord) -> bool {
    match domain {
        Domain::All => true,
        Domain::Eq(field, value) => field_of(record, *field) == *value,
        Domain::In(field, values) => values.contains(&field_of(record, *field)),
        Domain::And(domains) => domains.iter().all(|d| reference_matches(d, record)),
        Domain::Or(domains) => domains.iter().any(|d| reference_matches(d, record)),
    }
}

//! Handler Resolution and Encoding Benchmarks
//!
//! Resolution runs once per lifecycle action, so it is measured against a
//! registry holding many unrelated registrations besides the matching ones.

use async_trait::async_trait;
use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use edi_core::constants::ExchangeAction;
use edi_core::encoding::{encode_text, EncodingErrorPolicy};
use edi_core::models::{
    Backend, ExchangeDirection, ExchangeRecord, ExchangeType, HandlerOverride,
};
use edi_core::orchestration::{HandlerResolver, HandlerResult};
use edi_core::registry::{
    HandlerFactory, HandlerRegistration, HandlerRegistry, SendHandler, WorkContext,
};
use edi_core::state_machine::ExchangeState;
use serde_json::json;
use std::sync::Arc;

struct NoopSend;

#[async_trait]
impl SendHandler for NoopSend {
    async fn send(&self, _ctx: &WorkContext) -> HandlerResult<()> {
        Ok(())
    }
}

fn registry_with(unrelated: usize) -> Arc<HandlerRegistry> {
    let mut registry = HandlerRegistry::builder();
    for index in 0..unrelated {
        registry
            .register(
                HandlerRegistration::new(
                    format!("partner_{index}_send"),
                    "output.send",
                    HandlerFactory::send(|_ctx: &WorkContext| NoopSend),
                )
                .for_backend_type(format!("partner_{index}")),
            )
            .expect("valid registration");
    }
    registry
        .register(HandlerRegistration::new(
            "generic_send",
            "output.send",
            HandlerFactory::send(|_ctx: &WorkContext| NoopSend),
        ))
        .expect("valid registration");
    registry
        .register(
            HandlerRegistration::new(
                "demo_send",
                "output.send",
                HandlerFactory::send(|_ctx: &WorkContext| NoopSend),
            )
            .for_backend_type("demo"),
        )
        .expect("valid registration");
    registry
        .register(HandlerRegistration::new(
            "as2_send",
            "output.send.as2",
            HandlerFactory::send(|_ctx: &WorkContext| NoopSend),
        ))
        .expect("valid registration");
    Arc::new(registry.build())
}

fn sample_record() -> ExchangeRecord {
    let now = Utc::now();
    ExchangeRecord {
        id: 1,
        identifier: ExchangeRecord::default_identifier(1, now),
        backend_id: 1,
        type_id: 10,
        type_code: "INVOICE_OUT".to_string(),
        direction: ExchangeDirection::Output,
        state: ExchangeState::OutputPending,
        file: None,
        error: None,
        exchanged_on: None,
        model: None,
        res_id: None,
        created_at: now,
        updated_at: now,
    }
}

fn benchmark_resolution(c: &mut Criterion) {
    let backend = Backend::new(1, "ACME", "demo");
    let plain = ExchangeType::new(10, "INVOICE_OUT", ExchangeDirection::Output, "demo");
    let overridden = plain.clone().with_override(
        ExchangeAction::Send,
        HandlerOverride::new("output.send.as2").with_work_ctx("endpoint", json!("https://as2")),
    );
    let record = sample_record();

    let mut group = c.benchmark_group("handler_resolution");
    for unrelated in [0usize, 50, 500] {
        let resolver = HandlerResolver::new(registry_with(unrelated));
        group.bench_with_input(BenchmarkId::new("generic", unrelated), &resolver, |b, r| {
            b.iter(|| {
                r.resolve(
                    black_box(&backend),
                    black_box(&plain),
                    black_box(&record),
                    ExchangeAction::Send,
                    false,
                )
            })
        });
        group.bench_with_input(BenchmarkId::new("override", unrelated), &resolver, |b, r| {
            b.iter(|| {
                r.resolve(
                    black_box(&backend),
                    black_box(&overridden),
                    black_box(&record),
                    ExchangeAction::Send,
                    false,
                )
            })
        });
    }
    group.finish();
}

fn benchmark_encoding(c: &mut Criterion) {
    let text = "UNH+1+INVOIC:D:96A:UN'BGM+380+Façade €42 Ω'".repeat(200);
    let mut group = c.benchmark_group("output_encoding");
    for (label, policy) in [
        ("utf-8", EncodingErrorPolicy::Strict),
        ("windows-1252", EncodingErrorPolicy::Replace),
        ("iso-8859-2", EncodingErrorPolicy::XmlCharRefReplace),
    ] {
        group.bench_function(BenchmarkId::new(label, policy.to_string()), |b| {
            b.iter(|| encode_text(black_box(&text), label, policy))
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_resolution, benchmark_encoding);
criterion_main!(benches);

//! INVOICE_OUT exchange from creation to `output_sent`, with a connectivity
//! fault on the first send attempt retried through the job queue.

mod common;

use common::*;
use edi_core::config::{BackoffConfig, EdiConfig};
use edi_core::constants::{ExchangeAction, StatusMessage};
use edi_core::models::ExchangeRecordValues;
use edi_core::orchestration::{HandlerError, JobStatus, SyncOutputOptions};
use edi_core::state_machine::{CallOptions, ExchangeState, GenerateOptions};

fn config_with_backoff(max_retries: u32) -> EdiConfig {
    let mut config = EdiConfig::default();
    config.backoff = BackoffConfig {
        base_delay_seconds: 30,
        max_delay_seconds: 300,
        multiplier: 2.0,
        max_retries,
    };
    config
}

#[tokio::test]
async fn test_invoice_out_with_connectivity_retry() {
    let h = Harness::with(demo_catalog(), config_with_backoff(3), Vec::new());
    let backend = h.backend(ACME);

    let record = backend
        .create_record(
            INVOICE_OUT,
            ExchangeRecordValues::for_document("account.move", 42),
        )
        .await
        .unwrap();
    assert_eq!(record.state, ExchangeState::New);

    let outcome = backend
        .exchange_generate(record.id, GenerateOptions::default(), CallOptions::default())
        .await
        .unwrap();
    assert_eq!(outcome.state, ExchangeState::OutputPending);

    h.send.push_err(HandlerError::connection("SFTP connection refused"));
    let report = backend
        .sync_output(SyncOutputOptions::default())
        .await
        .unwrap();
    let send_job = report.dispatched_for(ExchangeAction::Send).next().unwrap().clone();

    let summary = h.queue.run_pending(&h.machine).await;
    assert_eq!(summary.retried, 1);
    assert_eq!(summary.succeeded, 0);
    let after_fault = h.record(record.id).await;
    assert_eq!(after_fault.state, ExchangeState::OutputPending);
    assert_eq!(after_fault.error, None);
    assert_eq!(h.queue.status(send_job.job_id), Some(JobStatus::Pending));

    // Backoff keeps the retry out of the next run until it is due
    let summary = h.queue.run_pending(&h.machine).await;
    assert_eq!(summary.succeeded, 0);
    assert_eq!(h.send.calls(), 1);

    h.queue.retry_now();
    let summary = h.queue.run_pending(&h.machine).await;
    assert_eq!(summary.succeeded, 1);
    assert_eq!(h.send.calls(), 2);

    let sent = h.record(record.id).await;
    assert_eq!(sent.state, ExchangeState::OutputSent);
    assert_eq!(sent.error, None);
    assert!(sent.exchanged_on.is_some());
    assert_eq!(sent.res_id, Some(42));
    assert_eq!(
        h.notifier.completions(ExchangeAction::Send),
        1,
        "only the successful attempt notifies"
    );
    assert!(h.notifier.notifications().contains(&Notification::ActionComplete {
        record_id: record.id,
        action: ExchangeAction::Send,
        message: Some(StatusMessage::SendOk.text().to_string()),
    }));
    match h.queue.status(send_job.job_id) {
        Some(JobStatus::Succeeded { message }) => {
            assert_eq!(message, StatusMessage::SendOk.text());
        }
        other => panic!("unexpected job status {other:?}"),
    }
}

#[tokio::test]
async fn test_retries_exhausted_fail_the_job() {
    let h = Harness::with(demo_catalog(), config_with_backoff(1), Vec::new());
    let record = h.create(ACME, INVOICE_OUT).await;
    h.send
        .push_err(HandlerError::timeout("Gateway timeout"))
        .push_err(HandlerError::timeout("Gateway timeout"));

    h.backend(ACME)
        .sync_output(SyncOutputOptions::default())
        .await
        .unwrap();
    let summary = h.queue.run_pending(&h.machine).await;
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.retried, 1);

    h.queue.retry_now();
    let summary = h.queue.run_pending(&h.machine).await;
    assert_eq!(summary.failed, 1);

    let send_job = h
        .queue
        .jobs()
        .into_iter()
        .find(|job| job.request.action == ExchangeAction::Send)
        .unwrap();
    match send_job.status {
        JobStatus::Failed { reason } => assert!(reason.contains("Gateway timeout")),
        other => panic!("unexpected job status {other:?}"),
    }
    // Transient failures never reach the record
    let stored = h.record(record.id).await;
    assert_eq!(stored.state, ExchangeState::OutputPending);
    assert_eq!(stored.error, None);
}

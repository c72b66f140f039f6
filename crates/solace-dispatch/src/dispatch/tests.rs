//! Tests for the dispatcher

use super::*;
use crate::config::DispatchConfig;
use crate::policy::{BudgetConstraint, Selection, SelectionRule};
use crate::registry::BackendDescriptor;
use crate::request::{RequestDescriptor, TaskType};
use crate::usage::MemoryLedger;
use std::time::Duration;

fn backend(id: &str) -> BackendDescriptor {
    BackendDescriptor {
        id: id.to_string(),
        display_name: id.to_uppercase(),
        provider_family: "testfam".to_string(),
        capabilities: [TaskType::Chat].into_iter().collect(),
        cost_per_input_unit: 0.00003,
        cost_per_output_unit: 0.00006,
        average_latency_ms: 500,
        quality_score: 0.8,
        available: true,
    }
}

fn selection(id: &str) -> Selection {
    Selection {
        backend: backend(id),
        rule: SelectionRule::WeightedDefault,
        constraint: BudgetConstraint::None,
    }
}

fn request() -> RequestDescriptor {
    RequestDescriptor::new("caller-1", TaskType::Chat).with_session("session-1")
}

fn dispatcher(client: Arc<MockBackendClient>, ledger: Arc<MemoryLedger>) -> Dispatcher {
    let config = DispatchConfig {
        call_timeout_ms: 200,
        ..Default::default()
    };
    Dispatcher::new(client, ledger, config)
}

#[tokio::test]
async fn successful_dispatch_writes_one_record() {
    let client = Arc::new(MockBackendClient::new());
    client.push_ok("hello there", 120, 80);
    let ledger = Arc::new(MemoryLedger::new());
    let dispatcher = dispatcher(Arc::clone(&client), Arc::clone(&ledger));

    let result = dispatcher
        .dispatch(
            &request(),
            selection("alpha"),
            Some(selection("beta")),
            "hi",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(result.success);
    assert!(!result.degraded);
    assert_eq!(result.backend_id.as_deref(), Some("alpha"));
    assert_eq!(result.content, "hello there");
    assert_eq!(result.attempts, 1);

    let records = ledger.all().await;
    assert_eq!(records.len(), 1);
    assert!(records[0].success);
    assert_eq!(records[0].backend_id, "alpha");
    assert_eq!(records[0].total_units, 200);
    assert_eq!(records[0].session_id.as_deref(), Some("session-1"));
}

#[tokio::test]
async fn transient_primary_failure_falls_back_and_writes_two_records() {
    let client = Arc::new(MockBackendClient::new());
    client.push_err(Error::Backend {
        backend_id: "alpha".to_string(),
        reason: "overloaded".to_string(),
    });
    client.push_ok("recovered", 100, 50);
    let ledger = Arc::new(MemoryLedger::new());
    let dispatcher = dispatcher(Arc::clone(&client), Arc::clone(&ledger));

    let result = dispatcher
        .dispatch(
            &request(),
            selection("alpha"),
            Some(selection("beta")),
            "hi",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.backend_id.as_deref(), Some("beta"));
    assert_eq!(result.attempts, 2);
    assert_eq!(client.calls(), vec!["alpha", "beta"]);

    let records = ledger.all().await;
    assert_eq!(records.len(), 2);
    assert!(!records[0].success);
    assert_eq!(records[0].backend_id, "alpha");
    assert!(records[1].success);
    assert_eq!(records[1].backend_id, "beta");
}

#[tokio::test]
async fn total_failure_returns_degraded_response() {
    let client = Arc::new(MockBackendClient::new());
    client.push_err(Error::Backend {
        backend_id: "alpha".to_string(),
        reason: "down".to_string(),
    });
    client.push_err(Error::Backend {
        backend_id: "beta".to_string(),
        reason: "down".to_string(),
    });
    let ledger = Arc::new(MemoryLedger::new());
    let dispatcher = dispatcher(Arc::clone(&client), Arc::clone(&ledger));

    let result = dispatcher
        .dispatch(
            &request(),
            selection("alpha"),
            Some(selection("beta")),
            "hi",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    // a safe canned reply, not a raw provider error
    assert!(!result.success);
    assert!(result.degraded);
    assert!(result.backend_id.is_none());
    assert_eq!(result.content, DispatchConfig::default().degraded_message);
    assert_eq!(result.attempts, 2);

    let records = ledger.all().await;
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| !r.success));
    assert!(records.iter().all(|r| r.total_units == 0));
}

#[tokio::test]
async fn no_fallback_degrades_after_single_failure() {
    let client = Arc::new(MockBackendClient::new());
    client.push_err(Error::Backend {
        backend_id: "alpha".to_string(),
        reason: "down".to_string(),
    });
    let ledger = Arc::new(MemoryLedger::new());
    let dispatcher = dispatcher(Arc::clone(&client), Arc::clone(&ledger));

    let result = dispatcher
        .dispatch(
            &request(),
            selection("alpha"),
            None,
            "hi",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(result.degraded);
    assert_eq!(result.attempts, 1);
    assert_eq!(ledger.len().await, 1);
}

#[tokio::test]
async fn timeout_counts_as_attempt_failure() {
    let client = Arc::new(MockBackendClient::new());
    client.push_ok_after("too late", 100, 50, Duration::from_millis(500));
    client.push_ok("on time", 100, 50);
    let ledger = Arc::new(MemoryLedger::new());
    let dispatcher = dispatcher(Arc::clone(&client), Arc::clone(&ledger));

    let result = dispatcher
        .dispatch(
            &request(),
            selection("alpha"),
            Some(selection("beta")),
            "hi",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.backend_id.as_deref(), Some("beta"));

    let records = ledger.all().await;
    assert_eq!(records.len(), 2);
    assert!(!records[0].success);
    assert_eq!(records[0].metadata.get("timeout").map(String::as_str), Some("true"));
}

#[tokio::test]
async fn cancellation_aborts_and_still_records_the_attempt() {
    let client = Arc::new(MockBackendClient::new());
    client.push_ok_after("never seen", 100, 50, Duration::from_secs(5));
    let ledger = Arc::new(MemoryLedger::new());
    let config = DispatchConfig {
        call_timeout_ms: 10_000,
        ..Default::default()
    };
    let dispatcher = Dispatcher::new(Arc::clone(&client) as Arc<dyn BackendClient>, Arc::clone(&ledger) as Arc<dyn UsageStore>, config);

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = dispatcher
        .dispatch(&request(), selection("alpha"), Some(selection("beta")), "hi", &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));

    let records = ledger.all().await;
    assert_eq!(records.len(), 1);
    assert!(!records[0].success);
    assert_eq!(
        records[0].metadata.get("cancelled").map(String::as_str),
        Some("true")
    );
}

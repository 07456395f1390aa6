//! Tests for metrics integration.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use uuid::Uuid;

use sluice::providers::{CompletionProvider, CompletionRequest, CompletionResponse};
use sluice::telemetry;
use sluice::types::TokenUsage;
use sluice::usage::{UsageRecord, UsageStore, UsageTracker};
use sluice::{IssueInput, Result, Sluice, SluiceError};

// ============================================================================
// Mocks
// ============================================================================

struct FixedProvider;

#[async_trait]
impl CompletionProvider for FixedProvider {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        Ok(CompletionResponse {
            content: r#"{"summary": "Users cannot export reports from Firefox.",
                "key_points": ["export"], "sentiment": "negative", "confidence": 80}"#
                .to_string(),
            usage: TokenUsage {
                input_tokens: 120,
                output_tokens: 30,
            },
            model: request.model.clone(),
        })
    }
}

struct FailingProvider;

#[async_trait]
impl CompletionProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse> {
        Err(SluiceError::Http("connection reset".to_string()))
    }
}

struct FailingStore;

#[async_trait]
impl UsageStore for FailingStore {
    async fn append(&self, _record: &UsageRecord) -> Result<()> {
        Err(SluiceError::Store("read-only".to_string()))
    }

    async fn records_since(
        &self,
        _user_id: Option<&str>,
        _since: DateTime<Utc>,
    ) -> Result<Vec<UsageRecord>> {
        Ok(Vec::new())
    }
}

// ============================================================================
// Snapshot type alias for readability
// ============================================================================

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

// ============================================================================
// Helpers
// ============================================================================

/// Sum all counter values matching a given metric name.
fn counter_total(snapshot: &SnapshotVec, name: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Sum counter values for `name` carrying the label `label=value`.
fn counter_with_label(snapshot: &SnapshotVec, name: &str, label: &str, value: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| {
            key.kind() == MetricKind::Counter
                && key.key().name() == name
                && key
                    .key()
                    .labels()
                    .any(|l| l.key() == label && l.value() == value)
        })
        .map(|(_, _, _, v)| match v {
            DebugValue::Counter(c) => *c,
            _ => 0,
        })
        .sum()
}

/// Check if any histogram entries exist for a given metric name.
fn has_histogram(snapshot: &SnapshotVec, name: &str) -> bool {
    snapshot
        .iter()
        .any(|(key, _, _, _)| key.kind() == MetricKind::Histogram && key.key().name() == name)
}

fn issue() -> IssueInput {
    IssueInput::new("Export broken", "Clicking export does nothing.")
}

// ============================================================================
// Tests
// ============================================================================

/// Runs async code within a local recorder scope on the multi-thread runtime.
///
/// `block_in_place` ensures the sync `with_local_recorder` closure stays
/// on the current thread while `block_on` drives the inner async work.
#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn miss_then_hit_records_metrics() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let gateway = Sluice::builder().provider(FixedProvider).build().unwrap();

    let (first, second) = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let first = gateway.summarize_issue("u1", &issue()).await;
                let second = gateway.summarize_issue("u1", &issue()).await;
                (first, second)
            })
        })
    });
    assert!(!first.unwrap().cache_hit);
    assert!(second.unwrap().cache_hit);

    let snapshot = snapshotter.snapshot().into_vec();

    assert_eq!(counter_total(&snapshot, telemetry::REQUESTS_TOTAL), 2);
    assert_eq!(
        counter_with_label(&snapshot, telemetry::REQUESTS_TOTAL, "outcome", "miss"),
        1
    );
    assert_eq!(
        counter_with_label(&snapshot, telemetry::REQUESTS_TOTAL, "outcome", "hit"),
        1
    );
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_HITS_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 1);
    assert_eq!(
        counter_with_label(&snapshot, telemetry::TOKENS_TOTAL, "direction", "input"),
        120
    );
    assert_eq!(
        counter_with_label(&snapshot, telemetry::TOKENS_TOTAL, "direction", "output"),
        30
    );
    assert!(has_histogram(&snapshot, telemetry::REQUEST_DURATION_SECONDS));
    assert!(has_histogram(&snapshot, telemetry::QUALITY_SCORE));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn provider_failure_records_failed_outcome() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let gateway = Sluice::builder().provider(FailingProvider).build().unwrap();

    let result = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current()
                .block_on(async { gateway.summarize_issue("u1", &issue()).await })
        })
    });
    assert!(result.is_none());

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(
        counter_with_label(&snapshot, telemetry::REQUESTS_TOTAL, "outcome", "failed"),
        1
    );
    assert_eq!(counter_total(&snapshot, telemetry::TOKENS_TOTAL), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn tracking_failure_is_counted() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let tracker = UsageTracker::new(Arc::new(FailingStore));
    let record = UsageRecord {
        request_id: Uuid::new_v4(),
        user_id: "u1".to_string(),
        operation: "issue_summary".to_string(),
        input_tokens: 0,
        output_tokens: 0,
        total_tokens: 0,
        cost: 0.0,
        latency_ms: 0,
        cache_hit: false,
        model: "gpt-4o-mini".to_string(),
        quality_score: 0,
        success: true,
        timestamp: Utc::now(),
    };

    metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(tracker.record(&record))
        })
    });

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::TRACKING_FAILURES_TOTAL), 1);
}

#[tokio::test]
async fn metrics_are_noop_without_recorder() {
    // Verify no panics when no recorder is installed.
    let gateway = Sluice::builder().provider(FixedProvider).build().unwrap();
    assert!(gateway.summarize_issue("u1", &issue()).await.is_some());
}

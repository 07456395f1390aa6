//! Usage accounting.
//!
//! One [`UsageRecord`] is appended per gateway invocation. Writes go to a
//! [`UsageStore`] and are best-effort: a failed write is logged and
//! dropped, never surfaced to the caller.

mod store;

pub use store::{JsonlUsageStore, MemoryUsageStore};

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;

use crate::{Result, telemetry};

/// Accounting entry for one gateway invocation. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub request_id: Uuid,
    pub user_id: String,
    pub operation: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
    /// USD.
    pub cost: f64,
    pub latency_ms: u64,
    pub cache_hit: bool,
    pub model: String,
    pub quality_score: u8,
    /// False when the provider call failed.
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

/// Append-only durable store of usage records.
#[async_trait]
pub trait UsageStore: Send + Sync {
    async fn append(&self, record: &UsageRecord) -> Result<()>;

    /// Records with `timestamp >= since`, optionally restricted to one user.
    async fn records_since(
        &self,
        user_id: Option<&str>,
        since: DateTime<Utc>,
    ) -> Result<Vec<UsageRecord>>;
}

/// Per-user daily rollup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyUsage {
    pub total_tokens: u64,
    pub total_cost: f64,
    pub request_count: u64,
}

impl DailyUsage {
    pub fn from_records(records: &[UsageRecord]) -> Self {
        records.iter().fold(Self::default(), |mut acc, r| {
            acc.total_tokens += u64::from(r.total_tokens);
            acc.total_cost += r.cost;
            acc.request_count += 1;
            acc
        })
    }
}

/// Aggregate over all users for the current day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub usage: DailyUsage,
    pub cache_hits: u64,
    pub failed_requests: u64,
    pub avg_latency_ms: f64,
    /// Mean quality of successful invocations.
    pub avg_quality: f64,
}

impl UsageSummary {
    pub fn from_records(records: &[UsageRecord]) -> Self {
        let usage = DailyUsage::from_records(records);
        let cache_hits = records.iter().filter(|r| r.cache_hit).count() as u64;
        let succeeded: Vec<&UsageRecord> = records.iter().filter(|r| r.success).collect();
        let failed_requests = (records.len() - succeeded.len()) as u64;

        let avg_latency_ms = mean(records.iter().map(|r| r.latency_ms as f64));
        let avg_quality = mean(succeeded.iter().map(|r| f64::from(r.quality_score)));

        Self {
            usage,
            cache_hits,
            failed_requests,
            avg_latency_ms,
            avg_quality,
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0u64), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

/// Midnight of `now`'s calendar day in its own timezone, as UTC.
pub fn start_of_day<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    let midnight = now.date_naive().and_time(NaiveTime::MIN);
    match now.timezone().from_local_datetime(&midnight).earliest() {
        Some(local) => local.with_timezone(&Utc),
        // Midnight skipped by a DST jump; treat the naive time as UTC.
        None => Utc.from_utc_datetime(&midnight),
    }
}

/// Fire-and-forget writer plus daily rollups over a [`UsageStore`].
pub struct UsageTracker {
    store: Arc<dyn UsageStore>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl UsageTracker {
    pub fn new(store: Arc<dyn UsageStore>) -> Self {
        Self {
            store,
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn UsageStore> {
        &self.store
    }

    /// Write `record` in the background. Must be called inside a tokio runtime.
    pub fn track(&self, record: UsageRecord) {
        let store = Arc::clone(&self.store);
        let handle = tokio::spawn(async move {
            write_record(store.as_ref(), &record).await;
        });

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    /// Write `record` and wait for the store. Failures are still swallowed.
    pub async fn record(&self, record: &UsageRecord) {
        write_record(self.store.as_ref(), record).await;
    }

    /// Wait for every background write started so far.
    pub async fn flush(&self) {
        let handles = std::mem::take(
            &mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "usage write task failed");
            }
        }
    }

    /// Today's totals for `user_id` (server-local day).
    pub async fn daily_usage(&self, user_id: &str) -> Result<DailyUsage> {
        self.daily_usage_at(user_id, &Local::now()).await
    }

    /// Totals for `user_id` on the calendar day containing `now`.
    pub async fn daily_usage_at<Tz: TimeZone>(
        &self,
        user_id: &str,
        now: &DateTime<Tz>,
    ) -> Result<DailyUsage> {
        let since = start_of_day(now);
        let records = self.store.records_since(Some(user_id), since).await?;
        Ok(DailyUsage::from_records(&records))
    }

    /// Today's aggregate over all users.
    pub async fn daily_summary(&self) -> Result<UsageSummary> {
        let records = self
            .store
            .records_since(None, start_of_day(&Local::now()))
            .await?;
        Ok(UsageSummary::from_records(&records))
    }
}

async fn write_record(store: &dyn UsageStore, record: &UsageRecord) {
    if let Err(e) = store.append(record).await {
        metrics::counter!(telemetry::TRACKING_FAILURES_TOTAL).increment(1);
        warn!(
            error = %e,
            request_id = %record.request_id,
            operation = %record.operation,
            "failed to persist usage record"
        );
    }
}

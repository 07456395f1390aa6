//! Telemetry metric name constants.
//!
//! Centralised metric names for sluice operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `sluice_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `operation`: gateway operation (e.g. "issue_summary", "structured")
//! - `outcome`: "hit", "miss", "degraded" or "failed"
//! - `direction`: token direction: "input" or "output"

/// Total gateway invocations that reached the pipeline.
///
/// Labels: `operation`, `outcome`.
pub const REQUESTS_TOTAL: &str = "sluice_requests_total";

/// End-to-end invocation duration in seconds.
///
/// Labels: `operation`.
pub const REQUEST_DURATION_SECONDS: &str = "sluice_request_duration_seconds";

/// Total tokens consumed by provider calls.
///
/// Labels: `direction` ("input" | "output").
pub const TOKENS_TOTAL: &str = "sluice_tokens_total";

/// Quality score of provider responses (0-100).
///
/// Labels: `operation`.
pub const QUALITY_SCORE: &str = "sluice_quality_score";

/// Total request cache hits.
pub const CACHE_HITS_TOTAL: &str = "sluice_cache_hits_total";

/// Total request cache misses (absent or expired).
pub const CACHE_MISSES_TOTAL: &str = "sluice_cache_misses_total";

/// Total usage records the store failed to persist.
pub const TRACKING_FAILURES_TOTAL: &str = "sluice_tracking_failures_total";

//! Gateway orchestrator.
//!
//! Each invocation runs: render prompt → cache lookup → (on miss) provider
//! call → quality gate → cache write → usage record → return. Every
//! failure is absorbed here; callers see either a result or `None`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::{CacheBackend, CacheConfig, CacheKey, CacheStats, KeyScope};
use crate::config::OperationConfig;
use crate::cost::CostModel;
use crate::providers::{CompletionProvider, CompletionRequest};
use crate::quality::{self, PASSING_SCORE};
use crate::template::TemplateRegistry;
use crate::types::{
    ClusterInput, ClusterSummary, GatewayResponse, IssueInput, IssueSummary, Payload,
    RequirementCards, RequirementInput, Structured, StructuredOutput, StructuredRequest,
    TokenUsage,
};
use crate::usage::{DailyUsage, UsageRecord, UsageSummary, UsageTracker};
use crate::{SluiceError, telemetry};

/// Cache stats plus today's usage, for operator tooling.
///
/// The hit rate is derived on demand via [`CacheStats::hit_rate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub cache: CacheStats,
    pub today: UsageSummary,
}

/// Fully resolved settings for one invocation.
struct CallPlan {
    operation: String,
    prompt: String,
    system: Option<String>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    expected_fields: Vec<String>,
    ttl: Duration,
}

/// Request optimization gateway.
///
/// Holds only shared handles to its collaborators and immutable settings,
/// so one instance is built at startup and shared (e.g. in an `Arc`)
/// across all concurrent callers.
pub struct Gateway {
    pub(super) provider: Option<Arc<dyn CompletionProvider>>,
    pub(super) enabled: bool,
    pub(super) templates: TemplateRegistry,
    pub(super) cache: Arc<dyn CacheBackend>,
    pub(super) cache_config: CacheConfig,
    pub(super) cost_model: CostModel,
    pub(super) tracker: Arc<UsageTracker>,
    pub(super) default_model: String,
    pub(super) default_max_tokens: u32,
    pub(super) default_temperature: f32,
    pub(super) operations: HashMap<String, OperationConfig>,
    pub(super) request_timeout: Duration,
}

impl Gateway {
    /// Whether calls can reach a provider (enabled and credentials present).
    pub fn is_configured(&self) -> bool {
        self.enabled && self.provider.is_some()
    }

    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    pub fn tracker(&self) -> &UsageTracker {
        &self.tracker
    }

    pub fn cost_model(&self) -> &CostModel {
        &self.cost_model
    }

    // ===== Per-operation entry points =====

    /// Summarize a single issue.
    pub async fn summarize_issue(
        &self,
        user_id: &str,
        input: &IssueInput,
    ) -> Option<Structured<IssueSummary>> {
        self.run_typed(user_id, &input.to_fields()).await
    }

    /// Describe what a group of issues has in common.
    pub async fn summarize_cluster(
        &self,
        user_id: &str,
        input: &ClusterInput,
    ) -> Option<Structured<ClusterSummary>> {
        self.run_typed(user_id, &input.to_fields()).await
    }

    /// Turn an initiative into requirement cards.
    pub async fn generate_requirement_cards(
        &self,
        user_id: &str,
        input: &RequirementInput,
    ) -> Option<Structured<RequirementCards>> {
        self.run_typed(user_id, &input.to_fields()).await
    }

    /// Run `T`'s operation and deserialize the reply into `T`.
    ///
    /// Returns `None` when the call fails or the reply cannot be shaped
    /// into `T` at all (e.g. not JSON). Replies missing some fields still
    /// deserialize, with defaults for the gaps and a low `quality`.
    pub async fn run_typed<T: StructuredOutput>(
        &self,
        user_id: &str,
        fields: &HashMap<String, String>,
    ) -> Option<Structured<T>> {
        let response = self.run_operation(user_id, T::OPERATION, fields).await?;
        match response.payload.to_typed::<T>() {
            Ok(value) => Some(Structured {
                value,
                quality: response.quality,
                cache_hit: response.cache_hit,
            }),
            Err(e) => {
                warn!(
                    operation = T::OPERATION,
                    request_id = %response.request_id,
                    error = %e,
                    "response could not be converted to a typed result"
                );
                None
            }
        }
    }

    /// Run a registered template operation.
    pub async fn run_operation(
        &self,
        user_id: &str,
        operation: &str,
        fields: &HashMap<String, String>,
    ) -> Option<GatewayResponse> {
        if !self.check_configured(operation) {
            return None;
        }

        let Some(template) = self.templates.get(operation) else {
            warn!(
                operation,
                error = %SluiceError::TemplateNotFound(operation.to_string()),
                "cannot run operation"
            );
            return None;
        };

        let overrides = self.operations.get(operation);
        let plan = CallPlan {
            operation: operation.to_string(),
            prompt: template.render(fields),
            system: None,
            model: self.resolve_model(overrides, None),
            max_tokens: overrides
                .and_then(|o| o.max_tokens)
                .unwrap_or(template.max_tokens),
            temperature: overrides
                .and_then(|o| o.temperature)
                .unwrap_or(template.temperature),
            expected_fields: template.expected_fields.clone(),
            ttl: self.resolve_ttl(overrides, None),
        };

        self.execute(user_id, plan).await
    }

    /// Send a caller-supplied prompt, bypassing templates.
    ///
    /// The call is still cached, costed, quality-gated (when
    /// `expected_fields` is set) and tracked.
    pub async fn structured_response(
        &self,
        user_id: &str,
        prompt: &str,
        request: &StructuredRequest,
    ) -> Option<GatewayResponse> {
        if !self.check_configured(&request.operation) {
            return None;
        }

        let overrides = self.operations.get(&request.operation);
        let plan = CallPlan {
            operation: request.operation.clone(),
            prompt: prompt.to_string(),
            system: request.system.clone(),
            model: self.resolve_model(overrides, request.model.as_deref()),
            max_tokens: request
                .max_tokens
                .or_else(|| overrides.and_then(|o| o.max_tokens))
                .unwrap_or(self.default_max_tokens),
            temperature: request
                .temperature
                .or_else(|| overrides.and_then(|o| o.temperature))
                .unwrap_or(self.default_temperature),
            expected_fields: request.expected_fields.clone(),
            ttl: self.resolve_ttl(overrides, request.cache_ttl),
        };

        self.execute(user_id, plan).await
    }

    // ===== Administrative operations =====

    /// Cache statistics and today's aggregate usage.
    pub async fn performance_metrics(&self) -> PerformanceMetrics {
        let cache = self.cache.stats().await;
        let today = self.tracker.daily_summary().await.unwrap_or_else(|e| {
            warn!(error = %e, "failed to read usage summary");
            UsageSummary::default()
        });
        PerformanceMetrics { cache, today }
    }

    /// Today's totals for one user. Store failures yield zeroes.
    pub async fn daily_usage(&self, user_id: &str) -> DailyUsage {
        self.tracker.daily_usage(user_id).await.unwrap_or_else(|e| {
            warn!(user_id, error = %e, "failed to read daily usage");
            DailyUsage::default()
        })
    }

    /// Empty the request cache.
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
        debug!("request cache cleared");
    }

    // ===== Orchestration =====

    fn check_configured(&self, operation: &str) -> bool {
        if self.is_configured() {
            return true;
        }
        debug!(operation, error = %SluiceError::NotConfigured, "skipping gateway call");
        false
    }

    fn resolve_model(&self, overrides: Option<&OperationConfig>, explicit: Option<&str>) -> String {
        explicit
            .map(str::to_string)
            .or_else(|| overrides.and_then(|o| o.model.clone()))
            .unwrap_or_else(|| self.default_model.clone())
    }

    fn resolve_ttl(&self, overrides: Option<&OperationConfig>, explicit: Option<Duration>) -> Duration {
        explicit
            .or_else(|| {
                overrides
                    .and_then(|o| o.cache_ttl_secs)
                    .map(Duration::from_secs)
            })
            .unwrap_or(self.cache_config.default_ttl)
    }

    async fn execute(&self, user_id: &str, plan: CallPlan) -> Option<GatewayResponse> {
        let provider = self.provider.as_ref()?;
        let started = Instant::now();
        let request_id = Uuid::new_v4();
        let key = CacheKey::scoped(
            &plan.prompt,
            &plan.model,
            plan.temperature,
            self.cache_config.key_prefix_chars,
            KeyScope {
                system: plan.system.as_deref(),
                expected_fields: &plan.expected_fields,
            },
        );

        // CACHE_LOOKUP
        if let Some(payload) = self.cache.get(&key).await {
            let latency = started.elapsed();
            debug!(operation = %plan.operation, %key, "cache hit");
            self.tracker.track(UsageRecord {
                request_id,
                user_id: user_id.to_string(),
                operation: plan.operation.clone(),
                input_tokens: 0,
                output_tokens: 0,
                total_tokens: 0,
                cost: 0.0,
                latency_ms: millis(latency),
                cache_hit: true,
                model: plan.model.clone(),
                quality_score: 100,
                success: true,
                timestamp: Utc::now(),
            });
            record_outcome(&plan.operation, "hit", latency);
            return Some(GatewayResponse {
                request_id,
                payload,
                quality: 100,
                cache_hit: true,
                model: plan.model,
                usage: TokenUsage::default(),
                cost: 0.0,
            });
        }

        // PROVIDER_CALL
        let request = CompletionRequest {
            model: plan.model.clone(),
            prompt: plan.prompt,
            system: plan.system,
            max_tokens: plan.max_tokens,
            temperature: plan.temperature,
        };
        let result = match tokio::time::timeout(self.request_timeout, provider.complete(&request)).await
        {
            Ok(result) => result,
            Err(_) => Err(SluiceError::Timeout(self.request_timeout)),
        };

        let completion = match result {
            Ok(completion) => completion,
            Err(e) => {
                let latency = started.elapsed();
                warn!(
                    operation = %plan.operation,
                    provider = provider.name(),
                    kind = e.kind().as_str(),
                    error = %e,
                    "provider call failed"
                );
                self.tracker.track(UsageRecord {
                    request_id,
                    user_id: user_id.to_string(),
                    operation: plan.operation.clone(),
                    input_tokens: 0,
                    output_tokens: 0,
                    total_tokens: 0,
                    cost: 0.0,
                    latency_ms: millis(latency),
                    cache_hit: false,
                    model: request.model,
                    quality_score: 0,
                    success: false,
                    timestamp: Utc::now(),
                });
                record_outcome(&plan.operation, "failed", latency);
                return None;
            }
        };

        let usage = completion.usage;
        let cost = self
            .cost_model
            .cost(usage.input_tokens, usage.output_tokens, &completion.model);

        // VALIDATE
        let (payload, quality) = if plan.expected_fields.is_empty() {
            (Payload::Text(completion.content), 100)
        } else {
            let validation = quality::validate(&completion.content, &plan.expected_fields);
            if !validation.is_valid {
                warn!(
                    operation = %plan.operation,
                    %request_id,
                    confidence = validation.confidence,
                    issues = ?validation.issues,
                    "low quality response; not caching"
                );
            }
            match validation.parsed {
                Some(json) => (Payload::Structured(json), validation.confidence),
                None => (Payload::Text(completion.content), 0),
            }
        };

        if quality >= PASSING_SCORE {
            self.cache.set(key, payload.clone(), plan.ttl).await;
        }

        let latency = started.elapsed();
        self.tracker.track(UsageRecord {
            request_id,
            user_id: user_id.to_string(),
            operation: plan.operation.clone(),
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            total_tokens: usage.total(),
            cost,
            latency_ms: millis(latency),
            cache_hit: false,
            model: completion.model.clone(),
            quality_score: quality,
            success: true,
            timestamp: Utc::now(),
        });

        metrics::counter!(telemetry::TOKENS_TOTAL, "direction" => "input")
            .increment(u64::from(usage.input_tokens));
        metrics::counter!(telemetry::TOKENS_TOTAL, "direction" => "output")
            .increment(u64::from(usage.output_tokens));
        metrics::histogram!(telemetry::QUALITY_SCORE, "operation" => plan.operation.clone())
            .record(f64::from(quality));
        let outcome = if quality >= PASSING_SCORE { "miss" } else { "degraded" };
        record_outcome(&plan.operation, outcome, latency);

        Some(GatewayResponse {
            request_id,
            payload,
            quality,
            cache_hit: false,
            model: completion.model,
            usage,
            cost,
        })
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn record_outcome(operation: &str, outcome: &'static str, latency: Duration) {
    metrics::counter!(
        telemetry::REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!(
        telemetry::REQUEST_DURATION_SECONDS,
        "operation" => operation.to_string()
    )
    .record(latency.as_secs_f64());
}

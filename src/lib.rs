//! Sluice - request optimization gateway for LLM APIs
//!
//! Sits between application code and a chat-completion provider. Every
//! call goes through one pipeline: render a prompt template, look the
//! request up in a cache, call the provider on a miss, score the reply's
//! structure, cache replies that pass, and append a usage record with
//! token counts and cost.
//!
//! Callers never see provider errors. Typed operations return `None` when
//! the gateway is disabled or unconfigured, the provider fails or times
//! out, or the reply cannot be parsed.
//!
//! # Example
//!
//! ```rust,no_run
//! use sluice::{IssueInput, Sluice};
//!
//! #[tokio::main]
//! async fn main() -> sluice::Result<()> {
//!     let gateway = Sluice::builder()
//!         .openai("sk-your-key")
//!         .build()?;
//!
//!     let issue = IssueInput::new(
//!         "Export button broken",
//!         "Clicking export on the reports page does nothing in Firefox.",
//!     )
//!     .category("bug");
//!
//!     if let Some(result) = gateway.summarize_issue("user-42", &issue).await {
//!         println!("{} (quality {})", result.value.summary, result.quality);
//!     }
//!
//!     let today = gateway.daily_usage("user-42").await;
//!     println!("spent ${:.4} on {} requests", today.total_cost, today.request_count);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod cost;
pub mod error;
pub mod gateway;
pub mod providers;
pub mod quality;
pub mod telemetry;
pub mod template;
pub mod types;
pub mod usage;
pub mod version;

// Re-export main types at crate root
pub use error::{ErrorKind, Result, SluiceError};
pub use gateway::{Gateway, PerformanceMetrics, Sluice, SluiceBuilder};

pub use cache::{CacheBackend, CacheConfig, CacheKey, CacheStats, EvictionPolicy, KeyScope};
pub use config::Config;
pub use cost::{CostModel, ModelCostRate};
pub use providers::{CompletionProvider, CompletionRequest, CompletionResponse};
pub use quality::ValidationResult;
pub use template::{PromptTemplate, TemplateRegistry};
pub use types::{
    ClusterInput, ClusterSummary, GatewayResponse, IssueInput, IssueSummary, Payload,
    RequirementCard, RequirementCards, RequirementInput, Structured, StructuredOutput,
    StructuredRequest, TokenUsage,
};
pub use usage::{DailyUsage, UsageRecord, UsageStore, UsageSummary, UsageTracker};

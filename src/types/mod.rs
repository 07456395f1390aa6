//! Public types for the Sluice API.

mod options;
mod payload;
mod response;
mod results;

pub use options::StructuredRequest;
pub use payload::Payload;
pub use response::{GatewayResponse, TokenUsage};
pub use results::{
    ClusterInput, ClusterSummary, IssueInput, IssueSummary, RequirementCard, RequirementCards,
    RequirementInput, Structured, StructuredOutput,
};

//! LLM provider clients.

pub mod openai;
pub mod traits;

pub use openai::OpenAiCompatibleProvider;
pub use traits::{CompletionProvider, CompletionRequest, CompletionResponse};

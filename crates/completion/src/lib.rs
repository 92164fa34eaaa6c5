//! Text-completion client used for classification, continuity detection,
//! checklist synthesis, and open-ended answers.
//!
//! All calls are stateless request/response completions with no side
//! effects beyond latency and cost.

pub mod json;
pub mod openai;
pub mod traits;

pub use json::extract_json_object;
pub use openai::OpenAiCompletionClient;
pub use traits::{
    CompletionClient, CompletionRequest, CompletionResponse, PromptMessage, PromptRole,
};

//! Append-only conversation persistence.
//!
//! Each submission gets a `<submissionId>.jsonl` file under the
//! conversations directory. Every user/assistant turn is appended as a
//! single JSON line carrying its classification metadata, so later turns
//! can re-read it for continuity and confirmation decisions.

pub mod message;
pub mod store;

pub use message::{ConversationMessage, MessageRole};
pub use store::ConversationStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dp_domain::step::Classification;

/// Who authored a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One persisted conversation turn. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub conversation_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// UI section the turn was made from (e.g. "deployment").
    pub section: String,
    /// The classification computed for this turn (assistant messages carry
    /// the classification of the user turn they answered).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    /// Whether a mutating dispatch was actually sent this turn.
    #[serde(default)]
    pub action_taken: bool,
    /// Whether this assistant message asked the user to confirm a proposed
    /// action. Stored at write time so the next turn never has to re-derive
    /// it from the message text.
    #[serde(default)]
    pub expects_confirmation: bool,
}

impl ConversationMessage {
    pub fn user(
        submission_id: Uuid,
        conversation_id: Uuid,
        section: &str,
        content: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            submission_id,
            conversation_id,
            role: MessageRole::User,
            content: content.to_owned(),
            timestamp: Utc::now(),
            section: section.to_owned(),
            classification: None,
            action_taken: false,
            expects_confirmation: false,
        }
    }

    pub fn assistant(
        submission_id: Uuid,
        conversation_id: Uuid,
        section: &str,
        content: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            submission_id,
            conversation_id,
            role: MessageRole::Assistant,
            content: content.to_owned(),
            timestamp: Utc::now(),
            section: section.to_owned(),
            classification: None,
            action_taken: false,
            expects_confirmation: false,
        }
    }

    pub fn with_classification(mut self, classification: Classification) -> Self {
        self.classification = Some(classification);
        self
    }

    pub fn with_action_taken(mut self, taken: bool) -> Self {
        self.action_taken = taken;
        self
    }

    pub fn with_expects_confirmation(mut self, expects: bool) -> Self {
        self.expects_confirmation = expects;
        self
    }
}

//! Continuity detection — decides whether a turn starts a new conversation
//! thread or continues the existing one.
//!
//! Only consulted when the caller supplied no conversation id and at least
//! two prior messages exist. The classification is model-backed and not
//! guaranteed deterministic across retries of the same turn; callers bias
//! toward continuation on anything short of a confident "new".

use dp_completion::{extract_json_object, CompletionClient, CompletionRequest, PromptMessage};
use dp_conversations::ConversationMessage;

/// The continuity verdict for one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuityVerdict {
    pub kind: ContinuityKind,
    pub confidence: f32,
    pub explanation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinuityKind {
    NewConversation,
    ContinueConversation,
}

impl ContinuityVerdict {
    /// Fresh ids are only minted on a confident "new"; every failure mode
    /// falls back to continuing the existing thread.
    pub fn starts_new_thread(&self, continuity_confidence: f32) -> bool {
        self.kind == ContinuityKind::NewConversation && self.confidence > continuity_confidence
    }

    fn continue_fallback(explanation: impl Into<String>) -> Self {
        Self {
            kind: ContinuityKind::ContinueConversation,
            confidence: 0.0,
            explanation: explanation.into(),
        }
    }
}

const CONTINUITY_SYSTEM_PROMPT: &str = r#"You decide whether a user's latest message starts a new conversation topic or continues the prior conversation about a smart-contract analysis workflow.

Respond with ONLY a JSON object:
{"type": "new_conversation" | "continue_conversation", "confidence": <0.0-1.0>, "explanation": "<one sentence>"}"#;

/// Maximum prior messages included in the prompt, most recent last.
const MAX_HISTORY_MESSAGES: usize = 10;

/// Classify conversation continuity. Degrades to "continue" on any
/// transport or parse failure.
pub async fn classify_conversation(
    completion: &dyn CompletionClient,
    latest_message: &str,
    prior_messages: &[ConversationMessage],
) -> ContinuityVerdict {
    let mut history = String::new();
    let start = prior_messages.len().saturating_sub(MAX_HISTORY_MESSAGES);
    for m in &prior_messages[start..] {
        let role = match m.role {
            dp_conversations::MessageRole::User => "user",
            dp_conversations::MessageRole::Assistant => "assistant",
        };
        history.push_str(&format!("{role}: {}\n", m.content));
    }

    let user_prompt = format!(
        "Prior conversation:\n{history}\nLatest user message:\n{latest_message}"
    );

    let req = CompletionRequest::strict_json(vec![
        PromptMessage::system(CONTINUITY_SYSTEM_PROMPT),
        PromptMessage::user(user_prompt),
    ]);

    match completion.complete(req).await {
        Ok(resp) => match parse_verdict(&resp.content) {
            Some(v) => v,
            None => {
                tracing::warn!(raw = %resp.content, "continuity output unparseable; continuing thread");
                ContinuityVerdict::continue_fallback("continuity output was not valid JSON")
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "continuity call failed; continuing thread");
            ContinuityVerdict::continue_fallback(format!("continuity call failed: {e}"))
        }
    }
}

fn parse_verdict(raw: &str) -> Option<ContinuityVerdict> {
    let v = extract_json_object(raw)?;
    let kind = match v.get("type")?.as_str()? {
        "new_conversation" => ContinuityKind::NewConversation,
        "continue_conversation" => ContinuityKind::ContinueConversation,
        _ => return None,
    };
    let confidence = (v.get("confidence")?.as_f64()? as f32).clamp(0.0, 1.0);
    let explanation = v
        .get("explanation")
        .and_then(|e| e.as_str())
        .unwrap_or("")
        .to_string();
    Some(ContinuityVerdict {
        kind,
        confidence,
        explanation,
    })
}

//! Checklist generation — synthesizes the whole user-message history into
//! a canonical bullet list. The output doubles as the confirmation prompt
//! shown to the user and as the opaque `user_prompt` payload sent to the
//! workflow engine on dispatch.

use dp_completion::{CompletionClient, CompletionRequest, PromptMessage};
use dp_domain::step::SECTION_PREVIEW_MAX_CHARS;

use super::context::TurnContext;

/// Fixed first line of every checklist.
pub const CHECKLIST_PREAMBLE: &str = "Here is what I understood from our conversation:";

/// Returned when there is no user message to synthesize from.
pub const EMPTY_CHECKLIST_FALLBACK: &str =
    "Here is what I understood from our conversation:\n- (no specific requests captured yet)";

/// How many trailing messages the naive fallback summarizes.
const FALLBACK_MESSAGE_COUNT: usize = 3;

const CHECKLIST_SYSTEM_PROMPT: &str = r#"You turn a user's accumulated requests about a smart-contract analysis workflow into a short action checklist.

Rules:
- Start with exactly this line: "Here is what I understood from our conversation:"
- Then one "- " bullet per distinct action item, in the order requested.
- No other prose."#;

/// Generate the checklist from every user message in the conversation so
/// far (not just the latest turn). Output that fails validation, and any
/// transport error, falls back to a naive summary of the last few
/// messages — checklist generation never fails the turn.
pub async fn generate(
    completion: &dyn CompletionClient,
    user_messages: &[String],
    ctx: &TurnContext,
) -> String {
    if user_messages.is_empty() {
        return EMPTY_CHECKLIST_FALLBACK.to_string();
    }

    let mut prompt = String::from("User messages, oldest first:\n");
    for (i, m) in user_messages.iter().enumerate() {
        prompt.push_str(&format!("{}. {m}\n", i + 1));
    }

    let req = CompletionRequest {
        messages: vec![
            PromptMessage::system(CHECKLIST_SYSTEM_PROMPT),
            PromptMessage::user(prompt),
        ],
        temperature: Some(0.2),
        max_tokens: Some(500),
        json_mode: false,
    };

    let checklist = match completion.complete(req).await {
        Ok(resp) => resp.content.trim().to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "checklist generation failed; using naive summary");
            naive_summary(user_messages)
        }
    };

    let checklist = if validate(&checklist) {
        checklist
    } else {
        tracing::warn!("generated checklist failed validation; using naive summary");
        naive_summary(user_messages)
    };

    append_section_preview(checklist, ctx)
}

/// A checklist is valid when it opens with the fixed preamble and carries
/// at least one bullet.
pub fn validate(checklist: &str) -> bool {
    checklist.starts_with(CHECKLIST_PREAMBLE)
        && checklist.lines().any(|l| l.trim_start().starts_with("- "))
}

/// Deterministic fallback: one bullet per message for the last few
/// user messages.
pub fn naive_summary(user_messages: &[String]) -> String {
    let start = user_messages.len().saturating_sub(FALLBACK_MESSAGE_COUNT);
    let mut out = String::from(CHECKLIST_PREAMBLE);
    for m in &user_messages[start..] {
        out.push_str("\n- ");
        out.push_str(truncate_chars(m.trim(), 120).trim_end());
    }
    out
}

/// Append a bounded preview of the current section data, when present.
fn append_section_preview(mut checklist: String, ctx: &TurnContext) -> String {
    if let Some(ref data) = ctx.section_data {
        let rendered = match data.as_str() {
            Some(s) => s.to_string(),
            None => data.to_string(),
        };
        let preview = truncate_chars(&rendered, SECTION_PREVIEW_MAX_CHARS);
        checklist.push_str("\n\nCurrent section data (preview): ");
        checklist.push_str(&preview);
    }
    checklist
}

/// Truncate on a char boundary, appending an ellipsis when shortened.
fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_checklist_passes_validation() {
        let c = format!("{CHECKLIST_PREAMBLE}\n- refine the actor analysis");
        assert!(validate(&c));
    }

    #[test]
    fn missing_preamble_fails_validation() {
        assert!(!validate("- refine the actor analysis"));
    }

    #[test]
    fn missing_bullets_fail_validation() {
        assert!(!validate(CHECKLIST_PREAMBLE));
    }

    #[test]
    fn naive_summary_keeps_last_three_messages() {
        let messages: Vec<String> = (1..=5).map(|i| format!("request {i}")).collect();
        let summary = naive_summary(&messages);
        assert!(summary.starts_with(CHECKLIST_PREAMBLE));
        assert!(!summary.contains("request 2"));
        assert!(summary.contains("- request 3"));
        assert!(summary.contains("- request 5"));
        assert!(validate(&summary));
    }

    #[test]
    fn empty_fallback_is_itself_a_valid_checklist() {
        assert!(validate(EMPTY_CHECKLIST_FALLBACK));
    }

    #[test]
    fn section_preview_is_bounded() {
        let ctx = TurnContext {
            section_data: Some(serde_json::Value::String("x".repeat(1000))),
            ..Default::default()
        };
        let out = append_section_preview(CHECKLIST_PREAMBLE.to_string(), &ctx);
        let preview = out.split("(preview): ").nth(1).unwrap();
        assert!(preview.chars().count() <= SECTION_PREVIEW_MAX_CHARS + 1);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "héllo wörld";
        assert_eq!(truncate_chars(s, 100), s);
        let cut = truncate_chars(s, 4);
        assert_eq!(cut, "héll…");
    }
}

//! Conversational Q&A. Every non-mutating turn, and every turn whose
//! dispatch failed, ends up here: an open-ended completion grounded in
//! whatever step context was gathered this turn.

use dp_completion::{CompletionClient, CompletionRequest, PromptMessage};
use dp_conversations::message::{ConversationMessage, MessageRole};

use super::context::TurnContext;

/// Returned verbatim when even the answering completion fails. The caller
/// must never surface a raw error to the chat surface.
pub const GENERIC_APOLOGY: &str =
    "I'm sorry, I ran into a problem answering that. Please try again in a moment.";

const QA_SYSTEM_PROMPT: &str = r#"You are a deployment assistant for a smart-contract analysis workflow. Answer the user's question using the step context provided. Be concise and concrete. If the context does not cover the question, say what you do know and what is still being analyzed. Never invent analysis results."#;

/// How many prior messages are replayed into the answering prompt.
const MAX_HISTORY_MESSAGES: usize = 12;

/// Answer an open-ended question against the gathered step context.
/// Degrades to [`GENERIC_APOLOGY`] instead of erroring.
pub async fn answer(
    completion: &dyn CompletionClient,
    user_message: &str,
    history: &[ConversationMessage],
    ctx: &TurnContext,
) -> String {
    let mut messages = vec![PromptMessage::system(QA_SYSTEM_PROMPT)];

    let context_block = render_context(ctx);
    if !context_block.is_empty() {
        messages.push(PromptMessage::system(format!(
            "Current step context:\n{context_block}"
        )));
    }

    let start = history.len().saturating_sub(MAX_HISTORY_MESSAGES);
    for msg in &history[start..] {
        messages.push(match msg.role {
            MessageRole::User => PromptMessage::user(&msg.content),
            MessageRole::Assistant => PromptMessage::assistant(&msg.content),
        });
    }
    messages.push(PromptMessage::user(user_message));

    let req = CompletionRequest {
        messages,
        temperature: Some(0.4),
        max_tokens: Some(800),
        json_mode: false,
    };

    match completion.complete(req).await {
        Ok(resp) => {
            let content = resp.content.trim();
            if content.is_empty() {
                GENERIC_APOLOGY.to_string()
            } else {
                content.to_string()
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "qa completion failed");
            GENERIC_APOLOGY.to_string()
        }
    }
}

/// Flatten the gathered context into a prompt block. Empty when nothing
/// was fetched this turn.
fn render_context(ctx: &TurnContext) -> String {
    let mut out = String::new();
    if let Some(ref data) = ctx.section_data {
        out.push_str("Section data:\n");
        out.push_str(&data.to_string());
        out.push('\n');
    }
    if let Some(ref status) = ctx.step_status {
        out.push_str(&format!("Step status: {status}\n"));
    }
    let logs = ctx.merged_logs();
    if !logs.is_empty() {
        out.push_str("Recent logs:\n");
        out.push_str(&logs);
        out.push('\n');
    }
    for note in &ctx.notes {
        out.push_str("Note: ");
        out.push_str(note);
        out.push('\n');
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn render_context_empty_when_nothing_gathered() {
        assert!(render_context(&TurnContext::default()).is_empty());
    }

    #[test]
    fn render_context_includes_section_and_notes() {
        let ctx = TurnContext {
            section_data: Some(json!({"actors": ["deployer"]})),
            notes: vec!["instructions pending".to_string()],
            ..Default::default()
        };
        let block = render_context(&ctx);
        assert!(block.contains("deployer"));
        assert!(block.contains("Note: instructions pending"));
    }
}

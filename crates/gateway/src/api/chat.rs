//! Chat API — the conversational surface over the analysis workflow.
//!
//! `POST /v1/chat` runs one full turn: continuity, classification, the
//! confirmation gate, optional dispatch, and a composed reply.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dp_domain::step::{AnalysisStep, Classification};
use dp_domain::error::Error;
use dp_workflow::SubmissionRef;

use crate::runtime::TurnInput;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / response shapes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatTurnRequest {
    /// Chat-style message list; the turn runs on the last user message.
    pub messages: Vec<InboundMessage>,
    /// Target submission. Wins over `project_id` when both are present.
    #[serde(default)]
    pub submission_id: Option<Uuid>,
    /// Project to resolve to its latest submission.
    #[serde(default)]
    pub project_id: Option<i64>,
    /// Human-readable project name, passed through to classification.
    #[serde(default)]
    pub project_name: Option<String>,
    /// Which report section the user is viewing.
    #[serde(default = "d_section")]
    pub section: String,
    /// Caller's step hint.
    #[serde(default)]
    pub analysis_step: Option<AnalysisStep>,
    /// Pin the turn to an existing conversation thread, skipping
    /// continuity detection.
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
}

fn d_section() -> String {
    "general".to_string()
}

#[derive(Debug, Serialize)]
pub struct ChatTurnResponse {
    pub response: String,
    pub conversation_id: Uuid,
    pub classification: Classification,
    pub action_taken: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/chat
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatTurnRequest>,
) -> impl IntoResponse {
    let Some(message) = body
        .messages
        .iter()
        .rev()
        .find(|m| m.role == "user" && !m.content.trim().is_empty())
        .map(|m| m.content.clone())
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "messages must contain a non-empty user message" })),
        )
            .into_response();
    };

    // Identifier resolution is the one terminal failure: without a
    // submission there is nothing to converse about.
    let submission_ref = match SubmissionRef::from_request(body.submission_id, body.project_id) {
        Ok(r) => r,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };
    let submission_id = match submission_ref.resolve(state.workflow.as_ref()).await {
        Ok(id) => id,
        Err(Error::Resolve(msg)) => {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "error": msg })),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "submission resolution failed");
            return (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({
                    "error": "could not reach the workflow engine to resolve the project"
                })),
            )
                .into_response();
        }
    };

    let outcome = state
        .runtime
        .run_turn(TurnInput {
            submission_id,
            conversation_id: body.conversation_id,
            project_name: body.project_name,
            section: body.section,
            analysis_step: body.analysis_step,
            user_message: message,
        })
        .await;

    Json(ChatTurnResponse {
        response: outcome.response,
        conversation_id: outcome.conversation_id,
        classification: outcome.classification,
        action_taken: outcome.action_taken,
    })
    .into_response()
}

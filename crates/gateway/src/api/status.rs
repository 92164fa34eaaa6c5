//! Readiness and submission status endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Serialize;
use uuid::Uuid;

use dp_domain::step::{AnalysisStep, StepStatus};

use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/readiness
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Liveness-grade readiness probe. Reports which provider the gateway
/// will use without calling it.
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "completion_provider": state.runtime.completion.provider_id(),
        "workflow_base_url": state.config.workflow.base_url,
    }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/submissions/:id/steps
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Serialize)]
pub struct StepView {
    pub step: AnalysisStep,
    pub label: String,
    pub status: StepStatus,
    pub details: String,
}

/// The submission's pipeline state: local records, refreshed against the
/// engine when it is reachable. Engine unavailability degrades to the
/// last known local view rather than failing the request.
pub async fn submission_steps(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    if let Err(e) = state.records.register_submission(id) {
        tracing::warn!(submission_id = %id, error = %e, "step record registration failed");
    }

    match state.workflow.submission_status(id).await {
        Ok(status) => {
            if let Err(e) = state.records.reconcile(id, &status.steps) {
                tracing::warn!(submission_id = %id, error = %e, "step reconcile failed");
            }
        }
        Err(e) => {
            tracing::warn!(submission_id = %id, error = %e, "engine status unavailable; serving local records");
        }
    }

    let steps: Vec<StepView> = state
        .records
        .all(id)
        .into_iter()
        .map(|r| StepView {
            step: r.step,
            label: r.step.label().to_string(),
            status: r.status,
            details: r.details,
        })
        .collect();

    Json(serde_json::json!({ "submission_id": id, "steps": steps }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/submissions/:id/conversation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Full persisted conversation history for a submission, oldest first.
pub async fn submission_conversation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.conversations.for_submission(id).await {
        Ok(messages) => Json(serde_json::json!({
            "submission_id": id,
            "messages": messages,
        }))
        .into_response(),
        Err(e) => {
            tracing::error!(submission_id = %id, error = %e, "conversation load failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "could not load conversation history" })),
            )
                .into_response()
        }
    }
}

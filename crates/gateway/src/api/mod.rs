pub mod chat;
pub mod status;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
pub fn router() -> Router<AppState> {
    Router::new()
        // Chat (core runtime)
        .route("/v1/chat", post(chat::chat))
        // Health probes
        .route("/v1/readiness", get(status::readiness))
        // Step status for a submission
        .route("/v1/submissions/:id/steps", get(status::submission_steps))
        // Conversation history for a submission
        .route(
            "/v1/submissions/:id/conversation",
            get(status::submission_conversation),
        )
}

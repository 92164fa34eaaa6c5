use std::sync::Arc;

use dp_conversations::ConversationStore;
use dp_domain::config::Config;
use dp_workflow::{StepRecordStore, WorkflowEngine};

use crate::runtime::Runtime;

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// The per-turn pipeline (classification, gate, dispatch, persistence).
    pub runtime: Arc<Runtime>,
    /// Read access for the status endpoints.
    pub workflow: Arc<dyn WorkflowEngine>,
    pub conversations: Arc<ConversationStore>,
    pub records: Arc<StepRecordStore>,
}

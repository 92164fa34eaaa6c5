//! AppState construction extracted from `main.rs`.

use std::sync::Arc;

use anyhow::Context;

use dp_completion::{CompletionClient, OpenAiCompletionClient};
use dp_conversations::ConversationStore;
use dp_domain::config::Config;
use dp_workflow::{HttpWorkflowEngine, StepRecordStore, WorkflowEngine};

use crate::runtime::{gate::GateMatcher, Runtime};
use crate::state::AppState;

/// Initialize every subsystem and return a fully-wired [`AppState`].
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Completion client ────────────────────────────────────────────
    let completion: Arc<dyn CompletionClient> = Arc::new(
        OpenAiCompletionClient::from_config(&config.completion)
            .context("initializing completion client")?,
    );
    tracing::info!(
        base_url = %config.completion.base_url,
        model = %config.completion.model,
        "completion client ready"
    );

    // ── Workflow engine ──────────────────────────────────────────────
    let workflow: Arc<dyn WorkflowEngine> = Arc::new(
        HttpWorkflowEngine::from_config(&config.workflow)
            .context("initializing workflow engine")?,
    );
    tracing::info!(base_url = %config.workflow.base_url, "workflow engine ready");

    // ── Stores ───────────────────────────────────────────────────────
    let conversations = Arc::new(
        ConversationStore::new(&config.store.state_path)
            .context("initializing conversation store")?,
    );
    let records = Arc::new(
        StepRecordStore::new(&config.store.state_path)
            .context("initializing step record store")?,
    );
    tracing::info!(path = %config.store.state_path.display(), "stores ready");

    let runtime = Arc::new(Runtime {
        completion,
        workflow: workflow.clone(),
        conversations: conversations.clone(),
        records: records.clone(),
        matcher: GateMatcher::default(),
        gates: config.gates.clone(),
    });

    Ok(AppState {
        config,
        runtime,
        workflow,
        conversations,
        records,
    })
}

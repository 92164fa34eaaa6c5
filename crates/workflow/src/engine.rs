use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dp_domain::error::Result;
use dp_domain::step::{AnalysisStep, StepStatus};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One log fragment returned by the engine, tagged with its source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFragment {
    pub source: String,
    pub content: String,
}

/// The engine's view of one step's lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteStepStatus {
    pub step: AnalysisStep,
    pub status: StepStatus,
    #[serde(default)]
    pub details: Option<String>,
}

/// The generic submission status + log bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionStatus {
    pub submission_id: Uuid,
    pub steps: Vec<RemoteStepStatus>,
    #[serde(default)]
    pub logs: Vec<LogFragment>,
}

impl SubmissionStatus {
    pub fn step(&self, step: AnalysisStep) -> Option<&RemoteStepStatus> {
        self.steps.iter().find(|s| s.step == step)
    }
}

/// The mutating analysis dispatch payload.
///
/// `user_prompt` carries the synthesized checklist verbatim — it is an
/// opaque instruction blob as far as this crate is concerned.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeRequest {
    pub submission_id: Uuid,
    pub step: AnalysisStep,
    pub user_prompt: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Engine trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The remote workflow engine, consumed as an interface only.
///
/// The gateway only ever talks to this trait; tests substitute scripted
/// implementations.
#[async_trait::async_trait]
pub trait WorkflowEngine: Send + Sync {
    /// Fetch the dedicated summary document for one step. The engine is
    /// authoritative for the three summary steps (project, actors,
    /// deployment); other steps have no dedicated endpoint and callers
    /// fall back to [`submission_status`](Self::submission_status).
    async fn step_summary(
        &self,
        submission_id: Uuid,
        step: AnalysisStep,
    ) -> Result<serde_json::Value>;

    /// Fetch the generic status + log bundle for a submission.
    async fn submission_status(&self, submission_id: Uuid) -> Result<SubmissionStatus>;

    /// Trigger asynchronous recomputation of a step. The only mutating
    /// call in the system; callers gate it behind explicit confirmation.
    async fn dispatch_analysis(&self, req: &AnalyzeRequest) -> Result<()>;

    /// Resolve an integer project id to its most-recently-created
    /// submission UUID.
    async fn latest_submission_for_project(&self, project_id: i64) -> Result<Uuid>;
}

//! Context aggregation — fetches and merges step data and logs from the
//! local step-record cache and the remote workflow engine.
//!
//! Sources are resolved through a dispatch table keyed by step (no
//! per-step branching at call sites). Every fetch failure is caught,
//! logged, and degrades to omission; a turn never aborts because one
//! source was unavailable.

use serde_json::Value;
use uuid::Uuid;

use dp_domain::step::{AnalysisStep, StepStatus};
use dp_workflow::{LogFragment, StepRecordStore, WorkflowEngine};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Source dispatch table
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Which remote endpoint serves a step's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEndpoint {
    /// The step has a dedicated summary endpoint on the engine.
    DedicatedSummary,
    /// Only the generic submission status bundle covers the step.
    GenericStatus,
}

/// How one step's context is sourced.
#[derive(Debug, Clone, Copy)]
pub struct StepSource {
    pub endpoint: SourceEndpoint,
    /// When true, the engine's document wins over the local cache.
    pub authoritative: bool,
}

/// The dispatch table. Adding a step means adding one arm here, nothing
/// else in the aggregation path changes.
pub fn step_source(step: AnalysisStep) -> StepSource {
    match step {
        AnalysisStep::AnalyzeProject
        | AnalysisStep::AnalyzeActors
        | AnalysisStep::AnalyzeDeployment => StepSource {
            endpoint: SourceEndpoint::DedicatedSummary,
            authoritative: true,
        },
        AnalysisStep::ImplementDeploymentScript
        | AnalysisStep::VerifyDeploymentScript
        | AnalysisStep::Unknown => StepSource {
            endpoint: SourceEndpoint::GenericStatus,
            authoritative: false,
        },
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Gathered context
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Everything the rest of the turn needs to know about the current step.
#[derive(Debug, Default)]
pub struct TurnContext {
    pub section_data: Option<Value>,
    pub step_status: Option<StepStatus>,
    /// Ordered, source-tagged log fragments.
    pub logs: Vec<LogFragment>,
    /// Explanatory notes surfaced to the user (e.g. dependency rewrites).
    pub notes: Vec<String>,
}

impl TurnContext {
    /// The merged log transcript, one `[source] content` line per fragment.
    pub fn merged_logs(&self) -> String {
        self.logs
            .iter()
            .map(|f| format!("[{}] {}", f.source, f.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// gather
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Gather context for one (submission, step) pair.
///
/// The local record read is synchronous and cheap; the two remote calls
/// address disjoint resources and are issued concurrently, fan-in before
/// merging. Completion order is irrelevant to the result.
pub async fn gather(
    engine: &dyn WorkflowEngine,
    records: &StepRecordStore,
    submission_id: Uuid,
    step: AnalysisStep,
) -> TurnContext {
    let source = step_source(step);
    let local = records.get(submission_id, step);

    let summary_fut = async {
        if source.endpoint == SourceEndpoint::DedicatedSummary {
            match engine.step_summary(submission_id, step).await {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!(%submission_id, %step, error = %e, "summary fetch failed; omitting");
                    None
                }
            }
        } else {
            None
        }
    };
    let status_fut = async {
        match engine.submission_status(submission_id).await {
            Ok(s) => Some(s),
            Err(e) => {
                tracing::warn!(%submission_id, error = %e, "status fetch failed; omitting");
                None
            }
        }
    };

    let (summary, status) = tokio::join!(summary_fut, status_fut);

    // Reconcile the local cache with the engine's view (best-effort).
    if let Some(ref s) = status {
        if let Err(e) = records.reconcile(submission_id, &s.steps) {
            tracing::warn!(%submission_id, error = %e, "step record reconcile failed");
        }
    }

    // Resolve section data: the engine wins where it is authoritative,
    // the local cache fills every gap.
    let local_data = local.as_ref().and_then(|r| r.json_data.clone());
    let section_data = if source.authoritative {
        summary.or(local_data)
    } else {
        local_data
    };

    // Step status: prefer the engine's fresh view, fall back to the cache.
    let step_status = status
        .as_ref()
        .and_then(|s| s.step(step).map(|r| r.status))
        .or(local.as_ref().map(|r| r.status));

    // Merge logs: local details first, then the engine bundle in order.
    let mut logs = Vec::new();
    if let Some(ref record) = local {
        if !record.details.is_empty() {
            logs.push(LogFragment {
                source: "local".into(),
                content: record.details.clone(),
            });
        }
    }
    if let Some(s) = status {
        logs.extend(s.logs);
    }

    TurnContext {
        section_data,
        step_status,
        logs,
        notes: Vec::new(),
    }
}

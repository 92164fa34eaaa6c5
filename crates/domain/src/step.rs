//! The analysis-step taxonomy and intent-classification types.
//!
//! Wire names (snake_case) match the workflow engine's step identifiers,
//! so these enums serialize directly into engine requests and back out of
//! classifier JSON.

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Confidence thresholds
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Minimum classifier confidence before a mutating dispatch is proposed.
pub const DISPATCH_CONFIDENCE: f32 = 0.7;

/// Minimum confidence at which the deployment-instructions dependency
/// pre-check fires for `implement_deployment_script` requests.
pub const DEPENDENCY_CONFIDENCE: f32 = 0.6;

/// Minimum confidence for the continuity detector to mint a fresh
/// conversation id instead of reusing the existing one.
pub const CONTINUITY_CONFIDENCE: f32 = 0.7;

/// Maximum characters of section data included in checklist previews.
pub const SECTION_PREVIEW_MAX_CHARS: usize = 200;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Analysis steps
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A named phase of the externally executed analysis workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStep {
    AnalyzeProject,
    AnalyzeActors,
    AnalyzeDeployment,
    ImplementDeploymentScript,
    VerifyDeploymentScript,
    Unknown,
}

impl AnalysisStep {
    /// The concrete workflow steps, in execution order. Excludes `Unknown`.
    pub fn pipeline() -> [AnalysisStep; 5] {
        [
            AnalysisStep::AnalyzeProject,
            AnalysisStep::AnalyzeActors,
            AnalysisStep::AnalyzeDeployment,
            AnalysisStep::ImplementDeploymentScript,
            AnalysisStep::VerifyDeploymentScript,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStep::AnalyzeProject => "analyze_project",
            AnalysisStep::AnalyzeActors => "analyze_actors",
            AnalysisStep::AnalyzeDeployment => "analyze_deployment",
            AnalysisStep::ImplementDeploymentScript => "implement_deployment_script",
            AnalysisStep::VerifyDeploymentScript => "verify_deployment_script",
            AnalysisStep::Unknown => "unknown",
        }
    }

    /// Parse a wire-format step name. Anything unrecognized is `Unknown`
    /// (classifier output is untrusted).
    pub fn parse(s: &str) -> AnalysisStep {
        match s.trim() {
            "analyze_project" => AnalysisStep::AnalyzeProject,
            "analyze_actors" => AnalysisStep::AnalyzeActors,
            "analyze_deployment" => AnalysisStep::AnalyzeDeployment,
            "implement_deployment_script" => AnalysisStep::ImplementDeploymentScript,
            "verify_deployment_script" => AnalysisStep::VerifyDeploymentScript,
            _ => AnalysisStep::Unknown,
        }
    }

    /// Human-readable label used in composed responses.
    pub fn label(&self) -> &'static str {
        match self {
            AnalysisStep::AnalyzeProject => "project summary",
            AnalysisStep::AnalyzeActors => "actor analysis",
            AnalysisStep::AnalyzeDeployment => "deployment instructions",
            AnalysisStep::ImplementDeploymentScript => "deployment script implementation",
            AnalysisStep::VerifyDeploymentScript => "deployment script verification",
            AnalysisStep::Unknown => "analysis",
        }
    }
}

impl std::fmt::Display for AnalysisStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Step status
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Lifecycle state of one analysis step, local mirror of the engine's view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepStatus::Pending => "pending",
            StepStatus::InProgress => "in_progress",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// User actions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What the user wants done with the classified step.
///
/// `NeedsFollowup` marks messages that reference a step but need more
/// information from the user before anything can run; it answers directly
/// and never enters the confirmation gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserAction {
    Refine,
    Clarify,
    Update,
    Run,
    NeedsFollowup,
    Unknown,
}

impl UserAction {
    pub fn parse(s: &str) -> UserAction {
        match s.trim() {
            "refine" => UserAction::Refine,
            "clarify" => UserAction::Clarify,
            "update" => UserAction::Update,
            "run" => UserAction::Run,
            "needs_followup" => UserAction::NeedsFollowup,
            _ => UserAction::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserAction::Refine => "refine",
            UserAction::Clarify => "clarify",
            UserAction::Update => "update",
            UserAction::Run => "run",
            UserAction::NeedsFollowup => "needs_followup",
            UserAction::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for UserAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Classification
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The inferred (step, action, confidence) triple for one user message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub step: AnalysisStep,
    pub action: UserAction,
    /// Opaque self-reported score in `[0, 1]`.
    pub confidence: f32,
    pub explanation: String,
    pub is_actionable: bool,
}

impl Classification {
    /// The degenerate classification used when the classifier output is
    /// malformed or absent. Never blocks a turn.
    pub fn unknown(explanation: impl Into<String>) -> Self {
        Self {
            step: AnalysisStep::Unknown,
            action: UserAction::Unknown,
            confidence: 0.0,
            explanation: explanation.into(),
            is_actionable: false,
        }
    }

    /// Whether this classification clears the bar for proposing a mutating
    /// dispatch. `NeedsFollowup` answers directly and never proposes.
    pub fn warrants_action(&self, dispatch_confidence: f32) -> bool {
        self.is_actionable
            && self.confidence >= dispatch_confidence
            && self.action != UserAction::NeedsFollowup
            && self.step != AnalysisStep::Unknown
    }
}

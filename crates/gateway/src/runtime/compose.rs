//! Response composition. Canned acknowledgements for dispatched work and
//! assembly of the confirmation proposal shown before any mutating call.

use dp_domain::step::{AnalysisStep, UserAction};

use super::gate::CONFIRMATION_QUESTION;

/// Reply sent when the user declines a proposed change.
pub const REJECTION_ACK: &str =
    "Understood, I won't make those changes. Let me know if there is anything else you'd like to adjust.";

/// Canned acknowledgement for a dispatched analysis run. The workflow
/// executes asynchronously, so the reply only confirms that work started.
pub fn acknowledgement(step: AnalysisStep, action: UserAction) -> String {
    let verb = match action {
        UserAction::Refine => "refining",
        UserAction::Update => "updating",
        UserAction::Run => "running",
        UserAction::Clarify | UserAction::NeedsFollowup | UserAction::Unknown => "re-running",
    };
    let target = match step {
        AnalysisStep::AnalyzeProject => "the project analysis",
        AnalysisStep::AnalyzeActors => "the actor analysis",
        AnalysisStep::AnalyzeDeployment => "the deployment instructions",
        AnalysisStep::ImplementDeploymentScript => "the deployment script",
        AnalysisStep::VerifyDeploymentScript => "the deployment script verification",
        AnalysisStep::Unknown => "the analysis",
    };
    format!(
        "Got it, I'm {verb} {target} now. I'll have updated results for you shortly; \
         feel free to keep asking questions in the meantime."
    )
}

/// Assemble the confirmation proposal: checklist first, then the fixed
/// confirmation question on its own paragraph.
pub fn proposal(checklist: &str) -> String {
    format!("{checklist}\n\n{CONFIRMATION_QUESTION}")
}

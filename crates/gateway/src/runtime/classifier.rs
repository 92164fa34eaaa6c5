//! Intent classification — maps the latest user message plus turn context
//! to a (step, action, confidence) triple via a strict-JSON completion
//! call. Malformed or absent output degrades to `unknown`/confidence 0;
//! classification never fails a turn.

use dp_completion::{extract_json_object, CompletionClient, CompletionRequest, PromptMessage};
use dp_domain::step::{AnalysisStep, Classification, UserAction};

/// Context handed to the classifier for one turn.
pub struct ClassifyContext<'a> {
    pub project_name: Option<&'a str>,
    pub section: &'a str,
    pub current_step: AnalysisStep,
}

const CLASSIFY_SYSTEM_PROMPT: &str = r#"You classify a user's message in a conversation about a smart-contract analysis workflow.

The workflow steps are: analyze_project (project summary), analyze_actors (actor analysis), analyze_deployment (deployment instructions), implement_deployment_script, verify_deployment_script.

The possible actions are: refine (improve an existing result), clarify (explain a result), update (change inputs or assumptions), run (execute a step), needs_followup (the request is missing information you must ask for), unknown.

Respond with ONLY a JSON object:
{"step": "<step or unknown>", "action": "<action>", "confidence": <0.0-1.0>, "explanation": "<one sentence>", "is_actionable": <true if the user is asking for the workflow to be changed or re-run>}"#;

/// Classify one user message. Returns the degenerate `unknown`
/// classification on any transport or parse failure.
pub async fn classify(
    completion: &dyn CompletionClient,
    user_message: &str,
    ctx: &ClassifyContext<'_>,
) -> Classification {
    let user_prompt = build_user_prompt(user_message, ctx);

    let req = CompletionRequest::strict_json(vec![
        PromptMessage::system(CLASSIFY_SYSTEM_PROMPT),
        PromptMessage::user(user_prompt),
    ]);

    match completion.complete(req).await {
        Ok(resp) => match parse_classification(&resp.content) {
            Some(c) => c,
            None => {
                tracing::warn!(
                    raw = %resp.content,
                    "classifier returned unparseable output; degrading to unknown"
                );
                Classification::unknown("classifier output was not valid JSON")
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "classifier call failed; degrading to unknown");
            Classification::unknown(format!("classifier call failed: {e}"))
        }
    }
}

fn build_user_prompt(user_message: &str, ctx: &ClassifyContext<'_>) -> String {
    let mut prompt = String::new();
    if let Some(name) = ctx.project_name {
        prompt.push_str(&format!("Project: {name}\n"));
    }
    prompt.push_str(&format!(
        "Current section: {}\nCurrent step: {}\n\nUser message:\n{}",
        ctx.section, ctx.current_step, user_message,
    ));
    prompt
}

/// Parse the classifier's JSON output. `None` when the shape is wrong.
pub fn parse_classification(raw: &str) -> Option<Classification> {
    let v = extract_json_object(raw)?;

    let step = AnalysisStep::parse(v.get("step")?.as_str()?);
    let action = UserAction::parse(v.get("action")?.as_str()?);
    let confidence = (v.get("confidence")?.as_f64()? as f32).clamp(0.0, 1.0);
    let explanation = v
        .get("explanation")
        .and_then(|e| e.as_str())
        .unwrap_or("")
        .to_string();
    let is_actionable = v
        .get("is_actionable")
        .and_then(|b| b.as_bool())
        .unwrap_or(false);

    Some(Classification {
        step,
        action,
        confidence,
        explanation,
        is_actionable,
    })
}

/// The deployment-script dependency pre-check.
///
/// `implement_deployment_script` only makes sense once deployment
/// instructions exist upstream. When they are missing and the classifier
/// was at least moderately confident, the step is rewritten to
/// `analyze_deployment` and an explanatory note for the user is returned.
pub fn apply_dependency_precheck(
    classification: &mut Classification,
    instructions_available: bool,
    dependency_confidence: f32,
) -> Option<String> {
    if classification.step != AnalysisStep::ImplementDeploymentScript
        || classification.confidence < dependency_confidence
        || instructions_available
    {
        return None;
    }

    classification.step = AnalysisStep::AnalyzeDeployment;
    Some(INSTRUCTIONS_MISSING_NOTE.to_string())
}

/// Note surfaced to the user whenever a script request is redirected to
/// the deployment-instructions step.
pub const INSTRUCTIONS_MISSING_NOTE: &str =
    "Deployment instructions have not been generated yet, so the request \
     was redirected to the deployment-instructions step first.";

#[cfg(test)]
mod tests {
    use super::*;
    use dp_domain::step::DEPENDENCY_CONFIDENCE;

    #[test]
    fn parses_well_formed_output() {
        let raw = r#"{"step": "analyze_actors", "action": "refine", "confidence": 0.85,
                      "explanation": "user wants better actor coverage", "is_actionable": true}"#;
        let c = parse_classification(raw).unwrap();
        assert_eq!(c.step, AnalysisStep::AnalyzeActors);
        assert_eq!(c.action, UserAction::Refine);
        assert!((c.confidence - 0.85).abs() < f32::EPSILON);
        assert!(c.is_actionable);
    }

    #[test]
    fn parses_fenced_output() {
        let raw = "```json\n{\"step\": \"analyze_project\", \"action\": \"run\", \"confidence\": 1.0, \"is_actionable\": true}\n```";
        let c = parse_classification(raw).unwrap();
        assert_eq!(c.step, AnalysisStep::AnalyzeProject);
        assert_eq!(c.action, UserAction::Run);
    }

    #[test]
    fn confidence_is_clamped() {
        let raw = r#"{"step": "analyze_project", "action": "run", "confidence": 3.5, "is_actionable": true}"#;
        let c = parse_classification(raw).unwrap();
        assert_eq!(c.confidence, 1.0);
    }

    #[test]
    fn missing_fields_fail_parse() {
        assert!(parse_classification(r#"{"step": "analyze_project"}"#).is_none());
        assert!(parse_classification("just prose").is_none());
    }

    #[test]
    fn unknown_step_name_degrades_not_fails() {
        let raw = r#"{"step": "summarize_everything", "action": "run", "confidence": 0.9, "is_actionable": true}"#;
        let c = parse_classification(raw).unwrap();
        assert_eq!(c.step, AnalysisStep::Unknown);
    }

    #[test]
    fn prompt_carries_project_section_and_step() {
        let ctx = ClassifyContext {
            project_name: Some("uniswap-fork"),
            section: "deployment",
            current_step: AnalysisStep::AnalyzeDeployment,
        };
        let prompt = build_user_prompt("redo it", &ctx);
        assert!(prompt.contains("Project: uniswap-fork"));
        assert!(prompt.contains("Current section: deployment"));
        assert!(prompt.contains("redo it"));
    }

    #[test]
    fn prompt_omits_project_line_when_unknown() {
        let ctx = ClassifyContext {
            project_name: None,
            section: "deployment",
            current_step: AnalysisStep::AnalyzeProject,
        };
        assert!(!build_user_prompt("hi", &ctx).contains("Project:"));
    }

    #[test]
    fn precheck_rewrites_step_when_instructions_missing() {
        let mut c = Classification {
            step: AnalysisStep::ImplementDeploymentScript,
            action: UserAction::Run,
            confidence: 0.8,
            explanation: String::new(),
            is_actionable: true,
        };
        let note = apply_dependency_precheck(&mut c, false, DEPENDENCY_CONFIDENCE);
        assert!(note.is_some());
        assert_eq!(c.step, AnalysisStep::AnalyzeDeployment);
    }

    #[test]
    fn precheck_skipped_below_confidence_floor() {
        let mut c = Classification {
            step: AnalysisStep::ImplementDeploymentScript,
            action: UserAction::Run,
            confidence: 0.5,
            explanation: String::new(),
            is_actionable: true,
        };
        assert!(apply_dependency_precheck(&mut c, false, DEPENDENCY_CONFIDENCE).is_none());
        assert_eq!(c.step, AnalysisStep::ImplementDeploymentScript);
    }

    #[test]
    fn precheck_noop_when_instructions_exist() {
        let mut c = Classification {
            step: AnalysisStep::ImplementDeploymentScript,
            action: UserAction::Run,
            confidence: 0.9,
            explanation: String::new(),
            is_actionable: true,
        };
        assert!(apply_dependency_precheck(&mut c, true, DEPENDENCY_CONFIDENCE).is_none());
        assert_eq!(c.step, AnalysisStep::ImplementDeploymentScript);
    }
}

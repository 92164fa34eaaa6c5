//! End-to-end turn pipeline tests against scripted completion and
//! workflow mocks: proposal, confirmation, rejection, dispatch failure,
//! and the dependency pre-check.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;
use uuid::Uuid;

use dp_completion::{CompletionClient, CompletionRequest, CompletionResponse};
use dp_conversations::{ConversationMessage, ConversationStore};
use dp_domain::config::GatesConfig;
use dp_domain::error::{Error, Result};
use dp_domain::step::{AnalysisStep, Classification, UserAction};
use dp_gateway::runtime::compose::REJECTION_ACK;
use dp_gateway::runtime::gate::{GateMatcher, CONFIRMATION_QUESTION};
use dp_gateway::runtime::{Runtime, TurnInput};
use dp_workflow::{
    AnalyzeRequest, StepRecordStore, SubmissionStatus, WorkflowEngine,
};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Mocks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Scripted completion client. Routes by the system prompt so one mock
/// serves the classifier, continuity, checklist, and Q&A calls.
struct ScriptedCompletion {
    classification: String,
    checklist: String,
    qa: String,
}

impl ScriptedCompletion {
    fn new(classification: &str) -> Self {
        Self {
            classification: classification.to_string(),
            checklist: "Here is what I understood from our conversation:\n- re-run the requested analysis".to_string(),
            qa: "Here is what the analysis currently shows.".to_string(),
        }
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn complete(&self, req: CompletionRequest) -> Result<CompletionResponse> {
        let system = req
            .messages
            .first()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let content = if system.contains("You classify a user's message") {
            self.classification.clone()
        } else if system.contains("new conversation topic") {
            r#"{"type": "continue_conversation", "confidence": 0.9}"#.to_string()
        } else if system.contains("action checklist") {
            self.checklist.clone()
        } else {
            self.qa.clone()
        };
        Ok(CompletionResponse {
            content,
            model: "scripted".to_string(),
        })
    }

    fn provider_id(&self) -> &str {
        "scripted"
    }
}

/// In-memory workflow engine recording every dispatch.
#[derive(Default)]
struct FakeEngine {
    summaries: HashMap<AnalysisStep, serde_json::Value>,
    dispatch_error: Option<fn() -> Error>,
    dispatched: Mutex<Vec<AnalyzeRequest>>,
}

#[async_trait]
impl WorkflowEngine for FakeEngine {
    async fn step_summary(
        &self,
        _submission_id: Uuid,
        step: AnalysisStep,
    ) -> Result<serde_json::Value> {
        self.summaries
            .get(&step)
            .cloned()
            .ok_or_else(|| Error::Http(format!("status 404 fetching summary for {step}")))
    }

    async fn submission_status(&self, submission_id: Uuid) -> Result<SubmissionStatus> {
        Ok(SubmissionStatus {
            submission_id,
            steps: Vec::new(),
            logs: Vec::new(),
        })
    }

    async fn dispatch_analysis(&self, req: &AnalyzeRequest) -> Result<()> {
        if let Some(make_err) = self.dispatch_error {
            return Err(make_err());
        }
        self.dispatched.lock().push(req.clone());
        Ok(())
    }

    async fn latest_submission_for_project(&self, project_id: i64) -> Result<Uuid> {
        Err(Error::Resolve(format!("no submissions for project {project_id}")))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Harness
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Harness {
    runtime: Runtime,
    engine: Arc<FakeEngine>,
    submission_id: Uuid,
    _state: TempDir,
}

fn harness(completion: ScriptedCompletion, engine: FakeEngine) -> Harness {
    let state = TempDir::new().unwrap();
    let engine = Arc::new(engine);
    let runtime = Runtime {
        completion: Arc::new(completion),
        workflow: engine.clone(),
        conversations: Arc::new(ConversationStore::new(state.path()).unwrap()),
        records: Arc::new(StepRecordStore::new(state.path()).unwrap()),
        matcher: GateMatcher::default(),
        gates: GatesConfig::default(),
    };
    Harness {
        runtime,
        engine,
        submission_id: Uuid::new_v4(),
        _state: state,
    }
}

fn input(h: &Harness, conversation_id: Option<Uuid>, message: &str) -> TurnInput {
    TurnInput {
        submission_id: h.submission_id,
        conversation_id,
        project_name: Some("uniswap-fork".to_string()),
        section: "deployment".to_string(),
        analysis_step: None,
        user_message: message.to_string(),
    }
}

const ACTIONABLE_REFINE_ACTORS: &str = r#"{"step": "analyze_actors", "action": "refine",
    "confidence": 0.85, "explanation": "wants more actors", "is_actionable": true}"#;

/// Seed a pending proposal so the next turn lands in confirmation state.
async fn seed_proposal(h: &Harness, conversation_id: Uuid) {
    seed_proposal_for(h, conversation_id, AnalysisStep::AnalyzeActors, UserAction::Refine).await;
}

async fn seed_proposal_for(
    h: &Harness,
    conversation_id: Uuid,
    step: AnalysisStep,
    action: UserAction,
) {
    let proposal_text = format!(
        "Here is what I understood from our conversation:\n- re-run the actor analysis\n\n{CONFIRMATION_QUESTION}"
    );
    let user = ConversationMessage::user(
        h.submission_id,
        conversation_id,
        "deployment",
        "please refine the actor analysis",
    );
    let assistant = ConversationMessage::assistant(
        h.submission_id,
        conversation_id,
        "deployment",
        &proposal_text,
    )
    .with_classification(Classification {
        step,
        action,
        confidence: 0.85,
        explanation: String::new(),
        is_actionable: true,
    })
    .with_expects_confirmation(true);
    h.runtime
        .conversations
        .append(vec![user, assistant])
        .await
        .unwrap();
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scenarios
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn actionable_request_proposes_and_persists_confirmation_flag() {
    let h = harness(
        ScriptedCompletion::new(ACTIONABLE_REFINE_ACTORS),
        FakeEngine::default(),
    );
    let conv = Uuid::new_v4();

    let out = h
        .runtime
        .run_turn(input(&h, Some(conv), "please refine the actor analysis"))
        .await;

    assert!(out.response.ends_with(CONFIRMATION_QUESTION));
    assert!(out.response.contains("- re-run the requested analysis"));
    assert!(!out.action_taken);
    assert!(h.engine.dispatched.lock().is_empty());

    let last = h
        .runtime
        .conversations
        .last_assistant(h.submission_id, conv)
        .await
        .unwrap()
        .unwrap();
    assert!(last.expects_confirmation);
    assert_eq!(
        last.classification.as_ref().unwrap().step,
        AnalysisStep::AnalyzeActors
    );
}

#[tokio::test]
async fn confirmation_dispatches_pending_step_with_checklist_payload() {
    // The fresh-turn classification is irrelevant once the user confirms;
    // make it deliberately off-topic.
    let h = harness(
        ScriptedCompletion::new(
            r#"{"step": "unknown", "action": "unknown", "confidence": 0.1, "is_actionable": false}"#,
        ),
        FakeEngine::default(),
    );
    let conv = Uuid::new_v4();
    seed_proposal(&h, conv).await;

    let out = h.runtime.run_turn(input(&h, Some(conv), "yes, go ahead")).await;

    assert!(out.action_taken);
    let dispatched = h.engine.dispatched.lock();
    assert_eq!(dispatched.len(), 1);
    assert_eq!(dispatched[0].step, AnalysisStep::AnalyzeActors);
    assert_eq!(
        dispatched[0].user_prompt,
        "Here is what I understood from our conversation:\n- re-run the actor analysis"
    );
    // The reply is the acknowledgement followed by a grounded answer.
    assert!(out.response.contains("actor analysis"));
    assert!(out.response.contains("Here is what the analysis currently shows."));
}

#[tokio::test]
async fn confirmed_script_dispatch_rechecks_instructions() {
    // Instructions were present at proposal time but are gone by the
    // confirming turn: the dispatch is redirected one step back.
    let h = harness(
        ScriptedCompletion::new(
            r#"{"step": "unknown", "action": "unknown", "confidence": 0.1, "is_actionable": false}"#,
        ),
        FakeEngine::default(),
    );
    let conv = Uuid::new_v4();
    seed_proposal_for(
        &h,
        conv,
        AnalysisStep::ImplementDeploymentScript,
        UserAction::Run,
    )
    .await;

    let out = h.runtime.run_turn(input(&h, Some(conv), "yes, go ahead")).await;

    assert!(out.action_taken);
    let dispatched = h.engine.dispatched.lock();
    assert_eq!(dispatched.len(), 1);
    assert_eq!(dispatched[0].step, AnalysisStep::AnalyzeDeployment);
    assert!(out.response.contains("redirected"));
}

#[tokio::test]
async fn confirmed_script_dispatch_stands_when_instructions_exist() {
    let mut engine = FakeEngine::default();
    engine.summaries.insert(
        AnalysisStep::AnalyzeDeployment,
        serde_json::json!({"instructions": "deploy with forge script"}),
    );
    let h = harness(
        ScriptedCompletion::new(
            r#"{"step": "unknown", "action": "unknown", "confidence": 0.1, "is_actionable": false}"#,
        ),
        engine,
    );
    let conv = Uuid::new_v4();
    seed_proposal_for(
        &h,
        conv,
        AnalysisStep::ImplementDeploymentScript,
        UserAction::Run,
    )
    .await;

    let out = h.runtime.run_turn(input(&h, Some(conv), "yes")).await;

    assert!(out.action_taken);
    let dispatched = h.engine.dispatched.lock();
    assert_eq!(dispatched[0].step, AnalysisStep::ImplementDeploymentScript);
    assert!(!out.response.contains("redirected"));
}

#[tokio::test]
async fn rejection_never_dispatches_and_zeroes_confidence() {
    let h = harness(
        ScriptedCompletion::new(ACTIONABLE_REFINE_ACTORS),
        FakeEngine::default(),
    );
    let conv = Uuid::new_v4();
    seed_proposal(&h, conv).await;

    let out = h.runtime.run_turn(input(&h, Some(conv), "no, hold off for now")).await;

    assert!(!out.action_taken);
    assert!(h.engine.dispatched.lock().is_empty());
    assert_eq!(out.response, REJECTION_ACK);
    assert_eq!(out.classification.confidence, 0.0);
}

#[tokio::test]
async fn low_confidence_answers_instead_of_proposing() {
    let h = harness(
        ScriptedCompletion::new(
            r#"{"step": "analyze_actors", "action": "refine", "confidence": 0.5,
                "explanation": "unsure", "is_actionable": true}"#,
        ),
        FakeEngine::default(),
    );
    let conv = Uuid::new_v4();

    let out = h.runtime.run_turn(input(&h, Some(conv), "maybe redo actors?")).await;

    assert!(!out.action_taken);
    assert!(h.engine.dispatched.lock().is_empty());
    assert_eq!(out.response, "Here is what the analysis currently shows.");

    let last = h
        .runtime
        .conversations
        .last_assistant(h.submission_id, conv)
        .await
        .unwrap()
        .unwrap();
    assert!(!last.expects_confirmation);
}

#[tokio::test]
async fn dispatch_failure_degrades_to_answer_without_action() {
    let engine = FakeEngine {
        dispatch_error: Some(|| Error::Timeout("POST /api/analyze".to_string())),
        ..Default::default()
    };
    let h = harness(
        ScriptedCompletion::new(
            r#"{"step": "unknown", "action": "unknown", "confidence": 0.1, "is_actionable": false}"#,
        ),
        engine,
    );
    let conv = Uuid::new_v4();
    seed_proposal(&h, conv).await;

    let out = h.runtime.run_turn(input(&h, Some(conv), "yes please")).await;

    assert!(!out.action_taken);
    assert_eq!(out.response, "Here is what the analysis currently shows.");

    let last = h
        .runtime
        .conversations
        .last_assistant(h.submission_id, conv)
        .await
        .unwrap()
        .unwrap();
    assert!(!last.action_taken);
}

#[tokio::test]
async fn missing_instructions_redirect_script_request() {
    // No analyze_deployment summary in the engine: the pre-check rewrites
    // the script-implementation request one step back.
    let h = harness(
        ScriptedCompletion::new(
            r#"{"step": "implement_deployment_script", "action": "run", "confidence": 0.9,
                "explanation": "wants the script", "is_actionable": true}"#,
        ),
        FakeEngine::default(),
    );
    let conv = Uuid::new_v4();

    let out = h
        .runtime
        .run_turn(input(&h, Some(conv), "write the deployment script"))
        .await;

    assert_eq!(out.classification.step, AnalysisStep::AnalyzeDeployment);
    assert!(out.response.contains("redirected"));
    assert!(out.response.ends_with(CONFIRMATION_QUESTION));
    assert!(h.engine.dispatched.lock().is_empty());
}

#[tokio::test]
async fn script_request_stands_when_instructions_exist() {
    let mut engine = FakeEngine::default();
    engine.summaries.insert(
        AnalysisStep::AnalyzeDeployment,
        serde_json::json!({"instructions": "deploy with forge script"}),
    );
    let h = harness(
        ScriptedCompletion::new(
            r#"{"step": "implement_deployment_script", "action": "run", "confidence": 0.9,
                "explanation": "wants the script", "is_actionable": true}"#,
        ),
        engine,
    );
    let conv = Uuid::new_v4();

    let out = h
        .runtime
        .run_turn(input(&h, Some(conv), "write the deployment script"))
        .await;

    assert_eq!(out.classification.step, AnalysisStep::ImplementDeploymentScript);
    assert!(out.response.ends_with(CONFIRMATION_QUESTION));
}

#[tokio::test]
async fn followup_request_skips_the_gate() {
    let h = harness(
        ScriptedCompletion::new(
            r#"{"step": "analyze_actors", "action": "needs_followup", "confidence": 0.9,
                "explanation": "missing which actor", "is_actionable": true}"#,
        ),
        FakeEngine::default(),
    );
    let conv = Uuid::new_v4();

    let out = h.runtime.run_turn(input(&h, Some(conv), "change the actor")).await;

    assert!(!out.action_taken);
    assert!(!out.response.ends_with(CONFIRMATION_QUESTION));
    assert!(h.engine.dispatched.lock().is_empty());
}

#[tokio::test]
async fn unparseable_classifier_output_degrades_to_answer() {
    let h = harness(
        ScriptedCompletion::new("I think you want to refine the actors."),
        FakeEngine::default(),
    );
    let conv = Uuid::new_v4();

    let out = h.runtime.run_turn(input(&h, Some(conv), "refine the actors")).await;

    assert_eq!(out.classification.step, AnalysisStep::Unknown);
    assert_eq!(out.classification.confidence, 0.0);
    assert!(!out.action_taken);
    assert!(h.engine.dispatched.lock().is_empty());
}

#[tokio::test]
async fn pinned_conversation_id_is_respected_and_returned() {
    let h = harness(
        ScriptedCompletion::new(ACTIONABLE_REFINE_ACTORS),
        FakeEngine::default(),
    );
    let conv = Uuid::new_v4();

    let out = h.runtime.run_turn(input(&h, Some(conv), "refine the actors")).await;
    assert_eq!(out.conversation_id, conv);

    let thread = h
        .runtime
        .conversations
        .for_conversation(h.submission_id, conv)
        .await
        .unwrap();
    assert_eq!(thread.len(), 2);
}

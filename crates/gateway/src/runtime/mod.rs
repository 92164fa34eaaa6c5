//! The per-turn pipeline: continuity, classification, the confirmation
//! gate, context gathering, dispatch, composition, persistence.

pub mod checklist;
pub mod classifier;
pub mod compose;
pub mod context;
pub mod continuity;
pub mod gate;
pub mod qa;

use std::sync::Arc;

use uuid::Uuid;

use dp_completion::CompletionClient;
use dp_conversations::{ConversationMessage, ConversationStore, MessageRole};
use dp_domain::config::GatesConfig;
use dp_domain::step::{AnalysisStep, Classification, StepStatus, UserAction};
use dp_workflow::{AnalyzeRequest, StepRecordStore, WorkflowEngine};

use gate::{GateDecision, GateMatcher, CONFIRMATION_QUESTION};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turn input / outcome
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One inbound chat turn, already resolved to a concrete submission.
#[derive(Debug, Clone)]
pub struct TurnInput {
    pub submission_id: Uuid,
    /// Caller-pinned conversation thread; `None` triggers continuity
    /// detection.
    pub conversation_id: Option<Uuid>,
    /// Human-readable project name, surfaced to the classifier.
    pub project_name: Option<String>,
    /// Which report section the user is currently looking at.
    pub section: String,
    /// Caller's step hint; overrides step inference when present.
    pub analysis_step: Option<AnalysisStep>,
    pub user_message: String,
}

/// What one turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub response: String,
    pub conversation_id: Uuid,
    pub classification: Classification,
    /// True only when a mutating dispatch was actually sent.
    pub action_taken: bool,
}

/// The proposal a previous turn left awaiting confirmation.
struct PendingProposal {
    step: AnalysisStep,
    action: UserAction,
    /// The checklist text, which doubles as the dispatch payload.
    checklist: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Runtime
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Everything a turn needs, bundled so handlers and tests construct it
/// the same way.
pub struct Runtime {
    pub completion: Arc<dyn CompletionClient>,
    pub workflow: Arc<dyn WorkflowEngine>,
    pub conversations: Arc<ConversationStore>,
    pub records: Arc<StepRecordStore>,
    pub matcher: GateMatcher,
    pub gates: GatesConfig,
}

impl Runtime {
    /// Run one chat turn end to end. Infallible by construction: every
    /// internal failure degrades to a conversational reply, and
    /// persistence failures are logged without affecting the response.
    pub async fn run_turn(&self, input: TurnInput) -> TurnOutcome {
        let submission_id = input.submission_id;

        if let Err(e) = self.records.register_submission(submission_id) {
            tracing::warn!(%submission_id, error = %e, "step record registration failed");
        }

        let history = match self.conversations.for_submission(submission_id).await {
            Ok(h) => h,
            Err(e) => {
                tracing::warn!(%submission_id, error = %e, "history load failed; treating as empty");
                Vec::new()
            }
        };

        let conversation_id = self.resolve_conversation(&input, &history).await;
        let thread: Vec<ConversationMessage> = history
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();

        let pending = pending_proposal(&thread);
        let current_step = self.current_step(&input, pending.as_ref(), &thread);

        let ctx_for_classify = classifier::ClassifyContext {
            project_name: input.project_name.as_deref(),
            section: &input.section,
            current_step,
        };
        let mut classification =
            classifier::classify(self.completion.as_ref(), &input.user_message, &ctx_for_classify)
                .await;

        // Dependency pre-check: a script-implementation request without
        // upstream deployment instructions is redirected one step back.
        let mut precheck_note = None;
        if classification.step == AnalysisStep::ImplementDeploymentScript
            && classification.confidence >= self.gates.dependency_confidence
        {
            let available = self.instructions_available(submission_id).await;
            precheck_note = classifier::apply_dependency_precheck(
                &mut classification,
                available,
                self.gates.dependency_confidence,
            );
        }

        let decision = gate::decide(
            &self.matcher,
            &mut classification,
            pending.is_some(),
            &input.user_message,
            self.gates.dispatch_confidence,
        );

        tracing::info!(
            %submission_id,
            %conversation_id,
            step = %classification.step,
            action = ?classification.action,
            confidence = classification.confidence,
            decision = ?decision,
            "turn classified"
        );

        let effective_step = match (&decision, &pending) {
            (GateDecision::Execute, Some(p)) => p.step,
            _ => classification.step,
        };
        let mut ctx = context::gather(
            self.workflow.as_ref(),
            &self.records,
            submission_id,
            effective_step,
        )
        .await;
        if let Some(note) = precheck_note.clone() {
            ctx.notes.push(note);
        }

        let mut action_taken = false;
        let mut expects_confirmation = false;

        let response = match decision {
            GateDecision::Execute => {
                // pending.is_some() is guaranteed by the gate here.
                let p = pending.as_ref().unwrap();

                // Re-evaluate the dependency pre-check at execution time:
                // instructions may have vanished between proposal and
                // confirmation, and a stale script dispatch would fail
                // remotely anyway.
                let mut exec_step = p.step;
                let mut redirect_note = None;
                if exec_step == AnalysisStep::ImplementDeploymentScript
                    && !self.instructions_available(submission_id).await
                {
                    tracing::info!(%submission_id,
                        "deployment instructions missing at execution; redirecting dispatch");
                    exec_step = AnalysisStep::AnalyzeDeployment;
                    ctx.notes.push(classifier::INSTRUCTIONS_MISSING_NOTE.to_string());
                    redirect_note = Some(classifier::INSTRUCTIONS_MISSING_NOTE);
                }

                let req = AnalyzeRequest {
                    submission_id,
                    step: exec_step,
                    user_prompt: p.checklist.clone(),
                };
                match self.workflow.dispatch_analysis(&req).await {
                    Ok(()) => {
                        action_taken = true;
                        if let Err(e) = self.records.set_status(
                            submission_id,
                            exec_step,
                            StepStatus::InProgress,
                        ) {
                            tracing::warn!(%submission_id, step = %exec_step, error = %e,
                                "local status update after dispatch failed");
                        }
                        let ack = compose::acknowledgement(exec_step, p.action);
                        let answer = qa::answer(
                            self.completion.as_ref(),
                            &input.user_message,
                            &thread,
                            &ctx,
                        )
                        .await;
                        match redirect_note {
                            Some(note) => format!("{note}\n\n{ack}\n\n{answer}"),
                            None => format!("{ack}\n\n{answer}"),
                        }
                    }
                    Err(e) => {
                        tracing::warn!(%submission_id, step = %exec_step, error = %e,
                            "dispatch failed; answering conversationally instead");
                        ctx.notes.push(
                            "The analysis could not be re-run just now; answering from the \
                             latest available data instead."
                                .to_string(),
                        );
                        qa::answer(
                            self.completion.as_ref(),
                            &input.user_message,
                            &thread,
                            &ctx,
                        )
                        .await
                    }
                }
            }
            GateDecision::Reject => compose::REJECTION_ACK.to_string(),
            GateDecision::Propose => {
                let mut user_messages: Vec<String> = thread
                    .iter()
                    .filter(|m| m.role == MessageRole::User)
                    .map(|m| m.content.clone())
                    .collect();
                user_messages.push(input.user_message.clone());
                let list =
                    checklist::generate(self.completion.as_ref(), &user_messages, &ctx).await;
                expects_confirmation = true;
                match precheck_note {
                    Some(note) => format!("{note}\n\n{}", compose::proposal(&list)),
                    None => compose::proposal(&list),
                }
            }
            GateDecision::Answer => {
                qa::answer(self.completion.as_ref(), &input.user_message, &thread, &ctx).await
            }
        };

        self.persist(
            &input,
            conversation_id,
            &response,
            &classification,
            action_taken,
            expects_confirmation,
        )
        .await;

        TurnOutcome {
            response,
            conversation_id,
            classification,
            action_taken,
        }
    }

    /// Pick the conversation thread: caller pin wins, then continuity
    /// detection over the latest thread, then a fresh id.
    async fn resolve_conversation(
        &self,
        input: &TurnInput,
        history: &[ConversationMessage],
    ) -> Uuid {
        if let Some(id) = input.conversation_id {
            return id;
        }
        let latest = history.last().map(|m| m.conversation_id);
        let Some(latest) = latest else {
            return Uuid::new_v4();
        };

        let prior: Vec<ConversationMessage> = history
            .iter()
            .filter(|m| m.conversation_id == latest)
            .cloned()
            .collect();
        if prior.len() < 2 {
            return latest;
        }

        let verdict = continuity::classify_conversation(
            self.completion.as_ref(),
            &input.user_message,
            &prior,
        )
        .await;
        if verdict.starts_new_thread(self.gates.continuity_confidence) {
            tracing::debug!(confidence = verdict.confidence, "starting new conversation thread");
            Uuid::new_v4()
        } else {
            latest
        }
    }

    /// Infer which step this turn is about: caller hint, then the pending
    /// proposal, then the last classified turn, then the first step the
    /// engine has not completed.
    fn current_step(
        &self,
        input: &TurnInput,
        pending: Option<&PendingProposal>,
        thread: &[ConversationMessage],
    ) -> AnalysisStep {
        if let Some(step) = input.analysis_step {
            return step;
        }
        if let Some(p) = pending {
            return p.step;
        }
        if let Some(step) = thread
            .iter()
            .rev()
            .filter(|m| m.role == MessageRole::Assistant)
            .find_map(|m| m.classification.as_ref().map(|c| c.step))
            .filter(|s| *s != AnalysisStep::Unknown)
        {
            return step;
        }
        self.records
            .all(input.submission_id)
            .into_iter()
            .find(|r| r.status != StepStatus::Completed)
            .map(|r| r.step)
            .unwrap_or(AnalysisStep::AnalyzeProject)
    }

    /// Whether upstream deployment instructions exist. A timeout is not
    /// evidence of absence, so it counts as available.
    async fn instructions_available(&self, submission_id: Uuid) -> bool {
        if let Some(rec) = self
            .records
            .get(submission_id, AnalysisStep::AnalyzeDeployment)
        {
            if rec.status == StepStatus::Completed {
                return true;
            }
        }
        match self
            .workflow
            .step_summary(submission_id, AnalysisStep::AnalyzeDeployment)
            .await
        {
            Ok(_) => true,
            Err(e) if e.is_timeout() => true,
            Err(e) => {
                tracing::debug!(%submission_id, error = %e, "deployment instructions unavailable");
                false
            }
        }
    }

    /// Persist the turn's user and assistant messages. Failures are
    /// logged; the reply has already been composed and is returned
    /// regardless.
    async fn persist(
        &self,
        input: &TurnInput,
        conversation_id: Uuid,
        response: &str,
        classification: &Classification,
        action_taken: bool,
        expects_confirmation: bool,
    ) {
        let user = ConversationMessage::user(
            input.submission_id,
            conversation_id,
            &input.section,
            &input.user_message,
        );
        let assistant = ConversationMessage::assistant(
            input.submission_id,
            conversation_id,
            &input.section,
            response,
        )
        .with_classification(classification.clone())
        .with_action_taken(action_taken)
        .with_expects_confirmation(expects_confirmation);

        if let Err(e) = self.conversations.append(vec![user, assistant]).await {
            tracing::error!(
                submission_id = %input.submission_id,
                error = %e,
                "failed to persist conversation turn"
            );
        }
    }
}

/// Extract the proposal left pending by the most recent assistant
/// message, if any. Only the latest assistant message counts: any turn
/// after a proposal resolves it one way or another.
fn pending_proposal(thread: &[ConversationMessage]) -> Option<PendingProposal> {
    let last_assistant = thread.iter().rev().find(|m| m.role == MessageRole::Assistant)?;
    if !last_assistant.expects_confirmation {
        return None;
    }
    let classification = last_assistant.classification.as_ref()?;
    let checklist = last_assistant
        .content
        .strip_suffix(CONFIRMATION_QUESTION)
        .unwrap_or(&last_assistant.content)
        .trim_end()
        .to_string();
    Some(PendingProposal {
        step: classification.step,
        action: classification.action,
        checklist,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dp_domain::step::Classification;

    fn assistant_with(
        expects: bool,
        classification: Option<Classification>,
        content: &str,
    ) -> ConversationMessage {
        let mut m = ConversationMessage::assistant(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "deployment",
            content,
        )
        .with_expects_confirmation(expects);
        m.classification = classification;
        m
    }

    #[test]
    fn pending_proposal_strips_confirmation_question() {
        let c = Classification {
            step: AnalysisStep::AnalyzeActors,
            action: UserAction::Refine,
            confidence: 0.9,
            explanation: String::new(),
            is_actionable: true,
        };
        let content = format!("Here is what I understood:\n- x\n\n{CONFIRMATION_QUESTION}");
        let thread = vec![assistant_with(true, Some(c), &content)];
        let p = pending_proposal(&thread).unwrap();
        assert_eq!(p.step, AnalysisStep::AnalyzeActors);
        assert_eq!(p.checklist, "Here is what I understood:\n- x");
    }

    #[test]
    fn no_pending_without_flag() {
        let thread = vec![assistant_with(false, None, "just an answer")];
        assert!(pending_proposal(&thread).is_none());
    }

    #[test]
    fn only_latest_assistant_message_counts() {
        let c = Classification {
            step: AnalysisStep::AnalyzeActors,
            action: UserAction::Refine,
            confidence: 0.9,
            explanation: String::new(),
            is_actionable: true,
        };
        let thread = vec![
            assistant_with(true, Some(c), "old proposal"),
            assistant_with(false, None, "resolved since"),
        ];
        assert!(pending_proposal(&thread).is_none());
    }
}

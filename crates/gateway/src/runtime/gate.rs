//! Confirmation gate — the state machine that keeps mutating workflow
//! dispatches behind an explicit propose → confirm → execute protocol.
//!
//! States: `AwaitingRequest → PendingConfirmation → {Executing →
//! Completed} | Rejected`. The decision itself is a pure function over
//! the classification, the pending-confirmation flag stored on the
//! previous assistant message, and the new user text — no I/O, fully
//! unit-testable.

use regex::Regex;

use dp_domain::step::Classification;

/// The fixed question appended to every proposal. Stored alongside the
/// assistant message as `expects_confirmation = true`; the text itself is
/// never pattern-matched on a later turn.
pub const CONFIRMATION_QUESTION: &str =
    "Would you like me to proceed with these changes?";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Gate decision
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What the turn should do next, decided once per inbound user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Actionable request above threshold: generate a checklist and ask
    /// the user to confirm.
    Propose,
    /// The user confirmed a pending proposal: dispatch to the engine.
    Execute,
    /// The user declined a pending proposal: no dispatch, confidence
    /// forced to zero.
    Reject,
    /// Plain Q&A — nothing to propose or execute.
    Answer,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Keyword matching
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Precompiled confirmation keyword matchers (compiled once at startup).
pub struct GateMatcher {
    positive: Regex,
    negative: Regex,
}

impl Default for GateMatcher {
    fn default() -> Self {
        // Word-bounded so "no" never matches inside "now" or "know".
        let positive = Regex::new(
            r"(?i)\b(yes|yep|yeah|proceed|confirm|confirmed|agree|agreed|go ahead|do it|sounds good)\b",
        )
        .expect("positive confirmation pattern is valid");
        let negative = Regex::new(
            r"(?i)\b(no|nope|cancel|hold off|don't|do not|not now|not yet|wait|stop)\b",
        )
        .expect("negative confirmation pattern is valid");
        Self { positive, negative }
    }
}

impl GateMatcher {
    pub fn is_positive(&self, text: &str) -> bool {
        self.positive.is_match(text)
    }

    pub fn is_negative(&self, text: &str) -> bool {
        self.negative.is_match(text)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// The decision function
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Decide the gate transition for one user turn.
///
/// `pending_confirmation` is the `expects_confirmation` flag read from
/// the most recent assistant message in this conversation.
///
/// A rejection force-resets `classification.confidence` to zero so no
/// downstream path can still qualify for execution. A confirmation-state
/// message that is neither clearly positive nor clearly negative falls
/// through and is interpreted as a fresh request.
pub fn decide(
    matcher: &GateMatcher,
    classification: &mut Classification,
    pending_confirmation: bool,
    user_message: &str,
    dispatch_confidence: f32,
) -> GateDecision {
    if pending_confirmation {
        // Negative wins over positive ("yes... actually no, not now").
        if matcher.is_negative(user_message) {
            classification.confidence = 0.0;
            return GateDecision::Reject;
        }
        if matcher.is_positive(user_message) {
            return GateDecision::Execute;
        }
    }

    if classification.warrants_action(dispatch_confidence) {
        GateDecision::Propose
    } else {
        GateDecision::Answer
    }
}

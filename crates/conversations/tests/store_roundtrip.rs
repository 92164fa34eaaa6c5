//! Persist→reread round-trips for the conversation store.
//!
//! Covers the durability properties the turn pipeline leans on: role and
//! content survive a cold reload, timestamps never go backwards within a
//! conversation, and the classification metadata written at append time
//! comes back intact.

use chrono::{Duration, Utc};
use uuid::Uuid;

use dp_conversations::{ConversationMessage, ConversationStore, MessageRole};
use dp_domain::step::{AnalysisStep, Classification, UserAction};

#[tokio::test]
async fn roundtrip_preserves_role_and_content() {
    let dir = tempfile::tempdir().unwrap();
    let submission = Uuid::new_v4();
    let conversation = Uuid::new_v4();

    {
        let store = ConversationStore::new(dir.path()).unwrap();
        store
            .append(vec![
                ConversationMessage::user(submission, conversation, "actors", "refine this"),
                ConversationMessage::assistant(submission, conversation, "actors", "done"),
            ])
            .await
            .unwrap();
    }

    // Cold store: forces the disk read path.
    let store = ConversationStore::new(dir.path()).unwrap();
    let messages = store.for_submission(submission).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, MessageRole::User);
    assert_eq!(messages[0].content, "refine this");
    assert_eq!(messages[1].role, MessageRole::Assistant);
    assert_eq!(messages[1].content, "done");
}

#[tokio::test]
async fn timestamps_non_decreasing_within_conversation() {
    let dir = tempfile::tempdir().unwrap();
    let store = ConversationStore::new(dir.path()).unwrap();
    let submission = Uuid::new_v4();
    let conversation = Uuid::new_v4();

    store
        .append(vec![ConversationMessage::user(
            submission,
            conversation,
            "project",
            "first",
        )])
        .await
        .unwrap();

    // Simulate clock skew: a later append carrying an earlier wall clock.
    let mut skewed = ConversationMessage::user(submission, conversation, "project", "second");
    skewed.timestamp = Utc::now() - Duration::minutes(5);
    store.append(vec![skewed]).await.unwrap();

    let messages = store.for_conversation(submission, conversation).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert!(messages[1].timestamp >= messages[0].timestamp);
}

#[tokio::test]
async fn classification_metadata_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let submission = Uuid::new_v4();
    let conversation = Uuid::new_v4();

    let classification = Classification {
        step: AnalysisStep::AnalyzeActors,
        action: UserAction::Refine,
        confidence: 0.85,
        explanation: "user asked for actor refinement".into(),
        is_actionable: true,
    };

    {
        let store = ConversationStore::new(dir.path()).unwrap();
        let assistant =
            ConversationMessage::assistant(submission, conversation, "actors", "Shall I proceed?")
                .with_classification(classification)
                .with_expects_confirmation(true);
        store.append(vec![assistant]).await.unwrap();
    }

    let store = ConversationStore::new(dir.path()).unwrap();
    let last = store
        .last_assistant(submission, conversation)
        .await
        .unwrap()
        .expect("assistant message present");
    assert!(last.expects_confirmation);
    assert!(!last.action_taken);
    let c = last.classification.expect("classification present");
    assert_eq!(c.step, AnalysisStep::AnalyzeActors);
    assert_eq!(c.action, UserAction::Refine);
    assert!((c.confidence - 0.85).abs() < f32::EPSILON);
}

#[tokio::test]
async fn latest_conversation_id_tracks_most_recent_activity() {
    let dir = tempfile::tempdir().unwrap();
    let store = ConversationStore::new(dir.path()).unwrap();
    let submission = Uuid::new_v4();
    let conv_a = Uuid::new_v4();
    let conv_b = Uuid::new_v4();

    let mut old = ConversationMessage::user(submission, conv_a, "project", "old thread");
    old.timestamp = Utc::now() - Duration::hours(1);
    store.append(vec![old]).await.unwrap();
    store
        .append(vec![ConversationMessage::user(
            submission,
            conv_b,
            "project",
            "new thread",
        )])
        .await
        .unwrap();

    let latest = store.latest_conversation_id(submission).await.unwrap();
    assert_eq!(latest, Some(conv_b));
}

#[tokio::test]
async fn unknown_submission_is_empty_not_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = ConversationStore::new(dir.path()).unwrap();
    let messages = store.for_submission(Uuid::new_v4()).await.unwrap();
    assert!(messages.is_empty());
    assert_eq!(
        store.latest_conversation_id(Uuid::new_v4()).await.unwrap(),
        None
    );
}

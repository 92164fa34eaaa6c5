//! JSONL-backed conversation store with an in-memory write-through cache.
//!
//! Reads never hit disk after the first load for a submission. Appends
//! write to disk first and only update the cache when I/O succeeds.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use dp_domain::error::{Error, Result};

use crate::message::{ConversationMessage, MessageRole};

/// Append-only conversation store, one JSONL file per submission.
pub struct ConversationStore {
    base_dir: PathBuf,
    cache: RwLock<HashMap<Uuid, Vec<ConversationMessage>>>,
}

impl ConversationStore {
    /// Create the store under `state_path/conversations`.
    pub fn new(state_path: &Path) -> Result<Self> {
        let base_dir = state_path.join("conversations");
        std::fs::create_dir_all(&base_dir).map_err(Error::Io)?;
        Ok(Self {
            base_dir,
            cache: RwLock::new(HashMap::new()),
        })
    }

    /// Append messages to a submission's log (async, `spawn_blocking` I/O).
    ///
    /// Timestamps are clamped to be non-decreasing within each message's
    /// conversation; the adjusted messages are what lands on disk.
    pub async fn append(&self, messages: Vec<ConversationMessage>) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }
        let submission_id = messages[0].submission_id;

        // Ensure the cache is warm so clamping sees the full history.
        self.load(submission_id).await?;

        let adjusted: Vec<ConversationMessage> = {
            let cache = self.cache.read();
            let existing = cache.get(&submission_id);
            clamp_timestamps(existing.map(|v| v.as_slice()).unwrap_or(&[]), messages)
        };

        let buf = serialize_messages(&adjusted)?;
        let path = self.file_path(submission_id);
        tokio::task::spawn_blocking(move || {
            use std::io::Write;
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(Error::Io)?;
            file.write_all(buf.as_bytes()).map_err(Error::Io)?;
            Ok::<(), Error>(())
        })
        .await
        .map_err(|e| Error::Store(format!("spawn_blocking join: {e}")))??;

        let count = adjusted.len();
        {
            let mut cache = self.cache.write();
            cache.entry(submission_id).or_default().extend(adjusted);
        }
        tracing::debug!(%submission_id, count, "conversation messages appended");
        Ok(())
    }

    /// All messages for a submission, in append order.
    pub async fn for_submission(&self, submission_id: Uuid) -> Result<Vec<ConversationMessage>> {
        self.load(submission_id).await
    }

    /// All messages in one conversation, in append order.
    pub async fn for_conversation(
        &self,
        submission_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<Vec<ConversationMessage>> {
        let all = self.load(submission_id).await?;
        Ok(all
            .into_iter()
            .filter(|m| m.conversation_id == conversation_id)
            .collect())
    }

    /// The most recent assistant message in a conversation, if any.
    pub async fn last_assistant(
        &self,
        submission_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<Option<ConversationMessage>> {
        let all = self.load(submission_id).await?;
        Ok(all
            .into_iter()
            .rev()
            .find(|m| m.conversation_id == conversation_id && m.role == MessageRole::Assistant))
    }

    /// The conversation id with the most recent activity for a submission.
    pub async fn latest_conversation_id(&self, submission_id: Uuid) -> Result<Option<Uuid>> {
        let all = self.load(submission_id).await?;
        Ok(all
            .iter()
            .max_by_key(|m| m.timestamp)
            .map(|m| m.conversation_id))
    }

    // ── Private helpers ───────────────────────────────────────────────

    fn file_path(&self, submission_id: Uuid) -> PathBuf {
        self.base_dir.join(format!("{submission_id}.jsonl"))
    }

    /// Return cached messages, loading from disk on first access.
    async fn load(&self, submission_id: Uuid) -> Result<Vec<ConversationMessage>> {
        {
            let cache = self.cache.read();
            if let Some(messages) = cache.get(&submission_id) {
                return Ok(messages.clone());
            }
        }

        let path = self.file_path(submission_id);
        let messages =
            tokio::task::spawn_blocking(move || read_jsonl_file(&path))
                .await
                .map_err(|e| Error::Store(format!("spawn_blocking join: {e}")))??;

        {
            let mut cache = self.cache.write();
            cache.insert(submission_id, messages.clone());
        }
        Ok(messages)
    }
}

/// Clamp new messages' timestamps so they never go backwards within their
/// conversation. Wall-clock skew between append sites must not reorder a
/// conversation's log.
fn clamp_timestamps(
    existing: &[ConversationMessage],
    mut incoming: Vec<ConversationMessage>,
) -> Vec<ConversationMessage> {
    let mut floor: HashMap<Uuid, DateTime<Utc>> = HashMap::new();
    for m in existing {
        let entry = floor.entry(m.conversation_id).or_insert(m.timestamp);
        if m.timestamp > *entry {
            *entry = m.timestamp;
        }
    }
    for m in &mut incoming {
        match floor.get_mut(&m.conversation_id) {
            Some(last) => {
                if m.timestamp < *last {
                    m.timestamp = *last;
                } else {
                    *last = m.timestamp;
                }
            }
            None => {
                floor.insert(m.conversation_id, m.timestamp);
            }
        }
    }
    incoming
}

fn serialize_messages(messages: &[ConversationMessage]) -> Result<String> {
    let mut buf = String::new();
    for m in messages {
        let json = serde_json::to_string(m)
            .map_err(|e| Error::Store(format!("serializing conversation message: {e}")))?;
        buf.push_str(&json);
        buf.push('\n');
    }
    Ok(buf)
}

fn read_jsonl_file(path: &Path) -> Result<Vec<ConversationMessage>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path).map_err(Error::Io)?;
    let mut messages = Vec::new();
    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ConversationMessage>(line) {
            Ok(m) => messages.push(m),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping malformed conversation line");
            }
        }
    }
    Ok(messages)
}

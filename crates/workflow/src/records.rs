//! Local cache of analysis-step records.
//!
//! Persists step state in `step_records.json` under the configured state
//! path. Records are created when a submission is registered (all steps
//! `pending`, the first `in_progress`), updated by reconciliation against
//! the remote engine, and never deleted.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dp_domain::error::{Error, Result};
use dp_domain::step::{AnalysisStep, StepStatus};

use crate::engine::RemoteStepStatus;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Step record
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One analysis step's locally cached state for a submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisStepRecord {
    pub submission_id: Uuid,
    pub step: AnalysisStep,
    pub status: StepStatus,
    #[serde(default)]
    pub details: String,
    /// Structured result data. Supplementary for the three summary steps
    /// (the engine is authoritative there), primary for the rest.
    #[serde(default)]
    pub json_data: Option<serde_json::Value>,
    pub updated_at: DateTime<Utc>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Step record store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// JSON-file-backed store of step records, keyed by submission id.
pub struct StepRecordStore {
    records_path: PathBuf,
    records: RwLock<HashMap<Uuid, Vec<AnalysisStepRecord>>>,
}

impl StepRecordStore {
    /// Load or create the store at `state_path/step_records.json`.
    pub fn new(state_path: &Path) -> Result<Self> {
        std::fs::create_dir_all(state_path).map_err(Error::Io)?;
        let records_path = state_path.join("step_records.json");

        let records = if records_path.exists() {
            let raw = std::fs::read_to_string(&records_path).map_err(Error::Io)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            HashMap::new()
        };

        Ok(Self {
            records_path,
            records: RwLock::new(records),
        })
    }

    /// Register a new submission: every pipeline step `pending`, the
    /// first `in_progress`. Idempotent — an already-registered submission
    /// is left untouched.
    pub fn register_submission(&self, submission_id: Uuid) -> Result<()> {
        {
            let records = self.records.read();
            if records.contains_key(&submission_id) {
                return Ok(());
            }
        }

        let now = Utc::now();
        let entries: Vec<AnalysisStepRecord> = AnalysisStep::pipeline()
            .iter()
            .enumerate()
            .map(|(i, step)| AnalysisStepRecord {
                submission_id,
                step: *step,
                status: if i == 0 {
                    StepStatus::InProgress
                } else {
                    StepStatus::Pending
                },
                details: String::new(),
                json_data: None,
                updated_at: now,
            })
            .collect();

        self.records.write().insert(submission_id, entries);
        self.flush()?;
        tracing::info!(%submission_id, "submission registered");
        Ok(())
    }

    /// Look up one step's record.
    pub fn get(&self, submission_id: Uuid, step: AnalysisStep) -> Option<AnalysisStepRecord> {
        self.records
            .read()
            .get(&submission_id)
            .and_then(|v| v.iter().find(|r| r.step == step))
            .cloned()
    }

    /// All records for a submission, pipeline order.
    pub fn all(&self, submission_id: Uuid) -> Vec<AnalysisStepRecord> {
        self.records
            .read()
            .get(&submission_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Reconcile local records against the engine's view.
    ///
    /// A step moving backwards from `completed` to `in_progress` is an
    /// intended re-run (the user re-dispatched analysis); it is accepted
    /// and logged, not rejected.
    pub fn reconcile(&self, submission_id: Uuid, remote: &[RemoteStepStatus]) -> Result<()> {
        let mut changed = false;
        {
            let mut records = self.records.write();
            let entries = records.entry(submission_id).or_default();
            for rs in remote {
                match entries.iter_mut().find(|r| r.step == rs.step) {
                    Some(local) => {
                        let mut touched = false;
                        if local.status != rs.status {
                            if local.status == StepStatus::Completed
                                && rs.status == StepStatus::InProgress
                            {
                                tracing::info!(
                                    %submission_id,
                                    step = %rs.step,
                                    "step re-running after completion"
                                );
                            }
                            local.status = rs.status;
                            touched = true;
                        }
                        if let Some(ref details) = rs.details {
                            if &local.details != details {
                                local.details = details.clone();
                                touched = true;
                            }
                        }
                        if touched {
                            local.updated_at = Utc::now();
                            changed = true;
                        }
                    }
                    None => {
                        entries.push(AnalysisStepRecord {
                            submission_id,
                            step: rs.step,
                            status: rs.status,
                            details: rs.details.clone().unwrap_or_default(),
                            json_data: None,
                            updated_at: Utc::now(),
                        });
                        changed = true;
                    }
                }
            }
        }
        if changed {
            self.flush()?;
        }
        Ok(())
    }

    /// Force one step's local status, used right after a dispatch so the
    /// UI reflects the in-flight run before the next reconcile.
    pub fn set_status(
        &self,
        submission_id: Uuid,
        step: AnalysisStep,
        status: StepStatus,
    ) -> Result<()> {
        {
            let mut records = self.records.write();
            let entries = records.entry(submission_id).or_default();
            if let Some(local) = entries.iter_mut().find(|r| r.step == step) {
                local.status = status;
                local.updated_at = Utc::now();
            }
        }
        self.flush()
    }

    /// Attach structured result data to a step.
    pub fn set_json_data(
        &self,
        submission_id: Uuid,
        step: AnalysisStep,
        data: serde_json::Value,
    ) -> Result<()> {
        {
            let mut records = self.records.write();
            let entries = records.entry(submission_id).or_default();
            if let Some(local) = entries.iter_mut().find(|r| r.step == step) {
                local.json_data = Some(data);
                local.updated_at = Utc::now();
            }
        }
        self.flush()
    }

    /// Persist the current records to disk.
    fn flush(&self) -> Result<()> {
        let records = self.records.read();
        let json = serde_json::to_string_pretty(&*records)
            .map_err(|e| Error::Store(format!("serializing step records: {e}")))?;
        std::fs::write(&self.records_path, json).map_err(Error::Io)?;
        Ok(())
    }
}

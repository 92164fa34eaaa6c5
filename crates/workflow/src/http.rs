//! HTTP adapter for the remote workflow engine.
//!
//! Endpoint layout (all keyed by submission UUID):
//! - `GET  /api/submissions/{id}/summary/{step}` — per-step summary doc
//! - `GET  /api/submissions/{id}/status`         — status + log bundle
//! - `GET  /api/projects/{id}/submissions/latest`— project id resolution
//! - `POST /api/analyze`                         — step recomputation

use std::time::Duration;

use serde_json::Value;
use uuid::Uuid;

use dp_domain::config::WorkflowConfig;
use dp_domain::error::{Error, Result};
use dp_domain::step::AnalysisStep;

use crate::engine::{AnalyzeRequest, SubmissionStatus, WorkflowEngine};

pub struct HttpWorkflowEngine {
    base_url: String,
    client: reqwest::Client,
    /// Separate client for the mutating dispatch, which gets a larger
    /// budget than read-only calls.
    dispatch_client: reqwest::Client,
}

impl HttpWorkflowEngine {
    pub fn from_config(cfg: &WorkflowConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(from_reqwest)?;
        let dispatch_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.dispatch_timeout_ms))
            .build()
            .map_err(from_reqwest)?;
        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            client,
            dispatch_client,
        })
    }

    async fn get_json(&self, endpoint: &str) -> Result<Value> {
        let url = format!("{}{endpoint}", self.base_url);
        let resp = self.client.get(&url).send().await.map_err(from_reqwest)?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(Error::Workflow {
                endpoint: endpoint.to_owned(),
                message: format!("HTTP {status}"),
            });
        }
        resp.json().await.map_err(from_reqwest)
    }
}

#[async_trait::async_trait]
impl WorkflowEngine for HttpWorkflowEngine {
    async fn step_summary(&self, submission_id: Uuid, step: AnalysisStep) -> Result<Value> {
        self.get_json(&format!("/api/submissions/{submission_id}/summary/{step}"))
            .await
    }

    async fn submission_status(&self, submission_id: Uuid) -> Result<SubmissionStatus> {
        let v = self
            .get_json(&format!("/api/submissions/{submission_id}/status"))
            .await?;
        serde_json::from_value(v).map_err(Error::Json)
    }

    async fn dispatch_analysis(&self, req: &AnalyzeRequest) -> Result<()> {
        let url = format!("{}/api/analyze", self.base_url);
        let resp = self
            .dispatch_client
            .post(&url)
            .json(req)
            .send()
            .await
            .map_err(from_reqwest)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Workflow {
                endpoint: "/api/analyze".into(),
                message: format!("HTTP {status}: {body}"),
            });
        }
        tracing::info!(
            submission_id = %req.submission_id,
            step = %req.step,
            "analysis dispatched"
        );
        Ok(())
    }

    async fn latest_submission_for_project(&self, project_id: i64) -> Result<Uuid> {
        let v = self
            .get_json(&format!("/api/projects/{project_id}/submissions/latest"))
            .await
            .map_err(|e| match e {
                Error::Workflow { message, .. } => Error::Resolve(format!(
                    "no submission found for project {project_id} ({message})"
                )),
                other => other,
            })?;

        let raw = v
            .get("submission_id")
            .and_then(|s| s.as_str())
            .ok_or_else(|| {
                Error::Resolve(format!(
                    "project {project_id}: response missing submission_id"
                ))
            })?;
        Uuid::parse_str(raw).map_err(|e| {
            Error::Resolve(format!("project {project_id}: invalid submission id: {e}"))
        })
    }
}

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

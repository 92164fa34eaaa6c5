use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::step;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub gates: GatesConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_port")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: d_port(),
            host: d_host(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Text-completion service
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// OpenAI-compatible chat completions endpoint base URL.
    #[serde(default = "d_completion_url")]
    pub base_url: String,
    /// Environment variable holding the API key. Empty = no auth header.
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_model")]
    pub model: String,
    /// Per-request time budget. A hung completion call fails the call,
    /// never the process.
    #[serde(default = "d_completion_timeout")]
    pub timeout_ms: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: d_completion_url(),
            api_key_env: d_api_key_env(),
            model: d_model(),
            timeout_ms: d_completion_timeout(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Workflow engine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Base URL of the remote workflow engine. Injected explicitly — the
    /// gateway never sniffs its own origin at runtime.
    #[serde(default = "d_workflow_url")]
    pub base_url: String,
    /// Time budget for read-only engine calls (summaries, status).
    #[serde(default = "d_workflow_timeout")]
    pub timeout_ms: u64,
    /// Time budget for the mutating `POST /analyze` dispatch.
    #[serde(default = "d_dispatch_timeout")]
    pub dispatch_timeout_ms: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            base_url: d_workflow_url(),
            timeout_ms: d_workflow_timeout(),
            dispatch_timeout_ms: d_dispatch_timeout(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Local store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory for conversation logs and step records.
    #[serde(default = "d_state_path")]
    pub state_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            state_path: d_state_path(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Confirmation-gate thresholds
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatesConfig {
    /// Minimum classifier confidence before a mutating dispatch is proposed.
    #[serde(default = "d_dispatch_confidence")]
    pub dispatch_confidence: f32,
    /// Confidence at which the deployment-instructions dependency
    /// pre-check fires.
    #[serde(default = "d_dependency_confidence")]
    pub dependency_confidence: f32,
    /// Confidence required to mint a fresh conversation id.
    #[serde(default = "d_continuity_confidence")]
    pub continuity_confidence: f32,
}

impl Default for GatesConfig {
    fn default() -> Self {
        Self {
            dispatch_confidence: d_dispatch_confidence(),
            dependency_confidence: d_dependency_confidence(),
            continuity_confidence: d_continuity_confidence(),
        }
    }
}

// ── Default helpers ────────────────────────────────────────────────

fn d_port() -> u16 {
    4710
}
fn d_host() -> String {
    "0.0.0.0".into()
}
fn d_completion_url() -> String {
    "https://api.openai.com/v1".into()
}
fn d_api_key_env() -> String {
    "DP_COMPLETION_API_KEY".into()
}
fn d_model() -> String {
    "gpt-4o-mini".into()
}
fn d_completion_timeout() -> u64 {
    20_000
}
fn d_workflow_url() -> String {
    "http://127.0.0.1:8080".into()
}
fn d_workflow_timeout() -> u64 {
    10_000
}
fn d_dispatch_timeout() -> u64 {
    15_000
}
fn d_state_path() -> PathBuf {
    PathBuf::from("./data")
}
fn d_dispatch_confidence() -> f32 {
    step::DISPATCH_CONFIDENCE
}
fn d_dependency_confidence() -> f32 {
    step::DEPENDENCY_CONFIDENCE
}
fn d_continuity_confidence() -> f32 {
    step::CONTINUITY_CONFIDENCE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_named_thresholds() {
        let cfg = Config::default();
        assert_eq!(cfg.gates.dispatch_confidence, step::DISPATCH_CONFIDENCE);
        assert_eq!(cfg.gates.dependency_confidence, step::DEPENDENCY_CONFIDENCE);
        assert_eq!(cfg.gates.continuity_confidence, step::CONTINUITY_CONFIDENCE);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [server]
            port = 9000

            [workflow]
            base_url = "http://engine.internal:8080"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.workflow.base_url, "http://engine.internal:8080");
        assert_eq!(cfg.workflow.timeout_ms, 10_000);
        assert_eq!(cfg.completion.model, "gpt-4o-mini");
    }

    #[test]
    fn empty_toml_is_all_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.server.port, 4710);
        assert_eq!(cfg.store.state_path, PathBuf::from("./data"));
    }
}

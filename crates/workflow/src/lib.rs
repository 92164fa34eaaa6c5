//! Workflow-engine integration: the remote engine client, the local
//! analysis-step record cache, and submission identifier resolution.
//!
//! The engine itself is opaque — this crate only starts and queries it.

pub mod engine;
pub mod http;
pub mod records;
pub mod resolve;

pub use engine::{
    AnalyzeRequest, LogFragment, RemoteStepStatus, SubmissionStatus, WorkflowEngine,
};
pub use http::HttpWorkflowEngine;
pub use records::{AnalysisStepRecord, StepRecordStore};
pub use resolve::SubmissionRef;

//! Submission identifier resolution.
//!
//! Inbound requests address a submission either by its opaque UUID or by
//! an integer project id. Project ids must resolve to the project's
//! most-recently-created submission UUID before any other call is made;
//! a miss is a terminal, explanatory error for that turn.

use uuid::Uuid;

use dp_domain::error::{Error, Result};

use crate::engine::WorkflowEngine;

/// How an inbound request addressed the submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionRef {
    Submission(Uuid),
    Project(i64),
}

impl SubmissionRef {
    /// Build a reference from the two optional request fields.
    /// A UUID wins when both are supplied.
    pub fn from_request(submission_id: Option<Uuid>, project_id: Option<i64>) -> Result<Self> {
        match (submission_id, project_id) {
            (Some(id), _) => Ok(SubmissionRef::Submission(id)),
            (None, Some(pid)) => Ok(SubmissionRef::Project(pid)),
            (None, None) => Err(Error::Resolve(
                "request must carry a submission_id or a project_id".into(),
            )),
        }
    }

    /// Resolve to a concrete submission UUID, calling the engine when the
    /// reference is a project id.
    pub async fn resolve(&self, engine: &dyn WorkflowEngine) -> Result<Uuid> {
        match self {
            SubmissionRef::Submission(id) => Ok(*id),
            SubmissionRef::Project(pid) => engine.latest_submission_for_project(*pid).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_wins_over_project_id() {
        let id = Uuid::new_v4();
        let r = SubmissionRef::from_request(Some(id), Some(7)).unwrap();
        assert_eq!(r, SubmissionRef::Submission(id));
    }

    #[test]
    fn project_id_used_when_no_uuid() {
        let r = SubmissionRef::from_request(None, Some(7)).unwrap();
        assert_eq!(r, SubmissionRef::Project(7));
    }

    #[test]
    fn neither_identifier_is_an_error() {
        assert!(SubmissionRef::from_request(None, None).is_err());
    }
}

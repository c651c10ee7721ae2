//! Session error types.
//!
//! Lookup and permission failures are surfaced to whoever drives the session.
//! Scoring and the countdown never fail; their edge cases have fallback
//! values instead.

use thiserror::Error;

use crate::availability::ScheduleStatus;
use crate::model::QuestionKind;
use crate::session::SessionPhase;

/// Errors produced while driving an exam session.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    /// The lookup returned nothing, or an exam with no questions.
    #[error("exam not found: {code}")]
    ExamNotFound { code: String },

    /// The exam exists but its schedule does not allow an attempt now.
    #[error("exam {code} is not available ({status})")]
    ExamNotAvailable { code: String, status: ScheduleStatus },

    /// The definition breaks a structural invariant.
    #[error("exam {code} is invalid: {reason}")]
    InvalidExam { code: String, reason: String },

    /// The lookup collaborator itself failed.
    #[error("exam lookup failed: {0}")]
    LookupFailed(String),

    /// The camera request was rejected. Recoverable with an explicit retry.
    #[error("monitoring permission denied: {0}")]
    PermissionDenied(String),

    /// A camera request is already outstanding.
    #[error("a monitoring permission request is already in flight")]
    PermissionRequestInFlight,

    /// An answer of the wrong shape for its question.
    #[error("answer for question {question_id} must fit a {expected} question, got {actual}")]
    AnswerTypeMismatch {
        question_id: String,
        expected: QuestionKind,
        actual: &'static str,
    },

    #[error("unknown question: {0}")]
    UnknownQuestion(String),

    #[error("option {index} does not exist on question {question_id}")]
    OptionOutOfRange { question_id: String, index: usize },

    #[error("numerical answer for question {0} is not a finite number")]
    NonFiniteAnswer(String),

    /// The operation is not allowed in the current phase.
    #[error("cannot {operation} while the session is {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: SessionPhase,
    },
}

impl SessionError {
    /// Whether this error ends the session.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionError::ExamNotFound { .. }
                | SessionError::ExamNotAvailable { .. }
                | SessionError::InvalidExam { .. }
                | SessionError::LookupFailed(_)
        )
    }
}

/// A rejected camera request, as returned by the media collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct PermissionDenied {
    pub reason: String,
}

impl PermissionDenied {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

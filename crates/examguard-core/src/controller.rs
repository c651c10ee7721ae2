//! Async session controller.
//!
//! Wraps a [`Session`] and drives its collaborators: exam lookup, camera
//! permission, result persistence and certificate rendering. The controller
//! is the only place where the session's events meet I/O.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use tracing::instrument;

use crate::availability::schedule_status;
use crate::codes::normalize_code;
use crate::error::{PermissionDenied, SessionError};
use crate::integrity::FocusSource;
use crate::model::Answer;
use crate::result::{SubmitReason, Submission};
use crate::session::{Session, SessionEvent, SessionNotice};
use crate::traits::{
    CertificateRenderer, ExamLookup, MediaConstraints, MediaPermission, ResultPersister,
};

/// Configuration for the session controller.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Give up on a camera request after this long and treat it as denied.
    pub permission_timeout: Duration,
    /// Constraints sent with every camera request.
    pub constraints: MediaConstraints,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            permission_timeout: Duration::from_secs(60),
            constraints: MediaConstraints::default(),
        }
    }
}

/// The external collaborators of one session.
#[derive(Clone)]
pub struct Collaborators {
    pub lookup: Arc<dyn ExamLookup>,
    pub media: Arc<dyn MediaPermission>,
    pub persister: Arc<dyn ResultPersister>,
    pub certificates: Option<Arc<dyn CertificateRenderer>>,
}

/// Drives one [`Session`] against its collaborators.
pub struct SessionController {
    session: Session,
    collaborators: Collaborators,
    config: ControllerConfig,
    persist_error: Option<String>,
}

impl SessionController {
    pub fn new(session: Session, collaborators: Collaborators, config: ControllerConfig) -> Self {
        Self {
            session,
            collaborators,
            config,
            persist_error: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The error from the last failed result append, if any. The attempt
    /// stays complete either way.
    pub fn persist_error(&self) -> Option<&str> {
        self.persist_error.as_deref()
    }

    pub fn submission(&self) -> Option<&Submission> {
        self.session.submission()
    }

    /// Fetch the exam for `code` and start the attempt, or move to the
    /// permission gate when the exam is proctored by camera.
    ///
    /// `now` is the local wall time used to check the exam's schedule.
    #[instrument(skip(self, now))]
    pub async fn load(&mut self, code: &str, now: NaiveDateTime) -> Result<Vec<SessionNotice>, SessionError> {
        let code = normalize_code(code);
        if code.is_empty() {
            return self.fail(SessionError::ExamNotFound {
                code: code.to_string(),
            });
        }

        let exam = match self.collaborators.lookup.lookup(code).await {
            Ok(Some(exam)) => exam,
            Ok(None) => {
                return self.fail(SessionError::ExamNotFound {
                    code: code.to_string(),
                })
            }
            Err(e) => {
                tracing::error!(
                    backend = self.collaborators.lookup.name(),
                    "exam lookup failed: {e:#}"
                );
                return self.fail(SessionError::LookupFailed(format!("{e:#}")));
            }
        };

        let status = schedule_status(exam.schedule.as_ref(), now);
        if !status.accepts_attempts() {
            return self.fail(SessionError::ExamNotAvailable {
                code: exam.code,
                status,
            });
        }

        self.session.handle(SessionEvent::ExamLoaded(exam))
    }

    fn fail(&mut self, error: SessionError) -> Result<Vec<SessionNotice>, SessionError> {
        self.session.handle(SessionEvent::ExamLookupFailed(error))
    }

    /// Ask for a camera stream. A denial or a timeout leaves the session
    /// waiting for permission; call again to retry.
    #[instrument(skip(self))]
    pub async fn request_monitoring_permission(&mut self) -> Result<Vec<SessionNotice>, SessionError> {
        self.session.handle(SessionEvent::PermissionRequested)?;

        let request = self
            .collaborators
            .media
            .request_stream(&self.config.constraints);
        let outcome = match tokio::time::timeout(self.config.permission_timeout, request).await {
            Ok(outcome) => outcome,
            Err(_) => Err(PermissionDenied::new(format!(
                "permission request timed out after {}s",
                self.config.permission_timeout.as_secs()
            ))),
        };

        self.session.handle(SessionEvent::PermissionResolved(outcome))
    }

    pub fn select_answer(&mut self, question_id: &str, answer: Answer) -> Result<(), SessionError> {
        self.session
            .handle(SessionEvent::AnswerSelected {
                question_id: question_id.to_string(),
                answer,
            })
            .map(|_| ())
    }

    pub fn navigate(&mut self, index: usize) {
        // Navigation never fails.
        let _ = self.session.handle(SessionEvent::Navigated(index));
    }

    /// Report a visibility-hidden or window-blur event.
    pub async fn focus_lost(&mut self, source: FocusSource) -> Vec<SessionNotice> {
        let notices = self
            .session
            .handle(SessionEvent::FocusLost(source))
            .unwrap_or_default();
        self.deliver(&notices).await;
        notices
    }

    /// Let virtual time pass, firing every task due in the span.
    pub async fn advance(&mut self, elapsed: Duration) -> Vec<SessionNotice> {
        let notices = self
            .session
            .handle(SessionEvent::Elapsed(elapsed))
            .unwrap_or_default();
        self.deliver(&notices).await;
        notices
    }

    /// Submit the attempt. A second call after completion returns no
    /// notices and changes nothing.
    pub async fn submit(&mut self, reason: SubmitReason) -> Result<Vec<SessionNotice>, SessionError> {
        let notices = self.session.handle(SessionEvent::SubmitRequested(reason))?;
        self.deliver(&notices).await;
        Ok(notices)
    }

    /// Hand a submission to the persister and the certificate renderer.
    async fn deliver(&mut self, notices: &[SessionNotice]) {
        for notice in notices {
            let SessionNotice::Submitted(submission) = notice else {
                continue;
            };

            match self.collaborators.persister.append(&submission.result).await {
                Ok(()) => {
                    tracing::info!(
                        result_id = %submission.result.id,
                        store = self.collaborators.persister.name(),
                        "result persisted"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        result_id = %submission.result.id,
                        "failed to persist result: {e:#}"
                    );
                    self.persist_error = Some(format!("{e:#}"));
                }
            }

            if let (Some(request), Some(renderer)) =
                (&submission.certificate, &self.collaborators.certificates)
            {
                // Renderers write files; keep them off the async workers.
                let renderer = Arc::clone(renderer);
                let request = request.clone();
                match tokio::task::spawn_blocking(move || renderer.render(&request)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::error!("failed to render certificate: {e:#}"),
                    Err(e) => tracing::error!("certificate renderer panicked: {e}"),
                }
            }
        }
    }
}

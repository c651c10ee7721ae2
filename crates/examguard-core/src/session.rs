//! The exam session state machine.
//!
//! A [`Session`] owns everything that belongs to one attempt: the answer
//! sheet, the security state, the countdown, the integrity monitor, the held
//! camera stream and every scheduled task. It performs no I/O. Callers feed
//! it [`SessionEvent`]s and get back [`SessionNotice`]s describing what
//! changed; collaborators are driven by [`crate::controller`].
//!
//! Time is virtual. The session only moves forward on
//! [`SessionEvent::Elapsed`], which runs every task due in the elapsed span
//! in order: the 1-second countdown tick, the 15-second signal check, and
//! one 5-second clear per raised warning.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::countdown::{Countdown, TimeExpired};
use crate::error::{PermissionDenied, SessionError};
use crate::integrity::{
    FocusLossPolicy, FocusSource, IntegrityEvent, IntegrityMonitor, SecurityState,
    SeededSignalSource, SignalSource, WarningFlag, SIGNAL_CHECK_PERIOD, WARNING_CLEAR_DELAY,
};
use crate::model::{Answer, AnswerSheet, ExamDefinition, Question, QuestionBody, Student};
use crate::result::{certificate_eligible, ExamResult, SubmitReason, Submission};
use crate::scheduler::Scheduler;
use crate::scoring::score_attempt;
use crate::traits::MediaStream;

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Lifecycle of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    Loading,
    PermissionPending,
    InProgress,
    Completed,
    Terminated,
    /// The exam could not be loaded. Terminal; no result is produced.
    Failed,
}

impl SessionPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionPhase::Completed | SessionPhase::Terminated | SessionPhase::Failed
        )
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionPhase::Loading => write!(f, "loading"),
            SessionPhase::PermissionPending => write!(f, "waiting for permission"),
            SessionPhase::InProgress => write!(f, "in progress"),
            SessionPhase::Completed => write!(f, "completed"),
            SessionPhase::Terminated => write!(f, "terminated"),
            SessionPhase::Failed => write!(f, "failed"),
        }
    }
}

/// State of the camera permission request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionStatus {
    NotRequested,
    InFlight,
    Denied { reason: String },
    Granted,
}

/// Work items on the session's scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Tick,
    SignalCheck,
    ClearWarning { flag: WarningFlag, generation: u64 },
}

/// Inputs to [`Session::handle`].
#[derive(Debug)]
pub enum SessionEvent {
    /// The lookup resolved. Schedule checks have already been applied.
    ExamLoaded(ExamDefinition),
    /// The lookup failed or the exam may not be taken now.
    ExamLookupFailed(SessionError),
    /// A camera request was sent to the media collaborator.
    PermissionRequested,
    /// The media collaborator answered.
    PermissionResolved(Result<Box<dyn MediaStream>, PermissionDenied>),
    AnswerSelected { question_id: String, answer: Answer },
    Navigated(usize),
    FocusLost(FocusSource),
    /// Virtual time passed.
    Elapsed(Duration),
    SubmitRequested(SubmitReason),
}

/// What changed as a result of an event.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotice {
    PhaseChanged { from: SessionPhase, to: SessionPhase },
    WarningRaised(WarningFlag),
    WarningCleared(WarningFlag),
    ViolationRecorded { count: u32, max: u32 },
    TimeExpired,
    Submitted(Box<Submission>),
}

/// One attempt by one student.
pub struct Session {
    student: Student,
    started_at: DateTime<Utc>,
    phase: SessionPhase,
    permission: PermissionStatus,
    exam: Option<ExamDefinition>,
    answers: AnswerSheet,
    current_index: usize,
    countdown: Countdown,
    security: SecurityState,
    policy: FocusLossPolicy,
    signal_source: Option<Box<dyn SignalSource>>,
    monitor: Option<IntegrityMonitor>,
    scheduler: Scheduler<Task>,
    stream: Option<Box<dyn MediaStream>>,
    submission: Option<Submission>,
    failure: Option<SessionError>,
}

impl Session {
    /// A session in `Loading`. `started_at` anchors the virtual clock for
    /// completion timestamps.
    pub fn new(student: Student, started_at: DateTime<Utc>) -> Self {
        Self {
            student,
            started_at,
            phase: SessionPhase::Loading,
            permission: PermissionStatus::NotRequested,
            exam: None,
            answers: AnswerSheet::new(),
            current_index: 0,
            countdown: Countdown::new(0),
            security: SecurityState::new(),
            policy: FocusLossPolicy::default(),
            signal_source: None,
            monitor: None,
            scheduler: Scheduler::new(),
            stream: None,
            submission: None,
            failure: None,
        }
    }

    pub fn with_focus_policy(mut self, policy: FocusLossPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Random source for the simulated proctoring signal. Defaults to an
    /// entropy-seeded ChaCha source.
    pub fn with_signal_source(mut self, source: Box<dyn SignalSource>) -> Self {
        self.signal_source = Some(source);
        self
    }

    /// Apply one event.
    ///
    /// Errors leave the session unchanged unless noted on the variant: lookup
    /// failures move to `Failed`, a permission denial records the reason so
    /// the caller can offer a retry.
    pub fn handle(&mut self, event: SessionEvent) -> Result<Vec<SessionNotice>, SessionError> {
        match event {
            SessionEvent::ExamLoaded(exam) => self.on_exam_loaded(exam),
            SessionEvent::ExamLookupFailed(error) => self.on_lookup_failed(error),
            SessionEvent::PermissionRequested => self.on_permission_requested(),
            SessionEvent::PermissionResolved(outcome) => self.on_permission_resolved(outcome),
            SessionEvent::AnswerSelected {
                question_id,
                answer,
            } => self.on_answer(question_id, answer),
            SessionEvent::Navigated(index) => {
                self.on_navigate(index);
                Ok(Vec::new())
            }
            SessionEvent::FocusLost(source) => Ok(self.on_focus_lost(source)),
            SessionEvent::Elapsed(elapsed) => Ok(self.on_elapsed(elapsed)),
            SessionEvent::SubmitRequested(reason) => self.on_submit(reason),
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn permission(&self) -> &PermissionStatus {
        &self.permission
    }

    pub fn student(&self) -> &Student {
        &self.student
    }

    pub fn exam(&self) -> Option<&ExamDefinition> {
        self.exam.as_ref()
    }

    pub fn answers(&self) -> &AnswerSheet {
        &self.answers
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.exam.as_ref()?.questions.get(self.current_index)
    }

    /// Seconds left on the countdown.
    pub fn time_left(&self) -> u64 {
        self.countdown.remaining()
    }

    /// Virtual time since the session was created.
    pub fn elapsed(&self) -> Duration {
        self.scheduler.now()
    }

    pub fn security(&self) -> &SecurityState {
        &self.security
    }

    /// Whether a camera stream is currently held.
    pub fn holds_stream(&self) -> bool {
        self.stream.is_some()
    }

    /// Scheduled tasks still waiting to fire.
    pub fn pending_tasks(&self) -> usize {
        self.scheduler.pending()
    }

    /// Set once the attempt is `Completed` or `Terminated`.
    pub fn submission(&self) -> Option<&Submission> {
        self.submission.as_ref()
    }

    /// Set once the session is `Failed`.
    pub fn failure(&self) -> Option<&SessionError> {
        self.failure.as_ref()
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    fn on_exam_loaded(&mut self, exam: ExamDefinition) -> Result<Vec<SessionNotice>, SessionError> {
        self.require(SessionPhase::Loading, "load an exam")?;

        if exam.questions.is_empty() {
            return self.fail(SessionError::ExamNotFound { code: exam.code });
        }
        if let Err(e) = exam.check() {
            return self.fail(SessionError::InvalidExam {
                code: exam.code,
                reason: e.to_string(),
            });
        }

        tracing::info!(
            code = %exam.code,
            questions = exam.questions.len(),
            duration_secs = exam.duration_seconds,
            "exam loaded"
        );

        let source = self
            .signal_source
            .take()
            .unwrap_or_else(|| Box::new(SeededSignalSource::from_entropy()));
        self.monitor = Some(IntegrityMonitor::new(&exam.settings, self.policy, source));
        self.countdown = Countdown::new(exam.duration_seconds);
        let needs_permission = exam.requires_monitoring();
        self.exam = Some(exam);

        let mut notices = Vec::new();
        if needs_permission {
            self.transition(SessionPhase::PermissionPending, &mut notices);
        } else {
            self.enter_in_progress(&mut notices);
        }
        Ok(notices)
    }

    fn on_lookup_failed(&mut self, error: SessionError) -> Result<Vec<SessionNotice>, SessionError> {
        self.require(SessionPhase::Loading, "fail a lookup")?;
        self.fail(error)
    }

    fn fail(&mut self, error: SessionError) -> Result<Vec<SessionNotice>, SessionError> {
        tracing::warn!(%error, "exam could not be loaded");
        self.phase = SessionPhase::Failed;
        self.failure = Some(error.clone());
        Err(error)
    }

    // -----------------------------------------------------------------------
    // Permission
    // -----------------------------------------------------------------------

    fn on_permission_requested(&mut self) -> Result<Vec<SessionNotice>, SessionError> {
        self.require(SessionPhase::PermissionPending, "request monitoring permission")?;
        if self.permission == PermissionStatus::InFlight {
            return Err(SessionError::PermissionRequestInFlight);
        }
        self.permission = PermissionStatus::InFlight;
        Ok(Vec::new())
    }

    fn on_permission_resolved(
        &mut self,
        outcome: Result<Box<dyn MediaStream>, PermissionDenied>,
    ) -> Result<Vec<SessionNotice>, SessionError> {
        if self.phase != SessionPhase::PermissionPending
            || self.permission != PermissionStatus::InFlight
        {
            tracing::debug!(phase = %self.phase, "ignoring stale permission resolution");
            if let Ok(mut stream) = outcome {
                stream.release();
            }
            return Ok(Vec::new());
        }

        match outcome {
            Ok(stream) => {
                tracing::info!("monitoring permission granted");
                self.permission = PermissionStatus::Granted;
                self.stream = Some(stream);
                let mut notices = Vec::new();
                self.enter_in_progress(&mut notices);
                Ok(notices)
            }
            Err(denied) => {
                tracing::warn!(reason = %denied.reason, "monitoring permission denied");
                self.permission = PermissionStatus::Denied {
                    reason: denied.reason.clone(),
                };
                Err(SessionError::PermissionDenied(denied.reason))
            }
        }
    }

    fn enter_in_progress(&mut self, notices: &mut Vec<SessionNotice>) {
        self.transition(SessionPhase::InProgress, notices);
        self.countdown.start();
        self.scheduler.schedule_every(TICK_PERIOD, Task::Tick);

        let signals_started = match (&self.stream, self.monitor.as_mut()) {
            (Some(_), Some(monitor)) => monitor.start_signals(),
            _ => false,
        };
        if signals_started {
            self.scheduler
                .schedule_every(SIGNAL_CHECK_PERIOD, Task::SignalCheck);
        }
    }

    // -----------------------------------------------------------------------
    // Answers and navigation
    // -----------------------------------------------------------------------

    fn on_answer(&mut self, question_id: String, answer: Answer) -> Result<Vec<SessionNotice>, SessionError> {
        self.require(SessionPhase::InProgress, "record an answer")?;
        let Some(exam) = self.exam.as_ref() else {
            return Err(self.invalid_phase("record an answer"));
        };
        let question = exam
            .question(&question_id)
            .ok_or_else(|| SessionError::UnknownQuestion(question_id.clone()))?;

        if let Err(e) = check_answer(question, &answer) {
            tracing::error!(%e, "rejected answer");
            return Err(e);
        }

        self.answers.set(question_id, answer);
        Ok(Vec::new())
    }

    fn on_navigate(&mut self, index: usize) {
        if self.phase != SessionPhase::InProgress {
            return;
        }
        let count = self.exam.as_ref().map_or(0, |e| e.questions.len());
        if index < count {
            self.current_index = index;
        } else {
            tracing::debug!(index, count, "ignoring out-of-range navigation");
        }
    }

    // -----------------------------------------------------------------------
    // Integrity
    // -----------------------------------------------------------------------

    fn on_focus_lost(&mut self, source: FocusSource) -> Vec<SessionNotice> {
        let mut notices = Vec::new();
        if self.phase != SessionPhase::InProgress {
            return notices;
        }
        let now = self.scheduler.now();
        let observed = self
            .monitor
            .as_mut()
            .and_then(|m| m.observe_focus_loss(source, now));
        let Some(IntegrityEvent::FocusLost(_)) = observed else {
            return notices;
        };

        let count = self.security.record_violation();
        let max = self.security.max_violations();
        tracing::warn!(?source, violations = count, max, "focus lost during exam");
        notices.push(SessionNotice::ViolationRecorded { count, max });
        self.raise_warning(WarningFlag::TabSwitch, &mut notices);

        let escalation = self.monitor.as_mut().and_then(|m| m.escalate(count, max));
        if let Some(IntegrityEvent::ViolationLimitReached { violations }) = escalation {
            tracing::warn!(violations, "violation limit reached, terminating attempt");
            self.submit(SubmitReason::SecurityViolation, &mut notices);
        }
        notices
    }

    fn raise_warning(&mut self, flag: WarningFlag, notices: &mut Vec<SessionNotice>) {
        let generation = self.security.raise(flag);
        self.scheduler
            .schedule_once(WARNING_CLEAR_DELAY, Task::ClearWarning { flag, generation });
        notices.push(SessionNotice::WarningRaised(flag));
    }

    // -----------------------------------------------------------------------
    // Time
    // -----------------------------------------------------------------------

    fn on_elapsed(&mut self, elapsed: Duration) -> Vec<SessionNotice> {
        let mut notices = Vec::new();
        if self.phase.is_terminal() {
            return notices;
        }
        let until = self.scheduler.now().saturating_add(elapsed);

        while let Some((_, task)) = self.scheduler.pop_due(until) {
            match task {
                Task::Tick => {
                    if let Some(TimeExpired) = self.countdown.tick() {
                        tracing::info!("time expired");
                        notices.push(SessionNotice::TimeExpired);
                        self.submit(SubmitReason::TimeExpired, &mut notices);
                    }
                }
                Task::SignalCheck => {
                    let events = self
                        .monitor
                        .as_mut()
                        .map(IntegrityMonitor::run_signal_check)
                        .unwrap_or_default();
                    for event in events {
                        if let IntegrityEvent::WarningRaised(flag) = event {
                            tracing::info!(%flag, "proctoring warning");
                            self.raise_warning(flag, &mut notices);
                        }
                    }
                }
                Task::ClearWarning { flag, generation } => {
                    if self.security.clear(flag, generation) {
                        notices.push(SessionNotice::WarningCleared(flag));
                    }
                }
            }
            if self.phase.is_terminal() {
                return notices;
            }
        }

        self.scheduler.advance_to(until);
        notices
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    fn on_submit(&mut self, reason: SubmitReason) -> Result<Vec<SessionNotice>, SessionError> {
        match self.phase {
            SessionPhase::Completed | SessionPhase::Terminated => Ok(Vec::new()),
            SessionPhase::InProgress => {
                let mut notices = Vec::new();
                self.submit(reason, &mut notices);
                Ok(notices)
            }
            _ => Err(self.invalid_phase("submit")),
        }
    }

    /// The terminal transition. Tears down every owned resource before
    /// scoring so nothing can fire against the finished attempt.
    fn submit(&mut self, reason: SubmitReason, notices: &mut Vec<SessionNotice>) {
        if self.phase != SessionPhase::InProgress {
            return;
        }

        self.countdown.stop();
        if let Some(monitor) = self.monitor.as_mut() {
            monitor.stop();
        }
        self.scheduler.cancel_all();
        if let Some(mut stream) = self.stream.take() {
            stream.release();
        }

        let Some(exam) = self.exam.as_ref() else {
            return;
        };
        let score = score_attempt(&exam.questions, &self.answers, &exam.settings);
        let elapsed = chrono::Duration::from_std(self.scheduler.now()).unwrap_or_default();
        let completed_at = self
            .started_at
            .checked_add_signed(elapsed)
            .unwrap_or(self.started_at);
        let result = ExamResult::new(
            &self.student,
            exam,
            &score,
            self.security.violation_count(),
            completed_at,
            reason,
        );
        let certificate = certificate_eligible(score.passed, &exam.settings, reason)
            .then(|| result.certificate_request());

        tracing::info!(
            code = %exam.code,
            student = %self.student.id,
            percentage = score.percentage,
            passed = score.passed,
            %reason,
            "attempt submitted"
        );

        let submission = Submission {
            reason,
            score,
            result,
            certificate,
        };
        self.submission = Some(submission.clone());

        let to = if reason == SubmitReason::SecurityViolation {
            SessionPhase::Terminated
        } else {
            SessionPhase::Completed
        };
        self.transition(to, notices);
        notices.push(SessionNotice::Submitted(Box::new(submission)));
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn transition(&mut self, to: SessionPhase, notices: &mut Vec<SessionNotice>) {
        let from = self.phase;
        self.phase = to;
        tracing::debug!(%from, %to, "session phase changed");
        notices.push(SessionNotice::PhaseChanged { from, to });
    }

    fn require(&self, phase: SessionPhase, operation: &'static str) -> Result<(), SessionError> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(self.invalid_phase(operation))
        }
    }

    fn invalid_phase(&self, operation: &'static str) -> SessionError {
        SessionError::InvalidPhase {
            operation,
            phase: self.phase,
        }
    }
}

/// Validate an answer against its question without touching any state.
fn check_answer(question: &Question, answer: &Answer) -> Result<(), SessionError> {
    if !question.accepts(answer) {
        return Err(SessionError::AnswerTypeMismatch {
            question_id: question.id.clone(),
            expected: question.kind(),
            actual: answer.kind_name(),
        });
    }
    match (&question.body, answer) {
        (QuestionBody::Mcq { options, .. }, Answer::SelectedOption(index)) if *index >= options.len() => {
            Err(SessionError::OptionOutOfRange {
                question_id: question.id.clone(),
                index: *index,
            })
        }
        (QuestionBody::Numerical { .. }, Answer::Number(value)) if !value.is_finite() => {
            Err(SessionError::NonFiniteAnswer(question.id.clone()))
        }
        _ => Ok(()),
    }
}

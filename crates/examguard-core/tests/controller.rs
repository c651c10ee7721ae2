//! Controller behavior against in-process collaborators.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use examguard_core::availability::{ExamSchedule, ScheduleStatus};
use examguard_core::controller::{Collaborators, ControllerConfig, SessionController};
use examguard_core::error::{PermissionDenied, SessionError};
use examguard_core::integrity::{FocusSource, ScriptedSignalSource};
use examguard_core::model::{
    Answer, ExamDefinition, McqOption, Question, QuestionBody, Settings, Student,
};
use examguard_core::result::{CertificateRequest, ExamResult, SubmitReason};
use examguard_core::session::{Session, SessionPhase};
use examguard_core::traits::{
    CertificateRenderer, ExamLookup, MediaConstraints, MediaPermission, MediaStream,
    ResultPersister,
};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

struct FakeLookup {
    exams: HashMap<String, ExamDefinition>,
    fail: bool,
}

#[async_trait]
impl ExamLookup for FakeLookup {
    fn name(&self) -> &str {
        "fake"
    }

    async fn lookup(&self, code: &str) -> anyhow::Result<Option<ExamDefinition>> {
        if self.fail {
            anyhow::bail!("backend offline");
        }
        Ok(self.exams.get(code).cloned())
    }
}

#[derive(Debug)]
struct FakeStream(Arc<AtomicU32>);

impl MediaStream for FakeStream {
    fn release(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Grants or denies in script order; `None` never answers.
struct FakeMedia {
    script: Mutex<VecDeque<Option<Result<(), String>>>>,
    releases: Arc<AtomicU32>,
    seen: Mutex<Vec<MediaConstraints>>,
}

#[async_trait]
impl MediaPermission for FakeMedia {
    async fn request_stream(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<Box<dyn MediaStream>, PermissionDenied> {
        self.seen.lock().unwrap().push(constraints.clone());
        let next = self.script.lock().unwrap().pop_front().flatten();
        match next {
            Some(Ok(())) => Ok(Box::new(FakeStream(Arc::clone(&self.releases)))),
            Some(Err(reason)) => Err(PermissionDenied::new(reason)),
            None => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(PermissionDenied::new("never answered"))
            }
        }
    }
}

#[derive(Default)]
struct RecordingPersister {
    results: Mutex<Vec<ExamResult>>,
    fail: bool,
}

#[async_trait]
impl ResultPersister for RecordingPersister {
    fn name(&self) -> &str {
        "recording"
    }

    async fn append(&self, result: &ExamResult) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("disk full");
        }
        self.results.lock().unwrap().push(result.clone());
        Ok(())
    }
}

#[derive(Default)]
struct RecordingRenderer {
    requests: Mutex<Vec<CertificateRequest>>,
    threads: Mutex<Vec<std::thread::ThreadId>>,
}

impl CertificateRenderer for RecordingRenderer {
    fn render(&self, request: &CertificateRequest) -> anyhow::Result<()> {
        self.requests.lock().unwrap().push(request.clone());
        self.threads.lock().unwrap().push(std::thread::current().id());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn exam(code: &str, settings: Settings) -> ExamDefinition {
    ExamDefinition {
        id: format!("id-{code}"),
        code: code.into(),
        title: "Networking".into(),
        description: String::new(),
        duration_seconds: 120,
        settings,
        schedule: None,
        questions: vec![
            Question {
                id: "q1".into(),
                text: "Port for HTTPS".into(),
                body: QuestionBody::Numerical {
                    expected_value: 443.0,
                    tolerance: 0.0,
                },
            },
            Question {
                id: "q2".into(),
                text: "Transport for DNS queries".into(),
                body: QuestionBody::Mcq {
                    options: vec![
                        McqOption {
                            id: "tcp".into(),
                            text: "TCP".into(),
                        },
                        McqOption {
                            id: "udp".into(),
                            text: "UDP".into(),
                        },
                    ],
                    correct_option_id: "udp".into(),
                },
            },
        ],
    }
}

struct Harness {
    controller: SessionController,
    persister: Arc<RecordingPersister>,
    renderer: Arc<RecordingRenderer>,
    media: Arc<FakeMedia>,
}

fn harness(
    exams: Vec<ExamDefinition>,
    media_script: Vec<Option<Result<(), String>>>,
    persister: RecordingPersister,
) -> Harness {
    let lookup = FakeLookup {
        exams: exams.into_iter().map(|e| (e.code.clone(), e)).collect(),
        fail: false,
    };
    harness_with_lookup(lookup, media_script, persister)
}

fn harness_with_lookup(
    lookup: FakeLookup,
    media_script: Vec<Option<Result<(), String>>>,
    persister: RecordingPersister,
) -> Harness {
    let persister = Arc::new(persister);
    let renderer = Arc::new(RecordingRenderer::default());
    let media = Arc::new(FakeMedia {
        script: Mutex::new(media_script.into()),
        releases: Arc::new(AtomicU32::new(0)),
        seen: Mutex::new(Vec::new()),
    });
    let session = Session::new(Student::new("s-9", "Linus"), DateTime::<Utc>::UNIX_EPOCH)
        .with_signal_source(Box::new(ScriptedSignalSource::quiet()));
    let controller = SessionController::new(
        session,
        Collaborators {
            lookup: Arc::new(lookup),
            media: media.clone(),
            persister: persister.clone(),
            certificates: Some(renderer.clone()),
        },
        ControllerConfig {
            permission_timeout: Duration::from_secs(5),
            ..ControllerConfig::default()
        },
    );
    Harness {
        controller,
        persister,
        renderer,
        media,
    }
}

fn noon() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, 19)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

fn certificate_settings() -> Settings {
    Settings {
        generate_certificate: true,
        ..Settings::default()
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[tokio::test]
async fn load_trims_code_and_starts() {
    let mut h = harness(vec![exam("EX-1", Settings::default())], vec![], Default::default());
    h.controller.load("  EX-1 \n", noon()).await.unwrap();
    assert_eq!(h.controller.session().phase(), SessionPhase::InProgress);
    assert_eq!(h.controller.session().time_left(), 120);
}

#[tokio::test]
async fn unknown_code_is_not_found() {
    let mut h = harness(vec![], vec![], Default::default());
    let err = h.controller.load("EX-404", noon()).await.unwrap_err();
    assert_eq!(
        err,
        SessionError::ExamNotFound {
            code: "EX-404".into()
        }
    );
    assert_eq!(h.controller.session().phase(), SessionPhase::Failed);
}

#[tokio::test]
async fn backend_failure_is_surfaced() {
    let lookup = FakeLookup {
        exams: HashMap::new(),
        fail: true,
    };
    let mut h = harness_with_lookup(lookup, vec![], Default::default());
    let err = h.controller.load("EX-1", noon()).await.unwrap_err();
    assert!(matches!(err, SessionError::LookupFailed(ref m) if m.contains("backend offline")));
    assert!(err.is_terminal());
}

#[tokio::test]
async fn exam_outside_window_is_rejected() {
    let mut scheduled = exam("EX-LATER", Settings::default());
    scheduled.schedule = Some(ExamSchedule {
        date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
        start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        duration_minutes: 60,
    });
    let mut h = harness(vec![scheduled], vec![], Default::default());
    let err = h.controller.load("EX-LATER", noon()).await.unwrap_err();
    assert_eq!(
        err,
        SessionError::ExamNotAvailable {
            code: "EX-LATER".into(),
            status: ScheduleStatus::Scheduled
        }
    );
    assert_eq!(h.controller.session().phase(), SessionPhase::Failed);
}

// ---------------------------------------------------------------------------
// Permission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn denial_then_retry_grants() {
    let settings = Settings {
        eye_tracking: true,
        ..Settings::default()
    };
    let mut h = harness(
        vec![exam("EX-CAM", settings)],
        vec![Some(Err("user dismissed".into())), Some(Ok(()))],
        Default::default(),
    );
    h.controller.load("EX-CAM", noon()).await.unwrap();
    assert_eq!(h.controller.session().phase(), SessionPhase::PermissionPending);

    let err = h.controller.request_monitoring_permission().await.unwrap_err();
    assert_eq!(err, SessionError::PermissionDenied("user dismissed".into()));
    assert_eq!(h.controller.session().phase(), SessionPhase::PermissionPending);

    h.controller.request_monitoring_permission().await.unwrap();
    assert_eq!(h.controller.session().phase(), SessionPhase::InProgress);

    let seen = h.media.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 2);
    assert_eq!((seen[0].width, seen[0].height), (320, 240));
    assert_eq!(seen[0].facing_mode, "user");

    h.controller.submit(SubmitReason::Manual).await.unwrap();
    assert_eq!(h.media.releases.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn unanswered_request_times_out_as_denial() {
    let settings = Settings {
        face_detection: true,
        ..Settings::default()
    };
    let mut h = harness(vec![exam("EX-CAM", settings)], vec![None], Default::default());
    h.controller.load("EX-CAM", noon()).await.unwrap();

    let err = h.controller.request_monitoring_permission().await.unwrap_err();
    assert!(matches!(err, SessionError::PermissionDenied(ref m) if m.contains("timed out")));
    assert_eq!(h.controller.session().phase(), SessionPhase::PermissionPending);
}

#[tokio::test]
async fn permission_not_needed_without_camera_features() {
    let mut h = harness(vec![exam("EX-1", Settings::default())], vec![], Default::default());
    h.controller.load("EX-1", noon()).await.unwrap();
    let err = h.controller.request_monitoring_permission().await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidPhase { .. }));
    assert!(h.media.seen.lock().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_persists_once_and_renders_certificate() {
    let mut h = harness(vec![exam("EX-1", certificate_settings())], vec![], Default::default());
    h.controller.load("EX-1", noon()).await.unwrap();
    h.controller.select_answer("q1", Answer::Number(443.0)).unwrap();
    h.controller.select_answer("q2", Answer::SelectedOption(1)).unwrap();
    h.controller.advance(Duration::from_secs(30)).await;

    h.controller.submit(SubmitReason::Manual).await.unwrap();
    let again = h.controller.submit(SubmitReason::Manual).await.unwrap();
    assert!(again.is_empty());

    let results = h.persister.results.lock().unwrap().clone();
    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert_eq!(result.percentage, 100);
    assert_eq!(result.correct_count, 2);
    assert_eq!(result.gradable_total, 2);
    assert_eq!(result.student_name, "Linus");
    assert_eq!(result.exam_code, "EX-1");
    assert!(result.passed);
    assert_eq!(
        result.completed_at,
        DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::seconds(30)
    );

    let certificates = h.renderer.requests.lock().unwrap().clone();
    assert_eq!(certificates.len(), 1);
    assert_eq!(certificates[0].percentage, 100);
    assert_eq!(certificates[0].exam_title, "Networking");
}

#[tokio::test]
async fn certificate_renders_on_a_blocking_thread() {
    let mut h = harness(vec![exam("EX-1", certificate_settings())], vec![], Default::default());
    h.controller.load("EX-1", noon()).await.unwrap();
    h.controller.select_answer("q1", Answer::Number(443.0)).unwrap();
    h.controller.select_answer("q2", Answer::SelectedOption(1)).unwrap();
    h.controller.submit(SubmitReason::Manual).await.unwrap();

    let threads = h.renderer.threads.lock().unwrap().clone();
    assert_eq!(threads.len(), 1);
    assert_ne!(threads[0], std::thread::current().id());
}

#[tokio::test]
async fn failing_store_does_not_undo_completion() {
    let persister = RecordingPersister {
        fail: true,
        ..Default::default()
    };
    let mut h = harness(vec![exam("EX-1", Settings::default())], vec![], persister);
    h.controller.load("EX-1", noon()).await.unwrap();
    h.controller.submit(SubmitReason::Manual).await.unwrap();

    assert_eq!(h.controller.session().phase(), SessionPhase::Completed);
    assert!(h.controller.submission().is_some());
    assert!(h.controller.persist_error().unwrap().contains("disk full"));
}

#[tokio::test]
async fn expiry_through_advance_persists_result() {
    let mut h = harness(vec![exam("EX-1", certificate_settings())], vec![], Default::default());
    h.controller.load("EX-1", noon()).await.unwrap();
    h.controller.select_answer("q2", Answer::SelectedOption(0)).unwrap();
    h.controller.advance(Duration::from_secs(600)).await;

    assert_eq!(h.controller.session().phase(), SessionPhase::Completed);
    let results = h.persister.results.lock().unwrap().clone();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].reason, SubmitReason::TimeExpired);
    assert_eq!(results[0].percentage, 0);
    assert!(h.renderer.requests.lock().unwrap().is_empty(), "failed attempt");
}

#[tokio::test]
async fn terminated_attempt_is_persisted_without_certificate() {
    let settings = Settings {
        prevent_tab_switching: true,
        generate_certificate: true,
        ..Settings::default()
    };
    let mut h = harness(vec![exam("EX-1", settings)], vec![], Default::default());
    h.controller.load("EX-1", noon()).await.unwrap();
    h.controller.select_answer("q1", Answer::Number(443.0)).unwrap();
    h.controller.select_answer("q2", Answer::SelectedOption(1)).unwrap();

    for _ in 0..3 {
        h.controller.focus_lost(FocusSource::WindowBlur).await;
    }

    assert_eq!(h.controller.session().phase(), SessionPhase::Terminated);
    let results = h.persister.results.lock().unwrap().clone();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].tab_switch_count, 3);
    assert_eq!(results[0].reason, SubmitReason::SecurityViolation);
    assert!(results[0].passed);
    assert!(h.renderer.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn navigation_is_clamped_silently() {
    let mut h = harness(vec![exam("EX-1", Settings::default())], vec![], Default::default());
    h.controller.load("EX-1", noon()).await.unwrap();
    h.controller.navigate(1);
    h.controller.navigate(99);
    assert_eq!(h.controller.session().current_index(), 1);
}

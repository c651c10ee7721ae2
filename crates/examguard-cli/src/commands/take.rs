//! The `examguard take` command.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use tokio::sync::mpsc;

use examguard_core::controller::{Collaborators, ControllerConfig, SessionController};
use examguard_core::countdown::format_time_left;
use examguard_core::integrity::FocusSource;
use examguard_core::model::{Answer, ExamDefinition, QuestionBody, Student};
use examguard_core::session::{Session, SessionNotice, SessionPhase};
use examguard_providers::{create_lookup, create_persister, load_config_from, ScriptedMedia};
use examguard_report::{render_score_summary, HtmlCertificateRenderer};
use examguard_runner::{replay_script, resolve_option, AttemptInput, AttemptScript, LiveDriver};

pub struct TakeArgs {
    pub code: String,
    pub student_id: String,
    pub student_name: String,
    pub script: Option<PathBuf>,
    pub grant_camera: bool,
    pub certificates: PathBuf,
    pub config: Option<PathBuf>,
}

pub async fn execute(args: TakeArgs) -> Result<()> {
    let config = load_config_from(args.config.as_deref())?;
    let script = args
        .script
        .as_deref()
        .map(AttemptScript::from_file)
        .transpose()?;

    let media = if args.grant_camera {
        ScriptedMedia::always_grant()
    } else {
        ScriptedMedia::always_deny("camera access was not granted (pass --grant-camera)")
    };
    let renderer = HtmlCertificateRenderer::new(&args.certificates);
    let collaborators = Collaborators {
        lookup: create_lookup(&config)?,
        media: Arc::new(media),
        persister: create_persister(&config)?,
        certificates: Some(Arc::new(renderer.clone())),
    };

    let session = Session::new(
        Student::new(args.student_id, args.student_name),
        Utc::now(),
    )
    .with_focus_policy(config.focus_policy())
    .with_signal_source(config.signal_source());
    let mut controller = SessionController::new(session, collaborators, ControllerConfig::default());

    controller
        .load(&args.code, Local::now().naive_local())
        .await
        .with_context(|| format!("cannot start exam {}", args.code.trim()))?;

    if controller.session().phase() == SessionPhase::PermissionPending {
        println!("This exam is proctored by camera. Requesting access...");
        controller
            .request_monitoring_permission()
            .await
            .context("camera access is required for this exam")?;
    }

    let exam = controller
        .session()
        .exam()
        .cloned()
        .context("exam was not loaded")?;
    print_header(&exam);

    let controller = match script {
        Some(script) => {
            let report = replay_script(&mut controller, &script).await?;
            for notice in &report.notices {
                print_notice(notice);
            }
            for rejected in &report.rejected {
                eprintln!("Step rejected: {rejected}");
            }
            if report.skipped > 0 {
                eprintln!("{} step(s) not run, the attempt had already ended.", report.skipped);
            }
            controller
        }
        None => run_interactive(controller, exam.clone()).await?,
    };

    let submission = controller
        .submission()
        .context("the attempt did not finish")?;

    println!();
    if exam.settings.display_results {
        println!("{}", render_score_summary(&submission.score, submission.reason));
    } else {
        println!("Exam {}. Your responses have been recorded.", submission.reason);
    }
    println!("Result id: {}", submission.result.id);

    if let Some(err) = controller.persist_error() {
        eprintln!("Warning: the result could not be saved: {err}");
    }
    if let Some(request) = &submission.certificate {
        println!("Certificate: {}", renderer.certificate_path(request).display());
    }

    Ok(())
}

async fn run_interactive(controller: SessionController, exam: ExamDefinition) -> Result<SessionController> {
    print_questions(&exam);
    println!("Commands: answer <question> <value>, clear <question>, goto <n>, hide, blur, submit");

    let (tx, rx) = mpsc::channel(16);
    let (notice_tx, mut notice_rx) = mpsc::unbounded_channel();

    // Blocking stdin lives on its own thread so the process can exit while
    // it waits for a line.
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            match parse_command(&line, &exam) {
                Ok(Some(input)) => {
                    if tx.blocking_send(input).is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => eprintln!("{e}"),
            }
        }
    });
    let printer = tokio::spawn(async move {
        while let Some(notice) = notice_rx.recv().await {
            print_notice(&notice);
        }
    });

    let controller = LiveDriver::new(controller)
        .with_notices(notice_tx)
        .run(rx)
        .await?;
    let _ = printer.await;
    Ok(controller)
}

/// Turn one line of student input into an attempt input. `Ok(None)` for a
/// blank line.
fn parse_command(line: &str, exam: &ExamDefinition) -> Result<Option<AttemptInput>, String> {
    let line = line.trim();
    let (command, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();

    let input = match command {
        "" => return Ok(None),
        "submit" => AttemptInput::Submit,
        "hide" => AttemptInput::FocusLost(FocusSource::VisibilityHidden),
        "blur" => AttemptInput::FocusLost(FocusSource::WindowBlur),
        "goto" => {
            let n: usize = rest
                .parse()
                .map_err(|_| format!("not a question number: '{rest}'"))?;
            AttemptInput::Navigate(n.saturating_sub(1))
        }
        "clear" => AttemptInput::Answer {
            question_id: rest.to_string(),
            answer: Answer::Unanswered,
        },
        "answer" => {
            let (question_id, value) = rest
                .split_once(char::is_whitespace)
                .ok_or("usage: answer <question> <value>")?;
            let value = value.trim();
            let question = exam
                .question(question_id)
                .ok_or_else(|| format!("no question '{question_id}'"))?;
            let answer = match &question.body {
                QuestionBody::Mcq { .. } => resolve_option(exam, question_id, value)
                    .map(Answer::SelectedOption)
                    .ok_or_else(|| format!("question {question_id} has no option '{value}'"))?,
                QuestionBody::Numerical { .. } => value
                    .parse::<f64>()
                    .map(Answer::Number)
                    .map_err(|_| format!("not a number: '{value}'"))?,
                QuestionBody::ShortAnswer { .. } | QuestionBody::LongAnswer { .. } => {
                    Answer::Text(value.to_string())
                }
            };
            AttemptInput::Answer {
                question_id: question_id.to_string(),
                answer,
            }
        }
        other => return Err(format!("unknown command '{other}'")),
    };
    Ok(Some(input))
}

fn print_header(exam: &ExamDefinition) {
    println!("{} [{}]", exam.title, exam.code);
    if !exam.description.is_empty() {
        println!("{}", exam.description);
    }
    println!(
        "{} questions, time limit {}",
        exam.questions.len(),
        format_time_left(exam.duration_seconds)
    );
    if exam.settings.prevent_tab_switching {
        println!("Leaving the exam window is recorded as a violation.");
    }
    println!();
}

fn print_questions(exam: &ExamDefinition) {
    for (i, question) in exam.questions.iter().enumerate() {
        println!("{}. [{}] {} ({})", i + 1, question.id, question.text, question.kind());
        if let QuestionBody::Mcq { options, .. } = &question.body {
            for option in options {
                println!("     {}) {}", option.id, option.text);
            }
        }
    }
    println!();
}

fn print_notice(notice: &SessionNotice) {
    match notice {
        SessionNotice::WarningRaised(flag) => eprintln!("! {flag} warning"),
        SessionNotice::ViolationRecorded { count, max } => {
            eprintln!("! Tab switch detected ({count}/{max})")
        }
        SessionNotice::TimeExpired => println!("Time is up."),
        SessionNotice::PhaseChanged { from, to } => {
            tracing::debug!(%from, %to, "phase changed")
        }
        SessionNotice::WarningCleared(_) | SessionNotice::Submitted(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use examguard_core::catalog::sample_exam;

    #[test]
    fn parses_commands() {
        let exam = sample_exam();
        assert_eq!(parse_command("   ", &exam), Ok(None));
        assert_eq!(parse_command("submit", &exam), Ok(Some(AttemptInput::Submit)));
        assert_eq!(
            parse_command("goto 3", &exam),
            Ok(Some(AttemptInput::Navigate(2)))
        );
        assert_eq!(
            parse_command("answer 2 c", &exam),
            Ok(Some(AttemptInput::Answer {
                question_id: "2".into(),
                answer: Answer::SelectedOption(2)
            }))
        );
        assert_eq!(
            parse_command("answer 5 two storage  kinds", &exam),
            Ok(Some(AttemptInput::Answer {
                question_id: "5".into(),
                answer: Answer::Text("two storage  kinds".into())
            }))
        );
    }

    #[test]
    fn rejects_bad_commands() {
        let exam = sample_exam();
        assert!(parse_command("answer 1 z", &exam).is_err());
        assert!(parse_command("answer 99 a", &exam).is_err());
        assert!(parse_command("answer 1", &exam).is_err());
        assert!(parse_command("goto x", &exam).is_err());
        assert!(parse_command("dance", &exam).is_err());
    }
}

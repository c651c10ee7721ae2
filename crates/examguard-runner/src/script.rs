//! Deterministic attempt scripts.
//!
//! A script is a TOML list of timed steps replayed against a controller on
//! the session's virtual clock:
//!
//! ```toml
//! end = "submit"
//!
//! [[steps]]
//! at_secs = 10
//! action = "select_option"
//! question = "q1"
//! option = "a"
//!
//! [[steps]]
//! at_secs = 40
//! action = "hide"
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use examguard_core::controller::SessionController;
use examguard_core::integrity::FocusSource;
use examguard_core::model::{Answer, ExamDefinition, QuestionBody};
use examguard_core::result::SubmitReason;
use examguard_core::session::{SessionNotice, SessionPhase};

/// One thing the student does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScriptAction {
    /// Pick an MCQ option by its id.
    SelectOption { question: String, option: String },
    WriteText { question: String, text: String },
    EnterNumber { question: String, value: f64 },
    ClearAnswer { question: String },
    Navigate { index: usize },
    /// The page became hidden.
    Hide,
    /// The window lost focus.
    Blur,
    Submit,
}

/// An action at an offset from the start of the attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptStep {
    pub at_secs: u64,
    #[serde(flatten)]
    pub action: ScriptAction,
}

/// What happens when the steps run out and the attempt is still open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptEnd {
    #[default]
    Submit,
    /// Let the countdown run out.
    WaitForExpiry,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AttemptScript {
    #[serde(default)]
    pub end: ScriptEnd,
    #[serde(default)]
    pub steps: Vec<ScriptStep>,
}

impl AttemptScript {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("failed to parse attempt script")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read script: {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("in script {}", path.display()))
    }
}

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("cannot replay a script while the session is {0}")]
    NotInProgress(SessionPhase),
}

/// What happened during a replay.
#[derive(Debug, Default)]
pub struct ReplayReport {
    pub notices: Vec<SessionNotice>,
    /// Steps the session refused, with the reason.
    pub rejected: Vec<String>,
    /// Steps never reached because the attempt had already ended.
    pub skipped: usize,
}

/// Index of the MCQ option with id `option_id`.
pub fn resolve_option(exam: &ExamDefinition, question_id: &str, option_id: &str) -> Option<usize> {
    match &exam.question(question_id)?.body {
        QuestionBody::Mcq { options, .. } => options.iter().position(|o| o.id == option_id),
        _ => None,
    }
}

/// Replay `script` against a controller whose session is in progress.
///
/// Steps run in `at_secs` order; ties keep their written order.
pub async fn replay_script(
    controller: &mut SessionController,
    script: &AttemptScript,
) -> Result<ReplayReport, ReplayError> {
    let phase = controller.session().phase();
    if phase != SessionPhase::InProgress {
        return Err(ReplayError::NotInProgress(phase));
    }

    let mut steps: Vec<&ScriptStep> = script.steps.iter().collect();
    steps.sort_by_key(|s| s.at_secs);

    let mut report = ReplayReport::default();
    let mut cursor = 0u64;

    for (index, step) in steps.iter().enumerate() {
        if step.at_secs > cursor {
            let notices = controller
                .advance(Duration::from_secs(step.at_secs - cursor))
                .await;
            report.notices.extend(notices);
            cursor = step.at_secs;
        }
        if controller.session().phase().is_terminal() {
            report.skipped = steps.len() - index;
            tracing::debug!(skipped = report.skipped, "attempt ended before the script did");
            return Ok(report);
        }
        apply(controller, &step.action, &mut report).await;
    }

    if !controller.session().phase().is_terminal() {
        match script.end {
            ScriptEnd::Submit => apply(controller, &ScriptAction::Submit, &mut report).await,
            ScriptEnd::WaitForExpiry => {
                let left = controller.session().time_left();
                let notices = controller.advance(Duration::from_secs(left)).await;
                report.notices.extend(notices);
            }
        }
    }
    Ok(report)
}

async fn apply(controller: &mut SessionController, action: &ScriptAction, report: &mut ReplayReport) {
    let answer = match action {
        ScriptAction::SelectOption { question, option } => {
            let index = controller
                .session()
                .exam()
                .and_then(|exam| resolve_option(exam, question, option));
            match index {
                Some(index) => Some((question, Answer::SelectedOption(index))),
                None => {
                    report
                        .rejected
                        .push(format!("question {question} has no option '{option}'"));
                    None
                }
            }
        }
        ScriptAction::WriteText { question, text } => Some((question, Answer::Text(text.clone()))),
        ScriptAction::EnterNumber { question, value } => Some((question, Answer::Number(*value))),
        ScriptAction::ClearAnswer { question } => Some((question, Answer::Unanswered)),
        ScriptAction::Navigate { index } => {
            controller.navigate(*index);
            None
        }
        ScriptAction::Hide => {
            let notices = controller.focus_lost(FocusSource::VisibilityHidden).await;
            report.notices.extend(notices);
            None
        }
        ScriptAction::Blur => {
            let notices = controller.focus_lost(FocusSource::WindowBlur).await;
            report.notices.extend(notices);
            None
        }
        ScriptAction::Submit => {
            match controller.submit(SubmitReason::Manual).await {
                Ok(notices) => report.notices.extend(notices),
                Err(e) => report.rejected.push(e.to_string()),
            }
            None
        }
    };

    if let Some((question, answer)) = answer {
        if let Err(e) = controller.select_answer(question, answer) {
            report.rejected.push(e.to_string());
        }
    }
}

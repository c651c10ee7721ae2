//! Core data model types for examguard.
//!
//! These are the fundamental types the whole system uses to represent exam
//! content, exam settings and the answers captured during an attempt.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::availability::ExamSchedule;

/// A complete exam as authored. Immutable once an attempt starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamDefinition {
    /// Unique identifier for this exam.
    pub id: String,
    /// Join code students type to enter the exam.
    pub code: String,
    /// Human-readable title.
    pub title: String,
    /// Free-form description shown before the attempt.
    #[serde(default)]
    pub description: String,
    /// Length of the attempt in seconds.
    pub duration_seconds: u64,
    /// Scoring and proctoring options.
    #[serde(default)]
    pub settings: Settings,
    /// Optional window during which the exam may be taken.
    #[serde(default)]
    pub schedule: Option<ExamSchedule>,
    /// Questions in presentation order.
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl ExamDefinition {
    /// Find a question by its id.
    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Number of questions eligible for automatic scoring.
    pub fn gradable_count(&self) -> usize {
        self.questions.iter().filter(|q| q.kind().is_gradable()).count()
    }

    /// Whether the attempt needs a camera stream before it can start.
    pub fn requires_monitoring(&self) -> bool {
        self.settings.requires_media()
    }

    /// Check the structural invariants of the definition.
    ///
    /// Question ids must be unique, every MCQ needs at least one option and
    /// must reference a correct option that exists, and numerical tolerances
    /// must not be negative.
    pub fn check(&self) -> Result<(), DefinitionError> {
        let mut seen = HashSet::new();
        for question in &self.questions {
            if !seen.insert(question.id.as_str()) {
                return Err(DefinitionError::DuplicateQuestionId(question.id.clone()));
            }
            match &question.body {
                QuestionBody::Mcq {
                    options,
                    correct_option_id,
                } => {
                    if options.is_empty() {
                        return Err(DefinitionError::NoOptions(question.id.clone()));
                    }
                    if !options.iter().any(|o| &o.id == correct_option_id) {
                        return Err(DefinitionError::UnknownCorrectOption {
                            question_id: question.id.clone(),
                            option_id: correct_option_id.clone(),
                        });
                    }
                }
                QuestionBody::Numerical { tolerance, .. } => {
                    if !(*tolerance >= 0.0) {
                        return Err(DefinitionError::NegativeTolerance(question.id.clone()));
                    }
                }
                QuestionBody::ShortAnswer { .. } | QuestionBody::LongAnswer { .. } => {}
            }
        }
        Ok(())
    }
}

/// A broken structural invariant in an [`ExamDefinition`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("duplicate question id: {0}")]
    DuplicateQuestionId(String),

    #[error("multiple-choice question {0} has no options")]
    NoOptions(String),

    #[error("question {question_id} references unknown correct option {option_id}")]
    UnknownCorrectOption {
        question_id: String,
        option_id: String,
    },

    #[error("numerical question {0} has a negative tolerance")]
    NegativeTolerance(String),
}

/// Scoring and proctoring options recognized on an exam.
///
/// Unknown fields are ignored. Missing booleans default to `false`, a missing
/// `negativeMarkingValue` to `0.25` and a missing `passThreshold` to `60`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default, alias = "negative_marking")]
    pub negative_marking: bool,
    /// Penalty per wrong gradable answer, in `[0, 1]`.
    #[serde(default = "default_negative_marking_value", alias = "negative_marking_value")]
    pub negative_marking_value: f64,
    #[serde(default, alias = "eye_tracking")]
    pub eye_tracking: bool,
    #[serde(default, alias = "face_detection")]
    pub face_detection: bool,
    #[serde(default, alias = "prevent_tab_switching")]
    pub prevent_tab_switching: bool,
    #[serde(default, alias = "generate_certificate")]
    pub generate_certificate: bool,
    #[serde(default, alias = "display_results")]
    pub display_results: bool,
    /// Minimum percentage needed to pass.
    #[serde(default = "default_pass_threshold", alias = "pass_threshold")]
    pub pass_threshold: f64,
}

impl Settings {
    /// Whether a camera stream is needed: eye tracking or face detection.
    pub fn requires_media(&self) -> bool {
        self.eye_tracking || self.face_detection
    }

    /// The penalty clamped into `[0, 1]`.
    pub fn penalty(&self) -> f64 {
        if self.negative_marking_value.is_nan() {
            return 0.0;
        }
        self.negative_marking_value.clamp(0.0, 1.0)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            negative_marking: false,
            negative_marking_value: default_negative_marking_value(),
            eye_tracking: false,
            face_detection: false,
            prevent_tab_switching: false,
            generate_certificate: false,
            display_results: false,
            pass_threshold: default_pass_threshold(),
        }
    }
}

fn default_negative_marking_value() -> f64 {
    0.25
}

fn default_pass_threshold() -> f64 {
    60.0
}

/// A single question. The variant-specific content lives in [`QuestionBody`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Stable id, unique within the exam.
    pub id: String,
    /// Prompt shown to the student.
    pub text: String,
    #[serde(flatten)]
    pub body: QuestionBody,
}

impl Question {
    pub fn kind(&self) -> QuestionKind {
        match self.body {
            QuestionBody::Mcq { .. } => QuestionKind::Mcq,
            QuestionBody::ShortAnswer { .. } => QuestionKind::ShortAnswer,
            QuestionBody::LongAnswer { .. } => QuestionKind::LongAnswer,
            QuestionBody::Numerical { .. } => QuestionKind::Numerical,
        }
    }

    /// Whether `answer` is the right shape for this question.
    ///
    /// `Unanswered` fits every question.
    pub fn accepts(&self, answer: &Answer) -> bool {
        matches!(
            (&self.body, answer),
            (_, Answer::Unanswered)
                | (QuestionBody::Mcq { .. }, Answer::SelectedOption(_))
                | (QuestionBody::ShortAnswer { .. }, Answer::Text(_))
                | (QuestionBody::LongAnswer { .. }, Answer::Text(_))
                | (QuestionBody::Numerical { .. }, Answer::Number(_))
        )
    }
}

/// Variant-specific question content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum QuestionBody {
    Mcq {
        options: Vec<McqOption>,
        #[serde(alias = "correctOption")]
        correct_option_id: String,
    },
    #[serde(alias = "shortanswer")]
    ShortAnswer {
        /// Reference text for external grading.
        #[serde(default, alias = "answer")]
        expected_answer: String,
    },
    #[serde(alias = "longanswer")]
    LongAnswer {
        #[serde(default, alias = "answer")]
        expected_answer: String,
    },
    Numerical {
        expected_value: f64,
        #[serde(default)]
        tolerance: f64,
    },
}

/// One choice of a multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McqOption {
    pub id: String,
    pub text: String,
}

/// The four question variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Mcq,
    ShortAnswer,
    LongAnswer,
    Numerical,
}

impl QuestionKind {
    /// MCQ and numerical questions are scored automatically; free-text ones
    /// need external grading.
    pub fn is_gradable(self) -> bool {
        matches!(self, QuestionKind::Mcq | QuestionKind::Numerical)
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionKind::Mcq => write!(f, "mcq"),
            QuestionKind::ShortAnswer => write!(f, "short_answer"),
            QuestionKind::LongAnswer => write!(f, "long_answer"),
            QuestionKind::Numerical => write!(f, "numerical"),
        }
    }
}

/// A student's answer to one question.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Answer {
    /// Index into the question's option list.
    SelectedOption(usize),
    Text(String),
    Number(f64),
    #[default]
    Unanswered,
}

impl Answer {
    pub fn is_answered(&self) -> bool {
        !matches!(self, Answer::Unanswered)
    }

    /// Short name of the variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Answer::SelectedOption(_) => "selected_option",
            Answer::Text(_) => "text",
            Answer::Number(_) => "number",
            Answer::Unanswered => "unanswered",
        }
    }
}

/// In-progress answers keyed by question id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerSheet {
    answers: HashMap<String, Answer>,
}

static UNANSWERED: Answer = Answer::Unanswered;

impl AnswerSheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The answer recorded for `question_id`, or `Unanswered`.
    pub fn get(&self, question_id: &str) -> &Answer {
        self.answers.get(question_id).unwrap_or(&UNANSWERED)
    }

    /// Record an answer, replacing any previous one for the same question.
    pub fn set(&mut self, question_id: impl Into<String>, answer: Answer) {
        self.answers.insert(question_id.into(), answer);
    }

    /// Number of questions with a non-`Unanswered` answer.
    pub fn answered_count(&self) -> usize {
        self.answers.values().filter(|a| a.is_answered()).count()
    }

    pub fn clear(&mut self) {
        self.answers.clear();
    }
}

/// The person taking the exam. Identity is established outside examguard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub name: String,
}

impl Student {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

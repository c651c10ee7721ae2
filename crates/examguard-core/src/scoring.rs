//! Attempt scoring.
//!
//! Pure functions over (questions, answers, settings). Only MCQ and numerical
//! questions are graded here; free-text answers go to an external grader and
//! never affect the percentage.

use serde::{Deserialize, Serialize};

use crate::model::{Answer, AnswerSheet, Question, QuestionBody, Settings};

/// How a single question was graded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    Correct,
    Incorrect,
    /// Gradable but left blank. Counts toward the total only.
    Unanswered,
    /// Free-text question, excluded from automatic scoring.
    Ungraded,
}

/// Aggregate score for one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub correct_count: u32,
    pub incorrect_count: u32,
    pub unanswered_count: u32,
    /// MCQ plus numerical questions.
    pub gradable_total: u32,
    /// Penalty actually taken off the raw score (after the zero floor).
    pub negative_marks_deducted: f64,
    /// `max(0, correct - incorrect * penalty)`, or `correct` without negative marking.
    pub final_score: f64,
    /// `round(final_score / gradable_total * 100)`, `0` when nothing is gradable.
    pub percentage: u32,
    pub passed: bool,
}

impl ScoreResult {
    pub fn raw_score(&self) -> f64 {
        f64::from(self.correct_count)
    }
}

/// Grade one answer against its question.
///
/// An answer of the wrong shape carries no usable information and is treated
/// like a blank.
pub fn grade(question: &Question, answer: &Answer) -> Grade {
    match (&question.body, answer) {
        (QuestionBody::ShortAnswer { .. } | QuestionBody::LongAnswer { .. }, _) => Grade::Ungraded,
        (
            QuestionBody::Mcq {
                options,
                correct_option_id,
            },
            Answer::SelectedOption(index),
        ) => match options.get(*index) {
            Some(option) if &option.id == correct_option_id => Grade::Correct,
            _ => Grade::Incorrect,
        },
        (
            QuestionBody::Numerical {
                expected_value,
                tolerance,
            },
            Answer::Number(value),
        ) => {
            if within_tolerance(*value, *expected_value, *tolerance) {
                Grade::Correct
            } else {
                Grade::Incorrect
            }
        }
        _ => Grade::Unanswered,
    }
}

/// `|value - expected| <= tolerance`. A tolerance of zero means exact
/// equality; negative tolerances are treated as zero.
pub fn within_tolerance(value: f64, expected: f64, tolerance: f64) -> bool {
    (value - expected).abs() <= tolerance.max(0.0)
}

/// Score a whole attempt.
pub fn score_attempt(questions: &[Question], answers: &AnswerSheet, settings: &Settings) -> ScoreResult {
    let mut correct = 0u32;
    let mut incorrect = 0u32;
    let mut unanswered = 0u32;
    let mut gradable = 0u32;

    for question in questions {
        match grade(question, answers.get(&question.id)) {
            Grade::Correct => {
                gradable += 1;
                correct += 1;
            }
            Grade::Incorrect => {
                gradable += 1;
                incorrect += 1;
            }
            Grade::Unanswered => {
                gradable += 1;
                unanswered += 1;
            }
            Grade::Ungraded => {}
        }
    }

    let raw = f64::from(correct);
    let final_score = if settings.negative_marking {
        (raw - f64::from(incorrect) * settings.penalty()).max(0.0)
    } else {
        raw
    };

    if gradable == 0 {
        return ScoreResult {
            correct_count: correct,
            incorrect_count: incorrect,
            unanswered_count: unanswered,
            gradable_total: 0,
            negative_marks_deducted: 0.0,
            final_score,
            percentage: 0,
            passed: false,
        };
    }

    let percentage = (final_score / f64::from(gradable) * 100.0).round().clamp(0.0, 100.0) as u32;

    ScoreResult {
        correct_count: correct,
        incorrect_count: incorrect,
        unanswered_count: unanswered,
        gradable_total: gradable,
        negative_marks_deducted: raw - final_score,
        final_score,
        percentage,
        passed: f64::from(percentage) >= settings.pass_threshold,
    }
}

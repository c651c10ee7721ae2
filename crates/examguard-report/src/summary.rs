//! Text summaries and JSON export of results.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use examguard_core::result::{ExamResult, SubmitReason};
use examguard_core::scoring::ScoreResult;

/// Multi-line summary shown after an attempt when the exam displays results.
pub fn render_score_summary(score: &ScoreResult, reason: SubmitReason) -> String {
    let mut out = String::new();
    let headline = match reason {
        SubmitReason::Manual => "Exam submitted",
        SubmitReason::TimeExpired => "Time expired, exam submitted automatically",
        SubmitReason::SecurityViolation => "Exam terminated due to security violations",
    };
    let _ = writeln!(out, "{headline}");
    let _ = writeln!(out, "  Total questions: {}", score.gradable_total);
    let _ = writeln!(out, "  Correct:         {}", score.correct_count);
    let _ = writeln!(out, "  Wrong:           {}", score.incorrect_count);
    let _ = writeln!(out, "  Unanswered:      {}", score.unanswered_count);
    if score.negative_marks_deducted > 0.0 {
        let _ = writeln!(out, "  Penalty:         -{:.2}", score.negative_marks_deducted);
    }
    let _ = writeln!(out, "  Score:           {}%", score.percentage);
    let _ = write!(out, "  Result:          {}", if score.passed { "PASSED" } else { "FAILED" });
    out
}

/// Aggregate over a set of stored results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultStats {
    pub attempts: usize,
    pub passed: usize,
    pub terminated: usize,
    pub avg_percentage: f64,
}

impl ResultStats {
    pub fn compute(results: &[ExamResult]) -> Self {
        let attempts = results.len();
        let passed = results.iter().filter(|r| r.passed).count();
        let terminated = results
            .iter()
            .filter(|r| r.reason == SubmitReason::SecurityViolation)
            .count();
        let avg_percentage = if attempts == 0 {
            0.0
        } else {
            results.iter().map(|r| f64::from(r.percentage)).sum::<f64>() / attempts as f64
        };
        Self {
            attempts,
            passed,
            terminated,
            avg_percentage,
        }
    }

    pub fn pass_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.passed as f64 / self.attempts as f64
        }
    }
}

/// A snapshot of stored results, written as one JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultExport {
    pub exported_at: DateTime<Utc>,
    /// Exam code the results were filtered by, if any.
    pub exam_code: Option<String>,
    pub stats: ResultStats,
    pub results: Vec<ExamResult>,
}

impl ResultExport {
    pub fn new(results: Vec<ExamResult>, exam_code: Option<String>) -> Self {
        Self {
            exported_at: Utc::now(),
            exam_code,
            stats: ResultStats::compute(&results),
            results,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize results")
    }

    /// Save the export as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write results to {}", path.display()))?;
        Ok(())
    }

    /// Load an export from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read results from {}", path.display()))?;
        serde_json::from_str(&content).context("failed to parse results JSON")
    }
}

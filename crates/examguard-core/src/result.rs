//! Persisted attempt results and certificate eligibility.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{ExamDefinition, Settings, Student};
use crate::scoring::ScoreResult;

/// Why an attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitReason {
    Manual,
    TimeExpired,
    SecurityViolation,
}

impl fmt::Display for SubmitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitReason::Manual => write!(f, "submitted"),
            SubmitReason::TimeExpired => write!(f, "time expired"),
            SubmitReason::SecurityViolation => write!(f, "terminated for security violations"),
        }
    }
}

/// The record appended to the result store. Created once per completed
/// attempt and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResult {
    pub id: Uuid,
    pub student_id: String,
    pub student_name: String,
    pub exam_id: String,
    pub exam_code: String,
    pub exam_title: String,
    pub percentage: u32,
    pub gradable_total: u32,
    pub correct_count: u32,
    pub tab_switch_count: u32,
    #[serde(rename = "completedAtTimestamp", alias = "completedAt")]
    pub completed_at: DateTime<Utc>,
    pub passed: bool,
    pub reason: SubmitReason,
}

impl ExamResult {
    pub fn new(
        student: &Student,
        exam: &ExamDefinition,
        score: &ScoreResult,
        tab_switch_count: u32,
        completed_at: DateTime<Utc>,
        reason: SubmitReason,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            student_id: student.id.clone(),
            student_name: student.name.clone(),
            exam_id: exam.id.clone(),
            exam_code: exam.code.clone(),
            exam_title: exam.title.clone(),
            percentage: score.percentage,
            gradable_total: score.gradable_total,
            correct_count: score.correct_count,
            tab_switch_count,
            completed_at,
            passed: score.passed,
            reason,
        }
    }

    /// What the certificate renderer receives for this result.
    pub fn certificate_request(&self) -> CertificateRequest {
        CertificateRequest {
            student_name: self.student_name.clone(),
            exam_title: self.exam_title.clone(),
            percentage: self.percentage,
            completed_at: self.completed_at,
            exam_code: self.exam_code.clone(),
        }
    }
}

/// Input to the external certificate renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRequest {
    pub student_name: String,
    pub exam_title: String,
    pub percentage: u32,
    pub completed_at: DateTime<Utc>,
    pub exam_code: String,
}

/// A certificate is issued for a passing attempt on an exam that offers one,
/// unless the attempt was terminated.
pub fn certificate_eligible(passed: bool, settings: &Settings, reason: SubmitReason) -> bool {
    passed && settings.generate_certificate && reason != SubmitReason::SecurityViolation
}

/// Everything produced by the terminal transition of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub reason: SubmitReason,
    pub score: ScoreResult,
    pub result: ExamResult,
    /// Present when the attempt earned a certificate.
    pub certificate: Option<CertificateRequest>,
}

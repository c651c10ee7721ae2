//! Collaborator traits the session talks to.
//!
//! Implementations live in the `examguard-providers` and `examguard-report`
//! crates; tests supply their own.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PermissionDenied;
use crate::model::ExamDefinition;
use crate::result::{CertificateRequest, ExamResult};

// ---------------------------------------------------------------------------
// Exam lookup
// ---------------------------------------------------------------------------

/// Resolves an exam code to its definition.
#[async_trait]
pub trait ExamLookup: Send + Sync {
    /// Human-readable backend name (e.g. "catalog").
    fn name(&self) -> &str;

    /// `Ok(None)` when no exam has this code. `Err` only when the backend
    /// itself failed.
    async fn lookup(&self, code: &str) -> anyhow::Result<Option<ExamDefinition>>;
}

// ---------------------------------------------------------------------------
// Media permission
// ---------------------------------------------------------------------------

/// Camera constraints requested for proctoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaConstraints {
    pub video: bool,
    pub width: u32,
    pub height: u32,
    pub facing_mode: String,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            video: true,
            width: 320,
            height: 240,
            facing_mode: "user".to_string(),
        }
    }
}

/// An acquired camera stream. Released exactly once, on teardown.
pub trait MediaStream: Send + std::fmt::Debug {
    fn release(&mut self);
}

/// Asks the user (or platform) for a camera stream.
#[async_trait]
pub trait MediaPermission: Send + Sync {
    async fn request_stream(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<Box<dyn MediaStream>, PermissionDenied>;
}

// ---------------------------------------------------------------------------
// Result persistence
// ---------------------------------------------------------------------------

/// Append-only store of completed results.
#[async_trait]
pub trait ResultPersister: Send + Sync {
    fn name(&self) -> &str;

    async fn append(&self, result: &ExamResult) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// Certificate rendering
// ---------------------------------------------------------------------------

/// Consumes an eligible attempt. Never calls back into the session.
pub trait CertificateRenderer: Send + Sync {
    fn render(&self, request: &CertificateRequest) -> anyhow::Result<()>;
}

//! Media permission without a camera.
//!
//! The CLI and the tests grant or deny from a script and hand out simulated
//! streams that record when they are released.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use examguard_core::error::PermissionDenied;
use examguard_core::traits::{MediaConstraints, MediaPermission, MediaStream};

/// A stream that owns nothing but remembers being released.
#[derive(Debug)]
pub struct SimulatedStream {
    constraints: MediaConstraints,
    released: bool,
    release_count: Arc<AtomicU32>,
}

impl SimulatedStream {
    pub fn constraints(&self) -> &MediaConstraints {
        &self.constraints
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl MediaStream for SimulatedStream {
    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.release_count.fetch_add(1, Ordering::SeqCst);
            tracing::debug!("simulated camera stream released");
        }
    }
}

/// Outcome of one permission request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionOutcome {
    Grant,
    Deny(String),
}

/// Answers permission requests from a script. Once the script runs out the
/// fallback outcome is used for every further request.
pub struct ScriptedMedia {
    script: Mutex<VecDeque<PermissionOutcome>>,
    fallback: PermissionOutcome,
    request_count: AtomicU32,
    release_count: Arc<AtomicU32>,
}

impl ScriptedMedia {
    pub fn new(
        script: impl IntoIterator<Item = PermissionOutcome>,
        fallback: PermissionOutcome,
    ) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback,
            request_count: AtomicU32::new(0),
            release_count: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn always_grant() -> Self {
        Self::new([], PermissionOutcome::Grant)
    }

    pub fn always_deny(reason: impl Into<String>) -> Self {
        Self::new([], PermissionOutcome::Deny(reason.into()))
    }

    /// Number of requests answered so far.
    pub fn request_count(&self) -> u32 {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Number of handed-out streams that have been released.
    pub fn release_count(&self) -> u32 {
        self.release_count.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> PermissionOutcome {
        self.script
            .lock()
            .ok()
            .and_then(|mut s| s.pop_front())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl MediaPermission for ScriptedMedia {
    async fn request_stream(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<Box<dyn MediaStream>, PermissionDenied> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        match self.next_outcome() {
            PermissionOutcome::Grant => Ok(Box::new(SimulatedStream {
                constraints: constraints.clone(),
                released: false,
                release_count: Arc::clone(&self.release_count),
            })),
            PermissionOutcome::Deny(reason) => Err(PermissionDenied::new(reason)),
        }
    }
}

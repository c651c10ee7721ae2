//! Result stores: an append-only JSON-lines file and an in-memory store.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;

use examguard_core::result::ExamResult;
use examguard_core::traits::ResultPersister;

use crate::error::PersistError;

/// Appends one JSON object per line to a file. Existing lines are never
/// rewritten.
#[derive(Debug, Clone)]
pub struct JsonlResultStore {
    path: PathBuf,
}

impl JsonlResultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&self, line: &str) -> Result<(), PersistError> {
        let io_err = |e: std::io::Error| PersistError::Io {
            path: self.path.display().to_string(),
            message: e.to_string(),
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;
        writeln!(file, "{line}").map_err(io_err)?;
        Ok(())
    }

    /// Read every stored result. A missing file is an empty store; lines
    /// that do not parse are skipped.
    pub fn load_all(&self) -> Result<Vec<ExamResult>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read result store: {}", self.path.display()))?;

        let mut results = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ExamResult>(line) {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        line = index + 1,
                        "skipping malformed result: {e}"
                    );
                }
            }
        }
        Ok(results)
    }

    /// Results for one exam code, in the order they were stored.
    pub fn load_for_exam(&self, exam_code: &str) -> Result<Vec<ExamResult>> {
        Ok(filter_by_exam(self.load_all()?, exam_code))
    }
}

#[async_trait]
impl ResultPersister for JsonlResultStore {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn append(&self, result: &ExamResult) -> Result<()> {
        let line = serde_json::to_string(result).map_err(|e| PersistError::Encode(e.to_string()))?;
        self.write_line(&line)?;
        tracing::debug!(path = %self.path.display(), result_id = %result.id, "result appended");
        Ok(())
    }
}

/// Keeps results in memory. Useful for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryResultStore {
    results: Mutex<Vec<ExamResult>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> Vec<ExamResult> {
        self.results
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.results.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ResultPersister for MemoryResultStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn append(&self, result: &ExamResult) -> Result<()> {
        let mut results = self
            .results
            .lock()
            .map_err(|_| anyhow::anyhow!("memory result store poisoned"))?;
        results.push(result.clone());
        Ok(())
    }
}

/// Keep results whose exam code matches exactly.
pub fn filter_by_exam(results: Vec<ExamResult>, exam_code: &str) -> Vec<ExamResult> {
    results
        .into_iter()
        .filter(|r| r.exam_code == exam_code)
        .collect()
}

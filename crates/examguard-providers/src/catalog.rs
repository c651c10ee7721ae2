//! In-process exam lookup backed by TOML catalog files.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

use examguard_core::catalog::{load_exam_directory, sample_exam};
use examguard_core::model::ExamDefinition;
use examguard_core::traits::ExamLookup;

/// Looks exams up by join code in a fixed in-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct CatalogLookup {
    exams: HashMap<String, ExamDefinition>,
}

impl CatalogLookup {
    /// Build a catalog from definitions. When two exams share a code the
    /// first one wins.
    pub fn from_exams(exams: impl IntoIterator<Item = ExamDefinition>) -> Self {
        let mut catalog = Self::default();
        for exam in exams {
            catalog.insert(exam);
        }
        catalog
    }

    /// Load every `.toml` exam under `dir`.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let exams = load_exam_directory(dir)?;
        tracing::debug!(dir = %dir.display(), count = exams.len(), "loaded exam catalog");
        Ok(Self::from_exams(exams))
    }

    /// Add the built-in sample exam unless its code is already taken.
    pub fn with_sample(mut self) -> Self {
        let sample = sample_exam();
        if !self.exams.contains_key(&sample.code) {
            self.exams.insert(sample.code.clone(), sample);
        }
        self
    }

    /// Returns `false` if an exam with the same code was already present.
    pub fn insert(&mut self, exam: ExamDefinition) -> bool {
        if self.exams.contains_key(&exam.code) {
            tracing::warn!(code = %exam.code, id = %exam.id, "duplicate exam code, keeping the first");
            return false;
        }
        self.exams.insert(exam.code.clone(), exam);
        true
    }

    pub fn len(&self) -> usize {
        self.exams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exams.is_empty()
    }

    /// All exams, ordered by code.
    pub fn exams(&self) -> Vec<&ExamDefinition> {
        let mut exams: Vec<_> = self.exams.values().collect();
        exams.sort_by(|a, b| a.code.cmp(&b.code));
        exams
    }
}

#[async_trait]
impl ExamLookup for CatalogLookup {
    fn name(&self) -> &str {
        "catalog"
    }

    async fn lookup(&self, code: &str) -> Result<Option<ExamDefinition>> {
        Ok(self.exams.get(code.trim()).cloned())
    }
}

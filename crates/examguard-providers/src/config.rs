//! Configuration and collaborator factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use examguard_core::integrity::{FocusLossPolicy, SeededSignalSource, SignalSource};
use examguard_core::traits::{ExamLookup, ResultPersister};

use crate::catalog::CatalogLookup;
use crate::http::{HttpExamLookup, HttpResultPersister};
use crate::store::JsonlResultStore;

/// How duplicate focus-loss notifications are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusPolicyName {
    #[default]
    CountEach,
    Coalesce,
}

/// The `[proctoring]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProctoringConfig {
    #[serde(default)]
    pub focus_loss_policy: FocusPolicyName,
    /// Window for `coalesce`, in milliseconds.
    #[serde(default = "default_coalesce_window_ms")]
    pub coalesce_window_ms: u64,
    /// Fixed seed for the simulated signal. Unset means a fresh seed per run.
    #[serde(default)]
    pub signal_seed: Option<u64>,
}

fn default_coalesce_window_ms() -> u64 {
    500
}

impl Default for ProctoringConfig {
    fn default() -> Self {
        Self {
            focus_loss_policy: FocusPolicyName::default(),
            coalesce_window_ms: default_coalesce_window_ms(),
            signal_seed: None,
        }
    }
}

/// Top-level examguard configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamguardConfig {
    /// Directory of exam TOML files.
    #[serde(default = "default_exams_dir")]
    pub exams_dir: PathBuf,
    /// JSON-lines file results are appended to.
    #[serde(default = "default_results_path")]
    pub results_path: PathBuf,
    /// Remote results service. Takes precedence over `results_path`.
    #[serde(default)]
    pub results_endpoint: Option<String>,
    /// Remote exam service. When unset exams come from `exams_dir`.
    #[serde(default)]
    pub exams_endpoint: Option<String>,
    #[serde(default)]
    pub proctoring: ProctoringConfig,
}

fn default_exams_dir() -> PathBuf {
    PathBuf::from("./exams")
}
fn default_results_path() -> PathBuf {
    PathBuf::from("./examguard-results/results.jsonl")
}

impl Default for ExamguardConfig {
    fn default() -> Self {
        Self {
            exams_dir: default_exams_dir(),
            results_path: default_results_path(),
            results_endpoint: None,
            exams_endpoint: None,
            proctoring: ProctoringConfig::default(),
        }
    }
}

impl ExamguardConfig {
    pub fn focus_policy(&self) -> FocusLossPolicy {
        match self.proctoring.focus_loss_policy {
            FocusPolicyName::CountEach => FocusLossPolicy::CountEach,
            FocusPolicyName::Coalesce => FocusLossPolicy::Coalesce {
                window: Duration::from_millis(self.proctoring.coalesce_window_ms),
            },
        }
    }

    pub fn signal_source(&self) -> Box<dyn SignalSource> {
        match self.proctoring.signal_seed {
            Some(seed) => Box::new(SeededSignalSource::new(seed)),
            None => Box::new(SeededSignalSource::from_entropy()),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let mut from = 0;
    while let Some(offset) = result[from..].find("${") {
        let start = from + offset;
        let Some(end) = result[start..].find('}') else {
            break;
        };
        let var_name = &result[start + 2..start + end];
        let value = std::env::var(var_name).unwrap_or_default();
        result = format!(
            "{}{}{}",
            &result[..start],
            value,
            &result[start + end + 1..]
        );
        // Substituted text is never expanded again.
        from = start + value.len();
    }
    result
}

fn resolve_path(path: &Path) -> PathBuf {
    PathBuf::from(resolve_env_vars(&path.to_string_lossy()))
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `examguard.toml` in the current directory
/// 2. `~/.config/examguard/config.toml`
///
/// `EXAMGUARD_RESULTS_PATH` overrides `results_path`.
pub fn load_config() -> Result<ExamguardConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ExamguardConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("examguard.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            let config = toml::from_str::<ExamguardConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?;
            tracing::debug!(path = %path.display(), "loaded config");
            config
        }
        None => ExamguardConfig::default(),
    };

    if let Ok(results_path) = std::env::var("EXAMGUARD_RESULTS_PATH") {
        config.results_path = PathBuf::from(results_path);
    }

    config.exams_dir = resolve_path(&config.exams_dir);
    config.results_path = resolve_path(&config.results_path);
    config.results_endpoint = config.results_endpoint.as_deref().map(resolve_env_vars);
    config.exams_endpoint = config.exams_endpoint.as_deref().map(resolve_env_vars);

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("examguard"))
}

/// Build the exam lookup the config points at. A local catalog always
/// includes the built-in sample exam.
pub fn create_lookup(config: &ExamguardConfig) -> Result<Arc<dyn ExamLookup>> {
    if let Some(endpoint) = &config.exams_endpoint {
        return Ok(Arc::new(HttpExamLookup::new(endpoint)?));
    }
    let catalog = if config.exams_dir.is_dir() {
        CatalogLookup::from_dir(&config.exams_dir)?
    } else {
        tracing::debug!(dir = %config.exams_dir.display(), "exams directory missing, using sample only");
        CatalogLookup::default()
    };
    Ok(Arc::new(catalog.with_sample()))
}

/// Build the result persister the config points at.
pub fn create_persister(config: &ExamguardConfig) -> Result<Arc<dyn ResultPersister>> {
    match &config.results_endpoint {
        Some(endpoint) => Ok(Arc::new(HttpResultPersister::new(endpoint)?)),
        None => Ok(Arc::new(JsonlResultStore::new(&config.results_path))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_EXAMGUARD_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_EXAMGUARD_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_EXAMGUARD_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("open ${brace"), "open ${brace");
        std::env::remove_var("_EXAMGUARD_TEST_VAR");
    }

    #[test]
    fn resolved_values_are_not_expanded_again() {
        std::env::set_var("_EXAMGUARD_SELF_REF", "${_EXAMGUARD_SELF_REF}");
        std::env::set_var("_EXAMGUARD_OTHER", "b");
        assert_eq!(
            resolve_env_vars("a/${_EXAMGUARD_SELF_REF}/${_EXAMGUARD_OTHER}"),
            "a/${_EXAMGUARD_SELF_REF}/b"
        );
        std::env::remove_var("_EXAMGUARD_SELF_REF");
        std::env::remove_var("_EXAMGUARD_OTHER");
    }

    #[test]
    fn default_config() {
        let config = ExamguardConfig::default();
        assert_eq!(config.exams_dir, PathBuf::from("./exams"));
        assert!(config.results_endpoint.is_none());
        assert_eq!(config.focus_policy(), FocusLossPolicy::CountEach);
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
exams_dir = "catalog"
results_path = "out/results.jsonl"
results_endpoint = "https://results.example.com/api"

[proctoring]
focus_loss_policy = "coalesce"
coalesce_window_ms = 250
signal_seed = 7
"#;
        let config: ExamguardConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.exams_dir, PathBuf::from("catalog"));
        assert_eq!(config.proctoring.signal_seed, Some(7));
        assert_eq!(
            config.focus_policy(),
            FocusLossPolicy::Coalesce {
                window: Duration::from_millis(250)
            }
        );
    }

    #[test]
    fn rejects_unknown_policy() {
        let toml_str = "[proctoring]\nfocus_loss_policy = \"ignore\"\n";
        assert!(toml::from_str::<ExamguardConfig>(toml_str).is_err());
    }

    #[test]
    fn explicit_missing_path_fails() {
        let err = load_config_from(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn explicit_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("examguard.toml");
        std::fs::write(&path, "exams_dir = \"mine\"\n").unwrap();
        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.exams_dir, PathBuf::from("mine"));
        assert_eq!(config.proctoring, ProctoringConfig::default());
    }

    #[tokio::test]
    async fn lookup_falls_back_to_sample() {
        let config = ExamguardConfig {
            exams_dir: PathBuf::from("/no/such/dir"),
            ..ExamguardConfig::default()
        };
        let lookup = create_lookup(&config).unwrap();
        assert_eq!(lookup.name(), "catalog");
        assert!(lookup.lookup("SAMPLE-2024").await.unwrap().is_some());
    }

    #[test]
    fn persister_follows_endpoint() {
        let mut config = ExamguardConfig::default();
        assert_eq!(create_persister(&config).unwrap().name(), "jsonl");
        config.results_endpoint = Some("http://localhost:9/results".into());
        assert_eq!(create_persister(&config).unwrap().name(), "http");
    }
}

//! The `examguard init` command.

use std::path::Path;

use anyhow::{Context, Result};

use examguard_core::catalog::SAMPLE_EXAM_TOML;

pub fn execute() -> Result<()> {
    write_if_missing(Path::new("examguard.toml"), SAMPLE_CONFIG)?;

    std::fs::create_dir_all("exams").context("failed to create exams/")?;
    write_if_missing(Path::new("exams/sample.toml"), SAMPLE_EXAM_TOML)?;

    std::fs::create_dir_all("scripts").context("failed to create scripts/")?;
    write_if_missing(Path::new("scripts/sample-attempt.toml"), SAMPLE_SCRIPT)?;

    println!("\nNext steps:");
    println!("  1. Run: examguard validate --exams exams");
    println!("  2. Run: examguard take --code SAMPLE-2024 --student-id s1 --student-name \"Ada Lovelace\" --script scripts/sample-attempt.toml");
    println!("  3. Run: examguard results");

    Ok(())
}

fn write_if_missing(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        println!("{} already exists, skipping.", path.display());
    } else {
        std::fs::write(path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Created {}", path.display());
    }
    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# examguard configuration

exams_dir = "./exams"
results_path = "./examguard-results/results.jsonl"
# results_endpoint = "https://results.example.com/api"
# exams_endpoint = "https://exams.example.com/api"

[proctoring]
# "count_each" counts every hide and blur event; "coalesce" counts a
# hide+blur pair from one tab switch once.
focus_loss_policy = "count_each"
coalesce_window_ms = 500
# signal_seed = 42
"#;

const SAMPLE_SCRIPT: &str = r#"# Attempt script for the sample exam.
end = "submit"

[[steps]]
at_secs = 30
action = "select_option"
question = "1"
option = "a"

[[steps]]
at_secs = 75
action = "select_option"
question = "2"
option = "c"

[[steps]]
at_secs = 140
action = "select_option"
question = "3"
option = "b"

[[steps]]
at_secs = 200
action = "select_option"
question = "4"
option = "c"

[[steps]]
at_secs = 420
action = "write_text"
question = "5"
text = "localStorage persists until cleared; sessionStorage ends with the tab."
"#;

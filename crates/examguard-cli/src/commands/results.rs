//! The `examguard results` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use examguard_core::result::ExamResult;
use examguard_providers::{load_config_from, JsonlResultStore};
use examguard_report::{ResultExport, ResultStats};

pub fn execute(
    exam: Option<String>,
    format: String,
    output: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let store = JsonlResultStore::new(&config.results_path);
    let results = match &exam {
        Some(code) => store.load_for_exam(code.trim())?,
        None => store.load_all()?,
    };

    match format.as_str() {
        "table" => {
            if results.is_empty() {
                println!("No results in {}.", store.path().display());
            } else {
                print_table(&results);
            }
        }
        "json" => {
            let export = ResultExport::new(results, exam);
            match output {
                Some(path) => {
                    export.save_json(&path)?;
                    println!("Wrote {} result(s) to {}", export.results.len(), path.display());
                }
                None => println!("{}", export.to_json()?),
            }
        }
        other => anyhow::bail!("unknown format '{other}' (expected table or json)"),
    }

    Ok(())
}

fn print_table(results: &[ExamResult]) {
    let mut table = Table::new();
    table.set_header(vec![
        "Result",
        "Student",
        "Exam",
        "Score",
        "Outcome",
        "Tab switches",
        "Completed",
    ]);
    for r in results {
        let id = r.id.to_string();
        let outcome = if r.passed { "passed" } else { "failed" };
        table.add_row(vec![
            Cell::new(&id[..8]),
            Cell::new(&r.student_name),
            Cell::new(&r.exam_code),
            Cell::new(format!("{}% ({}/{})", r.percentage, r.correct_count, r.gradable_total)),
            Cell::new(format!("{outcome}, {}", r.reason)),
            Cell::new(r.tab_switch_count),
            Cell::new(r.completed_at.format("%Y-%m-%d %H:%M UTC")),
        ]);
    }
    println!("{table}");

    let stats = ResultStats::compute(results);
    println!(
        "{} attempt(s), {:.0}% passed, {} terminated, average score {:.1}%",
        stats.attempts,
        stats.pass_rate() * 100.0,
        stats.terminated,
        stats.avg_percentage
    );
}

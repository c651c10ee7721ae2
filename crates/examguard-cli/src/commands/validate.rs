//! The `examguard validate` command.

use std::path::PathBuf;

use anyhow::Result;

use examguard_core::catalog::{load_exam_directory, parse_exam_file, validate_exam};

pub fn execute(exams_path: PathBuf) -> Result<()> {
    let exams = if exams_path.is_dir() {
        load_exam_directory(&exams_path)?
    } else {
        vec![parse_exam_file(&exams_path)?]
    };

    let mut total_warnings = 0;

    for exam in &exams {
        println!(
            "Exam: {} [{}] ({} questions, {} gradable)",
            exam.title,
            exam.code,
            exam.questions.len(),
            exam.gradable_count()
        );

        let warnings = validate_exam(exam);
        for w in &warnings {
            let prefix = w
                .question_id
                .as_ref()
                .map(|id| format!("  [{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All exams valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}

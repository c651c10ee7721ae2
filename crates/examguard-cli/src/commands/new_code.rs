//! The `examguard new-code` command.

use anyhow::Result;
use chrono::Datelike;

use examguard_core::codes::generate_exam_code;

pub fn execute(year: Option<i32>) -> Result<()> {
    let year = year.unwrap_or_else(|| chrono::Local::now().year());
    println!("{}", generate_exam_code(year, &mut rand::thread_rng()));
    Ok(())
}

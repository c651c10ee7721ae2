//! TOML exam catalog.
//!
//! Loads exam definitions from TOML files and directories, and validates them.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;

use crate::availability::ExamSchedule;
use crate::model::{ExamDefinition, McqOption, Question, QuestionBody, Settings};

/// Intermediate TOML structure for exam files.
#[derive(Debug, Deserialize)]
struct TomlExamFile {
    exam: TomlExamHeader,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize)]
struct TomlExamHeader {
    id: String,
    code: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_duration")]
    duration_seconds: u64,
    #[serde(default)]
    settings: Settings,
    #[serde(default)]
    schedule: Option<TomlSchedule>,
}

fn default_duration() -> u64 {
    3600
}

#[derive(Debug, Deserialize)]
struct TomlSchedule {
    date: String,
    start_time: String,
    duration_minutes: u32,
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    text: String,
    #[serde(default)]
    options: Vec<TomlOption>,
    #[serde(default)]
    correct_option: Option<String>,
    #[serde(default)]
    expected_answer: Option<String>,
    #[serde(default)]
    expected_value: Option<f64>,
    #[serde(default)]
    tolerance: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TomlOption {
    id: String,
    text: String,
}

/// Parse a single TOML file into an `ExamDefinition`.
pub fn parse_exam_file(path: &Path) -> Result<ExamDefinition> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read exam file: {}", path.display()))?;

    parse_exam_str(&content, path)
}

/// Parse a TOML string into an `ExamDefinition` (useful for testing).
pub fn parse_exam_str(content: &str, source_path: &Path) -> Result<ExamDefinition> {
    let parsed: TomlExamFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let schedule = parsed
        .exam
        .schedule
        .map(|s| parse_schedule(&s))
        .transpose()
        .with_context(|| format!("invalid schedule in {}", source_path.display()))?;

    let questions = parsed
        .questions
        .into_iter()
        .map(convert_question)
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("invalid question in {}", source_path.display()))?;

    Ok(ExamDefinition {
        id: parsed.exam.id,
        code: parsed.exam.code,
        title: parsed.exam.title,
        description: parsed.exam.description,
        duration_seconds: parsed.exam.duration_seconds,
        settings: parsed.exam.settings,
        schedule,
        questions,
    })
}

fn parse_schedule(schedule: &TomlSchedule) -> Result<ExamSchedule> {
    let date = NaiveDate::parse_from_str(&schedule.date, "%Y-%m-%d")
        .with_context(|| format!("bad date '{}', expected YYYY-MM-DD", schedule.date))?;
    let start_time = NaiveTime::parse_from_str(&schedule.start_time, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(&schedule.start_time, "%H:%M"))
        .with_context(|| format!("bad start_time '{}', expected HH:MM", schedule.start_time))?;
    Ok(ExamSchedule {
        date,
        start_time,
        duration_minutes: schedule.duration_minutes,
    })
}

fn convert_question(q: TomlQuestion) -> Result<Question> {
    let body = match q.kind.as_str() {
        "mcq" => {
            let correct_option_id = q
                .correct_option
                .with_context(|| format!("question {}: mcq needs correct_option", q.id))?;
            QuestionBody::Mcq {
                options: q
                    .options
                    .into_iter()
                    .map(|o| McqOption {
                        id: o.id,
                        text: o.text,
                    })
                    .collect(),
                correct_option_id,
            }
        }
        "short_answer" | "shortanswer" => QuestionBody::ShortAnswer {
            expected_answer: q.expected_answer.unwrap_or_default(),
        },
        "long_answer" | "longanswer" => QuestionBody::LongAnswer {
            expected_answer: q.expected_answer.unwrap_or_default(),
        },
        "numerical" => QuestionBody::Numerical {
            expected_value: q
                .expected_value
                .with_context(|| format!("question {}: numerical needs expected_value", q.id))?,
            tolerance: q.tolerance.unwrap_or(0.0),
        },
        other => anyhow::bail!("question {}: unknown question type '{other}'", q.id),
    };

    Ok(Question {
        id: q.id,
        text: q.text,
        body,
    })
}

/// Recursively load all `.toml` exam files from a directory.
pub fn load_exam_directory(dir: &Path) -> Result<Vec<ExamDefinition>> {
    let mut exams = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            exams.extend(load_exam_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_exam_file(&path) {
                Ok(exam) => exams.push(exam),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(exams)
}

/// A warning from exam validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The question ID (if applicable).
    pub question_id: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Validate an exam for common issues.
pub fn validate_exam(exam: &ExamDefinition) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let exam_warning = |message: String| ValidationWarning {
        question_id: None,
        message,
    };

    if exam.questions.is_empty() {
        warnings.push(exam_warning("exam has no questions".into()));
    }
    if exam.duration_seconds == 0 {
        warnings.push(exam_warning("duration_seconds is 0".into()));
    }

    let settings = &exam.settings;
    if !(0.0..=1.0).contains(&settings.negative_marking_value) {
        warnings.push(exam_warning(format!(
            "negative_marking_value {} is outside [0, 1] and will be clamped",
            settings.negative_marking_value
        )));
    }
    if !(0.0..=100.0).contains(&settings.pass_threshold) {
        warnings.push(exam_warning(format!(
            "pass_threshold {} is outside [0, 100]",
            settings.pass_threshold
        )));
    }
    if exam.gradable_count() == 0 && !exam.questions.is_empty() {
        warnings.push(exam_warning(
            "no automatically gradable questions; every attempt scores 0%".into(),
        ));
    }

    let mut seen_ids = HashSet::new();
    for question in &exam.questions {
        let question_warning = |message: String| ValidationWarning {
            question_id: Some(question.id.clone()),
            message,
        };

        if !seen_ids.insert(&question.id) {
            warnings.push(question_warning(format!("duplicate question ID: {}", question.id)));
        }
        if question.text.trim().is_empty() {
            warnings.push(question_warning("question text is empty".into()));
        }

        match &question.body {
            QuestionBody::Mcq {
                options,
                correct_option_id,
            } => {
                if options.is_empty() {
                    warnings.push(question_warning("mcq has no options".into()));
                } else if !options.iter().any(|o| &o.id == correct_option_id) {
                    warnings.push(question_warning(format!(
                        "correct_option '{correct_option_id}' is not one of the options"
                    )));
                }
                let mut option_ids = HashSet::new();
                for option in options {
                    if !option_ids.insert(&option.id) {
                        warnings.push(question_warning(format!(
                            "duplicate option ID: {}",
                            option.id
                        )));
                    }
                }
            }
            QuestionBody::Numerical { tolerance, .. } => {
                if *tolerance < 0.0 {
                    warnings.push(question_warning(format!("tolerance {tolerance} is negative")));
                }
            }
            QuestionBody::ShortAnswer { expected_answer }
            | QuestionBody::LongAnswer { expected_answer } => {
                if expected_answer.trim().is_empty() {
                    warnings.push(question_warning(
                        "no expected_answer for the external grader".into(),
                    ));
                }
            }
        }
    }

    warnings
}

// ---------------------------------------------------------------------------
// Sample exam
// ---------------------------------------------------------------------------

/// Join code of the built-in sample exam.
pub const SAMPLE_EXAM_CODE: &str = "SAMPLE-2024";

/// The built-in sample exam in catalog form, as written by `examguard init`.
pub const SAMPLE_EXAM_TOML: &str = r#"[exam]
id = "sample-1"
code = "SAMPLE-2024"
title = "Web Development Certification Exam"
description = "Test your knowledge in HTML, CSS, JavaScript, and modern web frameworks"
duration_seconds = 3600

[exam.settings]
negative_marking = false
negative_marking_value = 0.0
eye_tracking = false
face_detection = false
display_results = true
generate_certificate = true

[[questions]]
id = "1"
type = "mcq"
text = "What does HTML stand for?"
correct_option = "a"
options = [
    { id = "a", text = "Hyper Text Markup Language" },
    { id = "b", text = "High Tech Modern Language" },
    { id = "c", text = "Hyperlink Text Management Language" },
    { id = "d", text = "Home Tool Markup Language" },
]

[[questions]]
id = "2"
type = "mcq"
text = "Which CSS property is used to change the text color of an element?"
correct_option = "c"
options = [
    { id = "a", text = "text-color" },
    { id = "b", text = "font-color" },
    { id = "c", text = "color" },
    { id = "d", text = "text-style" },
]

[[questions]]
id = "3"
type = "mcq"
text = 'What is the correct JavaScript syntax to change the content of the HTML element with id="demo"?'
correct_option = "b"
options = [
    { id = "a", text = 'document.getElement("demo").innerHTML = "Hello";' },
    { id = "b", text = 'document.getElementById("demo").innerHTML = "Hello";' },
    { id = "c", text = '#demo.innerHTML = "Hello";' },
    { id = "d", text = 'document.getElementByName("demo").innerHTML = "Hello";' },
]

[[questions]]
id = "4"
type = "mcq"
text = "Which framework is developed and maintained by Facebook?"
correct_option = "c"
options = [
    { id = "a", text = "Angular" },
    { id = "b", text = "Vue" },
    { id = "c", text = "React" },
    { id = "d", text = "Svelte" },
]

[[questions]]
id = "5"
type = "long_answer"
text = 'Explain the difference between "localStorage" and "sessionStorage".'
expected_answer = "localStorage and sessionStorage both allow you to store data on the client side, but localStorage data has no expiration time while sessionStorage data gets cleared when the page session ends (when the browser tab is closed)."
"#;

/// The built-in sample exam.
pub fn sample_exam() -> ExamDefinition {
    fn mcq(id: &str, text: &str, options: [&str; 4], correct: &str) -> Question {
        Question {
            id: id.into(),
            text: text.into(),
            body: QuestionBody::Mcq {
                options: ["a", "b", "c", "d"]
                    .into_iter()
                    .zip(options)
                    .map(|(id, text)| McqOption {
                        id: id.into(),
                        text: text.into(),
                    })
                    .collect(),
                correct_option_id: correct.into(),
            },
        }
    }

    ExamDefinition {
        id: "sample-1".into(),
        code: SAMPLE_EXAM_CODE.into(),
        title: "Web Development Certification Exam".into(),
        description: "Test your knowledge in HTML, CSS, JavaScript, and modern web frameworks".into(),
        duration_seconds: 3600,
        settings: Settings {
            negative_marking: false,
            negative_marking_value: 0.0,
            display_results: true,
            generate_certificate: true,
            ..Settings::default()
        },
        schedule: None,
        questions: vec![
            mcq(
                "1",
                "What does HTML stand for?",
                [
                    "Hyper Text Markup Language",
                    "High Tech Modern Language",
                    "Hyperlink Text Management Language",
                    "Home Tool Markup Language",
                ],
                "a",
            ),
            mcq(
                "2",
                "Which CSS property is used to change the text color of an element?",
                ["text-color", "font-color", "color", "text-style"],
                "c",
            ),
            mcq(
                "3",
                r#"What is the correct JavaScript syntax to change the content of the HTML element with id="demo"?"#,
                [
                    r#"document.getElement("demo").innerHTML = "Hello";"#,
                    r#"document.getElementById("demo").innerHTML = "Hello";"#,
                    r##"#demo.innerHTML = "Hello";"##,
                    r#"document.getElementByName("demo").innerHTML = "Hello";"#,
                ],
                "b",
            ),
            mcq(
                "4",
                "Which framework is developed and maintained by Facebook?",
                ["Angular", "Vue", "React", "Svelte"],
                "c",
            ),
            Question {
                id: "5".into(),
                text: r#"Explain the difference between "localStorage" and "sessionStorage"."#.into(),
                body: QuestionBody::LongAnswer {
                    expected_answer: "localStorage and sessionStorage both allow you to store data on the client side, but localStorage data has no expiration time while sessionStorage data gets cleared when the page session ends (when the browser tab is closed).".into(),
                },
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::model::QuestionKind;

    const VALID_TOML: &str = r#"
[exam]
id = "physics-1"
code = "EX-2026-PHYS"
title = "Physics Basics"
duration_seconds = 900

[exam.settings]
negative_marking = true
negative_marking_value = 0.5
prevent_tab_switching = true

[exam.schedule]
date = "2026-11-02"
start_time = "09:30"
duration_minutes = 90

[[questions]]
id = "g"
type = "numerical"
text = "Acceleration due to gravity in m/s^2"
expected_value = 9.81
tolerance = 0.05

[[questions]]
id = "unit"
type = "mcq"
text = "SI unit of force"
correct_option = "n"
options = [
    { id = "j", text = "Joule" },
    { id = "n", text = "Newton" },
]

[[questions]]
id = "define"
type = "short_answer"
text = "Define inertia"
expected_answer = "Resistance to change in motion"
"#;

    fn path() -> PathBuf {
        PathBuf::from("test.toml")
    }

    #[test]
    fn parse_valid_toml() {
        let exam = parse_exam_str(VALID_TOML, &path()).unwrap();
        assert_eq!(exam.code, "EX-2026-PHYS");
        assert_eq!(exam.duration_seconds, 900);
        assert!(exam.settings.negative_marking);
        assert_eq!(exam.settings.negative_marking_value, 0.5);
        assert!(exam.settings.prevent_tab_switching);
        assert_eq!(exam.settings.pass_threshold, 60.0);
        assert_eq!(exam.questions.len(), 3);
        assert_eq!(exam.questions[0].kind(), QuestionKind::Numerical);
        assert_eq!(exam.questions[2].kind(), QuestionKind::ShortAnswer);
        assert_eq!(exam.gradable_count(), 2);

        let schedule = exam.schedule.unwrap();
        assert_eq!(schedule.start_time, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(schedule.duration_minutes, 90);
    }

    #[test]
    fn parse_missing_optional_fields() {
        let toml = r#"
[exam]
id = "min"
code = "MIN"
title = "Minimal"

[[questions]]
id = "q"
type = "longanswer"
text = "Discuss"
"#;
        let exam = parse_exam_str(toml, &path()).unwrap();
        assert_eq!(exam.duration_seconds, 3600);
        assert_eq!(exam.settings, Settings::default());
        assert!(exam.schedule.is_none());
        assert_eq!(exam.questions[0].kind(), QuestionKind::LongAnswer);
    }

    #[test]
    fn unknown_settings_are_ignored() {
        let toml = r#"
[exam]
id = "x"
code = "X"
title = "X"

[exam.settings]
eye_tracking = true
theme = "dark"
"#;
        let exam = parse_exam_str(toml, &path()).unwrap();
        assert!(exam.settings.eye_tracking);
        assert!(!exam.settings.face_detection);
        assert_eq!(exam.settings.negative_marking_value, 0.25);
    }

    #[test]
    fn parse_rejects_unknown_type() {
        let toml = r#"
[exam]
id = "x"
code = "X"
title = "X"

[[questions]]
id = "q"
type = "essay"
text = "?"
"#;
        let err = parse_exam_str(toml, &path()).unwrap_err();
        assert!(format!("{err:#}").contains("unknown question type"));
    }

    #[test]
    fn parse_rejects_mcq_without_answer_key() {
        let toml = r#"
[exam]
id = "x"
code = "X"
title = "X"

[[questions]]
id = "q"
type = "mcq"
text = "?"
options = [{ id = "a", text = "A" }]
"#;
        assert!(parse_exam_str(toml, &path()).is_err());
    }

    #[test]
    fn parse_rejects_bad_schedule_date() {
        let toml = r#"
[exam]
id = "x"
code = "X"
title = "X"

[exam.schedule]
date = "02/11/2026"
start_time = "09:00"
duration_minutes = 30
"#;
        assert!(parse_exam_str(toml, &path()).is_err());
    }

    #[test]
    fn validate_clean_exam() {
        let exam = parse_exam_str(VALID_TOML, &path()).unwrap();
        assert!(validate_exam(&exam).is_empty());
    }

    #[test]
    fn validate_reports_structural_problems() {
        let toml = r#"
[exam]
id = "x"
code = "X"
title = "X"
duration_seconds = 0

[exam.settings]
negative_marking_value = 1.5

[[questions]]
id = "q"
type = "mcq"
text = "Pick"
correct_option = "z"
options = [{ id = "a", text = "A" }]

[[questions]]
id = "q"
type = "numerical"
text = "Number"
expected_value = 1
tolerance = -1
"#;
        let exam = parse_exam_str(toml, &path()).unwrap();
        let messages: Vec<String> = validate_exam(&exam).into_iter().map(|w| w.message).collect();
        assert!(messages.iter().any(|m| m.contains("duration_seconds is 0")));
        assert!(messages.iter().any(|m| m.contains("outside [0, 1]")));
        assert!(messages.iter().any(|m| m.contains("correct_option 'z'")));
        assert!(messages.iter().any(|m| m.contains("duplicate question ID")));
        assert!(messages.iter().any(|m| m.contains("negative")));
        assert!(exam.check().is_err());
    }

    #[test]
    fn validate_empty_exam() {
        let toml = "[exam]\nid = \"x\"\ncode = \"X\"\ntitle = \"X\"\n";
        let exam = parse_exam_str(toml, &path()).unwrap();
        let warnings = validate_exam(&exam);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("no questions"));
    }

    #[test]
    fn sample_toml_matches_builtin() {
        let parsed = parse_exam_str(SAMPLE_EXAM_TOML, &path()).unwrap();
        assert_eq!(parsed, sample_exam());
        assert!(parsed.check().is_ok());
        assert_eq!(parsed.gradable_count(), 4);
        assert!(!parsed.requires_monitoring());
    }

    #[test]
    fn load_directory_skips_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good.toml"), VALID_TOML).unwrap();
        std::fs::write(dir.path().join("broken.toml"), "not = [valid").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(nested.join("sample.toml"), SAMPLE_EXAM_TOML).unwrap();

        let mut codes: Vec<String> = load_exam_directory(dir.path())
            .unwrap()
            .into_iter()
            .map(|e| e.code)
            .collect();
        codes.sort();
        assert_eq!(codes, vec!["EX-2026-PHYS", "SAMPLE-2024"]);
    }

    #[test]
    fn load_directory_rejects_file_path() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(load_exam_directory(file.path()).is_err());
    }
}

/// Run export: a CSV document with SUMMARY, CHECKLIST and CHAT_LOG sections.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::core::session::TrainerSession;
use crate::schema::transcript::TIMESTAMP_FORMAT;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("run {0} is not finished yet")]
    NotReady(String),
}

const SUMMARY_HEADER: [&str; 10] = [
    "run_id",
    "started_at",
    "finished_at",
    "class",
    "student",
    "difficulty",
    "completed_intents",
    "total_intents",
    "completion_rate",
    "briefing",
];

const CHECKLIST_HEADER: [&str; 9] = [
    "run_id",
    "started_at",
    "finished_at",
    "class",
    "student",
    "difficulty",
    "step",
    "intent",
    "completed",
];

const CHAT_LOG_HEADER: [&str; 9] = [
    "finished_at",
    "started_at",
    "difficulty",
    "student",
    "class",
    "run_id",
    "ts",
    "speaker",
    "text",
];

/// Quote a field when it contains a comma, quote or line break.
pub fn escape_csv(field: &str) -> String {
    if field.contains(|c: char| matches!(c, ',' | '"' | '\n' | '\r')) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn row<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(|f| escape_csv(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.trim().is_empty() {
        default
    } else {
        value
    }
}

/// `<class>_<student>_<run_id>.csv`, with placeholders for blank names.
pub fn export_filename(session: &TrainerSession) -> String {
    let clean = |s: &str| s.trim().replace(|c: char| c == '/' || c == '\\', "_");
    format!(
        "{}_{}_{}.csv",
        clean(or_default(session.class_name(), "class")),
        clean(or_default(session.student_name(), "student")),
        session.run_id()
    )
}

/// The export document. Available at any point of the run.
pub fn render_csv(session: &TrainerSession) -> String {
    let run_id = session.run_id().to_string();
    let started = session.started_at().format(TIMESTAMP_FORMAT).to_string();
    let finished = session
        .finished_at()
        .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_default();
    let class = session.class_name().to_string();
    let student = session.student_name().to_string();
    let difficulty = session.difficulty().to_string();
    let (completed, total) = session.completed_counts();
    let rate = if total == 0 { 0.0 } else { completed as f64 / total as f64 };

    let mut out = String::new();
    let mut section = |title: &str, lines: Vec<String>| {
        out.push_str("### ");
        out.push_str(title);
        out.push('\n');
        for line in lines {
            out.push_str(&line);
            out.push('\n');
        }
        out.push('\n');
    };

    section(
        "SUMMARY",
        vec![
            row(&SUMMARY_HEADER),
            row(&[
                run_id.clone(),
                started.clone(),
                finished.clone(),
                class.clone(),
                student.clone(),
                difficulty.clone(),
                completed.to_string(),
                total.to_string(),
                rate.to_string(),
                session.briefing().trim().to_string(),
            ]),
        ],
    );

    let mut checklist = vec![row(&CHECKLIST_HEADER)];
    for step in session.steps() {
        for intent in &step.required {
            let fields: [&str; 9] = [
                &run_id,
                &started,
                &finished,
                &class,
                &student,
                &difficulty,
                &step.key,
                intent,
                if session.is_satisfied(intent) { "true" } else { "false" },
            ];
            checklist.push(row(&fields));
        }
    }
    section("CHECKLIST", checklist);

    let entries = session.transcript().entries();
    if entries.is_empty() {
        section("CHAT_LOG", vec!["No chat log recorded.".to_string()]);
    } else {
        let mut log = vec![row(&CHAT_LOG_HEADER)];
        for entry in entries {
            let timestamp = entry.timestamp_display();
            let fields: [&str; 9] = [
                &finished,
                &started,
                &difficulty,
                &student,
                &class,
                &run_id,
                &timestamp,
                entry.speaker.tag(),
                &entry.text,
            ];
            log.push(row(&fields));
        }
        section("CHAT_LOG", log);
    }

    out
}

/// Write the export into `dir`, once the run is finished.
pub fn write_export(session: &TrainerSession, dir: &Path) -> Result<PathBuf, ExportError> {
    if !session.export_ready() {
        return Err(ExportError::NotReady(session.run_id().to_string()));
    }
    let path = dir.join(export_filename(session));
    std::fs::write(&path, render_csv(session))?;
    info!(path = %path.display(), "export written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn session(class: &str, student: &str) -> TrainerSession {
        TrainerSession::builder()
            .seed(11)
            .class_name(class)
            .student_name(student)
            .today(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn escape_only_when_needed() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a, b"), "\"a, b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_csv("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn filename_uses_placeholders() {
        assert_eq!(export_filename(&session("", "  ")), "class_student_run_11.csv");
        assert_eq!(export_filename(&session("4B", "Noor")), "4B_Noor_run_11.csv");
        assert_eq!(export_filename(&session("a/b", "c")), "a_b_c_run_11.csv");
    }

    #[test]
    fn document_has_three_sections() {
        let mut s = session("4B", "Noor");
        s.submit("who are you, please");
        let csv = render_csv(&s);

        let summary = csv.find("### SUMMARY").unwrap();
        let checklist = csv.find("### CHECKLIST").unwrap();
        let chat = csv.find("### CHAT_LOG").unwrap();
        assert!(summary < checklist && checklist < chat);

        assert!(csv.contains("run_11,"));
        assert!(csv.contains(",Standard,1,24,"));
        assert!(csv.contains(",gate,ask_identity,true"));
        assert!(csv.contains(",gate,ask_purpose,false"));
        assert!(csv.contains(",YOU,\"who are you, please\""));
        assert!(csv.contains(",VISITOR,Good morning."));
    }

    #[test]
    fn checklist_has_row_per_required_intent() {
        let csv = render_csv(&session("", ""));
        let block = csv.split("### CHECKLIST\n").nth(1).unwrap();
        let block = block.split("\n\n").next().unwrap();
        assert_eq!(block.lines().count(), 1 + 24);
    }

    #[test]
    fn unfinished_run_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_export(&session("", ""), dir.path()).unwrap_err();
        assert!(matches!(err, ExportError::NotReady(id) if id == "run_11"));
    }
}

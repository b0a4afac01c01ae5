//! Turns a finished session into a report file.
//!
//! Two layouts are supported: a paginated plain-text document (the default)
//! and a CSV with one row per question. Free text is coerced to ASCII first.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::ExportError;
use crate::session::{Identity, Session, SessionRecord};

pub const REPORT_TITLE: &str = "IELTS Speaking Test Responses and Feedback";
pub const FEEDBACK_SEPARATOR: &str = "; ";
const PAGE_BREAK: char = '\u{0C}';
const LINE_WIDTH: usize = 90;
const HEADER_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Csv,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Text => "txt",
            ReportFormat::Csv => "csv",
        }
    }
}

/// Closest ASCII rendering of `text`; anything without one becomes `?`.
pub fn to_ascii(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii() {
            out.push(c);
            continue;
        }
        let replacement = match c {
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' | '\u{00B4}' => "'",
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' | '\u{00AB}' | '\u{00BB}' => "\"",
            '\u{2010}'..='\u{2015}' | '\u{2212}' => "-",
            '\u{2026}' => "...",
            '\u{00A0}' | '\u{2002}'..='\u{200A}' => " ",
            '\u{2022}' | '\u{00B7}' => "*",
            'À'..='Å' => "A",
            'à'..='å' => "a",
            'Æ' => "AE",
            'æ' => "ae",
            'Ç' => "C",
            'ç' => "c",
            'È'..='Ë' => "E",
            'è'..='ë' => "e",
            'Ì'..='Ï' => "I",
            'ì'..='ï' => "i",
            'Ñ' => "N",
            'ñ' => "n",
            'Ò'..='Ö' | 'Ø' => "O",
            'ò'..='ö' | 'ø' => "o",
            'Œ' => "OE",
            'œ' => "oe",
            'Ù'..='Ü' => "U",
            'ù'..='ü' => "u",
            'Ý' | 'Ÿ' => "Y",
            'ý' | 'ÿ' => "y",
            'ß' => "ss",
            _ => "?",
        };
        out.push_str(replacement);
    }
    out
}

fn file_component(raw: &str) -> String {
    let cleaned: String = to_ascii(raw.trim())
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect();
    match cleaned.trim_matches('.') {
        "" => "anonymous".to_string(),
        name => name.to_string(),
    }
}

/// `{userId}_{userName}_IELTS_{YYYYMMDD_HHMMSS}.{ext}`
pub fn file_name(identity: Option<&Identity>, at: DateTime<Local>, format: ReportFormat) -> String {
    let (user_id, name) = match identity {
        Some(identity) => (
            file_component(&identity.user_id),
            file_component(&identity.name),
        ),
        None => ("anonymous".to_string(), "anonymous".to_string()),
    };
    format!(
        "{user_id}_{name}_IELTS_{}.{}",
        at.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

/// The feedback text for one record: entries then the band line, joined.
pub fn feedback_text(record: &SessionRecord<'_>) -> String {
    record
        .feedback
        .map(|report| report.joined(FEEDBACK_SEPARATOR))
        .unwrap_or_default()
}

fn wrap(line: &str, width: usize) -> Vec<String> {
    if line.len() <= width {
        return vec![line.to_string()];
    }

    let mut lines = Vec::new();
    let mut current = String::new();
    for word in line.split(' ') {
        let limit = if lines.is_empty() { width } else { width - 2 };
        if !current.is_empty() && current.len() + 1 + word.len() > limit {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }

    lines
        .into_iter()
        .enumerate()
        .map(|(i, l)| if i == 0 { l } else { format!("  {l}") })
        .collect()
}

/// Render the plain-text document, split into pages of `page_lines` lines.
pub fn render_text(session: &Session, page_lines: usize) -> String {
    let mut body: Vec<String> = vec![REPORT_TITLE.to_string(), String::new()];

    if let Some(mode) = session.mode() {
        body.push(format!("Mode: {mode}"));
    }
    if let Some(at) = session.started_at() {
        body.push(format!("Started: {}", at.format(HEADER_TIME_FORMAT)));
    }
    if let Some(at) = session.completed_at() {
        body.push(format!("Completed: {}", at.format(HEADER_TIME_FORMAT)));
    }
    if let Some(identity) = session.identity() {
        body.push(format!("User ID: {}", to_ascii(&identity.user_id)));
        body.push(format!("Name: {}", to_ascii(&identity.name)));
    }
    body.push(String::new());

    for record in session.records() {
        let block = [
            format!(
                "Question {}: {}",
                record.question.number(),
                to_ascii(&record.question.text)
            ),
            format!("Response: {}", to_ascii(record.response)),
            format!("Feedback: {}", to_ascii(&feedback_text(&record))),
        ];
        for line in block {
            body.extend(wrap(&line, LINE_WIDTH));
        }
        body.push(String::new());
    }

    paginate(body, page_lines.max(5))
}

fn paginate(lines: Vec<String>, page_lines: usize) -> String {
    let content_lines = page_lines - 2;
    let pages: Vec<&[String]> = lines.chunks(content_lines).collect();
    let total = pages.len();

    let mut out = String::new();
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            out.push(PAGE_BREAK);
            out.push('\n');
        }
        for line in page.iter() {
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&format!("Page {} of {}\n", i + 1, total));
    }
    out
}

#[derive(Debug, Clone)]
pub struct ReportExporter {
    output_dir: PathBuf,
    format: ReportFormat,
    page_lines: usize,
}

impl ReportExporter {
    pub fn new<P: AsRef<Path>>(output_dir: P, format: ReportFormat, page_lines: usize) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            format,
            page_lines,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn format(&self) -> ReportFormat {
        self.format
    }

    /// Write the completed session and return the path of the new file.
    pub fn export(&self, session: &Session, at: DateTime<Local>) -> Result<PathBuf, ExportError> {
        if !session.is_complete() {
            return Err(ExportError::Incomplete);
        }

        fs::create_dir_all(&self.output_dir).map_err(|source| ExportError::Io {
            path: self.output_dir.clone(),
            source,
        })?;

        let path = self
            .output_dir
            .join(file_name(session.identity(), at, self.format));

        match self.format {
            ReportFormat::Text => {
                let document = render_text(session, self.page_lines);
                fs::write(&path, document).map_err(|source| ExportError::Io {
                    path: path.clone(),
                    source,
                })?;
            }
            ReportFormat::Csv => write_csv(session, &path).map_err(|source| ExportError::Csv {
                path: path.clone(),
                source,
            })?,
        }

        tracing::info!(path = %path.display(), format = %self.format, "report exported");
        Ok(path)
    }
}

fn write_csv(session: &Session, path: &Path) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "user_id",
        "name",
        "mode",
        "question_number",
        "question",
        "response",
        "feedback",
    ])?;

    let (user_id, name) = session
        .identity()
        .map(|i| (to_ascii(&i.user_id), to_ascii(&i.name)))
        .unwrap_or_default();
    let mode = session.mode().map(|m| m.to_string()).unwrap_or_default();

    for record in session.records() {
        let number = record.question.number().to_string();
        let question = to_ascii(&record.question.text);
        let response = to_ascii(record.response);
        let feedback = to_ascii(&feedback_text(&record));
        writer.write_record([
            user_id.as_str(),
            name.as_str(),
            mode.as_str(),
            number.as_str(),
            question.as_str(),
            response.as_str(),
            feedback.as_str(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_to_ascii_substitutes_instead_of_dropping() {
        assert_eq!(to_ascii("you’ve taken"), "you've taken");
        assert_eq!(to_ascii("“café” – naïve…"), "\"cafe\" - naive...");
        assert_eq!(to_ascii("plain ascii"), "plain ascii");
        assert_eq!(to_ascii("日本"), "??");
        assert_eq!(to_ascii("Straße"), "Strasse");
    }

    #[test]
    fn test_file_name_pattern() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let identity = Identity {
            name: "Ada".into(),
            user_id: "42".into(),
        };

        assert_eq!(
            file_name(Some(&identity), at, ReportFormat::Text),
            "42_Ada_IELTS_20240309_140507.txt"
        );
        assert_eq!(
            file_name(None, at, ReportFormat::Csv),
            "anonymous_anonymous_IELTS_20240309_140507.csv"
        );
    }

    #[test]
    fn test_file_name_sanitizes_identity() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let identity = Identity {
            name: "Zoë van/Dijk".into(),
            user_id: "..".into(),
        };
        assert_eq!(
            file_name(Some(&identity), at, ReportFormat::Text),
            "anonymous_Zoe-van-Dijk_IELTS_20240309_140507.txt"
        );
    }

    #[test]
    fn test_wrap_long_line() {
        let line = "Response: ".to_string() + &"word ".repeat(40);
        let wrapped = wrap(line.trim_end(), 30);
        assert!(wrapped.len() > 1);
        assert!(wrapped.iter().all(|l| l.len() <= 30));
        assert!(wrapped[1].starts_with("  "));
    }

    #[test]
    fn test_wrap_short_line_untouched() {
        assert_eq!(wrap("short", 30), vec!["short".to_string()]);
    }

    #[test]
    fn test_paginate_adds_footers_and_breaks() {
        let lines: Vec<String> = (0..10).map(|i| format!("line {i}")).collect();
        let doc = paginate(lines, 6);

        assert_eq!(doc.matches(PAGE_BREAK).count(), 2);
        assert!(doc.contains("Page 1 of 3"));
        assert!(doc.ends_with("Page 3 of 3\n"));
    }

    #[test]
    fn test_report_format_extension() {
        assert_eq!(ReportFormat::Text.extension(), "txt");
        assert_eq!(ReportFormat::Csv.extension(), "csv");
        assert_eq!(ReportFormat::default(), ReportFormat::Text);
    }
}

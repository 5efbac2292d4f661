//! CSV/JSON export and JSON import parsing.

use std::path::Path;

use chrono::{TimeZone, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::logbook::projection::{ProjectedNote, UNCATEGORIZED};
use crate::models::rpc::ExportBundle;

const FILE_SUFFIX: &str = "service-logbook-notes";

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Import file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Import file does not contain a list of notes")]
    NotAnArray,

    #[error("Could not read import file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Could not serialize export: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Notes extracted from an import file.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportBatch {
    pub notes: Vec<Value>,
}

impl ImportBatch {
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

/// Accepts either an export wrapper (`{"notes": [...], ...}`) or a bare array.
pub fn parse_import(raw: &str) -> Result<ImportBatch, ImportError> {
    let value: Value = serde_json::from_str(raw)?;
    let notes = match value {
        Value::Object(mut wrapper) => wrapper.remove("notes").unwrap_or(Value::Null),
        other => other,
    };

    let Value::Array(notes) = notes else {
        return Err(ImportError::NotAnArray);
    };

    if notes.is_empty() {
        warn!("Import file contains no notes");
    }
    Ok(ImportBatch { notes })
}

pub fn read_import_file(path: &Path) -> Result<ImportBatch, ImportError> {
    let raw = std::fs::read_to_string(path)?;
    parse_import(&raw)
}

pub fn export_json(bundle: &ExportBundle) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(bundle)?)
}

/// CSV with optional SUBJECT, CATEGORY and edited-by columns, each present
/// only when at least one note has data for it.
pub fn export_csv(notes: &[ProjectedNote]) -> String {
    let with_subject = notes
        .iter()
        .any(|n| n.note.subject.as_deref().is_some_and(|s| !s.is_empty()));
    let with_category = notes.iter().any(|n| n.category_label != UNCATEGORIZED);
    let with_editor = notes.iter().any(|n| !n.editor_name.is_empty());

    let mut header = vec!["WHO", "WHEN"];
    if with_subject {
        header.push("SUBJECT");
    }
    if with_category {
        header.push("CATEGORY");
    }
    header.push("NOTE");
    if with_editor {
        header.push("EDITED BY");
    }

    let mut lines = vec![csv_row(header.iter().map(|h| h.to_string()))];
    for projected in notes {
        let note = &projected.note;
        let mut row = vec![projected.author_name.clone(), format_timestamp(note.created_on)];
        if with_subject {
            row.push(note.subject.clone().unwrap_or_default());
        }
        if with_category {
            row.push(projected.category_label.clone());
        }
        row.push(projected.body_text.clone());
        if with_editor {
            row.push(edited_by(projected));
        }
        lines.push(csv_row(row));
    }
    lines.join("\n")
}

pub fn csv_filename(asset_name: &str) -> String {
    export_filename(asset_name, "csv")
}

pub fn json_filename(asset_name: &str) -> String {
    export_filename(asset_name, "json")
}

fn export_filename(asset_name: &str, extension: &str) -> String {
    let slug = kebab_case(&deburr(asset_name));
    if slug.is_empty() {
        format!("{FILE_SUFFIX}.{extension}")
    } else {
        format!("{slug}_{FILE_SUFFIX}.{extension}")
    }
}

fn edited_by(projected: &ProjectedNote) -> String {
    if projected.editor_name.is_empty() {
        return String::new();
    }
    match projected.note.updated_on {
        Some(ts) => format!("{} ({})", projected.editor_name, format_timestamp(ts)),
        None => projected.editor_name.clone(),
    }
}

fn csv_row(cells: impl IntoIterator<Item = String>) -> String {
    cells
        .into_iter()
        .map(|c| format!("\"{}\"", c.replace('"', "'")))
        .collect::<Vec<_>>()
        .join(",")
}

/// `YYYY-MM-DD HH:MM` in UTC; empty for out-of-range timestamps.
pub fn format_timestamp(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

/// Replaces Latin-1 and Latin Extended-A letters with their ASCII base and
/// drops combining marks.
fn deburr(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            'À'..='Å' => out.push('A'),
            'à'..='å' | 'ā' | 'ă' | 'ą' => out.push('a'),
            'Ā' | 'Ă' | 'Ą' => out.push('A'),
            'Æ' => out.push_str("Ae"),
            'æ' => out.push_str("ae"),
            'Ç' | 'Ć' | 'Č' => out.push('C'),
            'ç' | 'ć' | 'č' => out.push('c'),
            'Ð' | 'Ď' | 'Đ' => out.push('D'),
            'ð' | 'ď' | 'đ' => out.push('d'),
            'È'..='Ë' | 'Ē' | 'Ę' | 'Ě' => out.push('E'),
            'è'..='ë' | 'ē' | 'ę' | 'ě' => out.push('e'),
            'Ì'..='Ï' | 'Ī' => out.push('I'),
            'ì'..='ï' | 'ī' | 'ı' => out.push('i'),
            'Ł' => out.push('L'),
            'ł' => out.push('l'),
            'Ñ' | 'Ń' | 'Ň' => out.push('N'),
            'ñ' | 'ń' | 'ň' => out.push('n'),
            'Ò'..='Ö' | 'Ø' | 'Ō' | 'Ő' => out.push('O'),
            'ò'..='ö' | 'ø' | 'ō' | 'ő' => out.push('o'),
            'Œ' => out.push_str("Oe"),
            'œ' => out.push_str("oe"),
            'Ř' => out.push('R'),
            'ř' => out.push('r'),
            'Ś' | 'Š' | 'Ş' => out.push('S'),
            'ś' | 'š' | 'ş' => out.push('s'),
            'ß' => out.push_str("ss"),
            'Ť' => out.push('T'),
            'ť' => out.push('t'),
            'Þ' => out.push_str("Th"),
            'þ' => out.push_str("th"),
            'Ù'..='Ü' | 'Ū' | 'Ů' | 'Ű' => out.push('U'),
            'ù'..='ü' | 'ū' | 'ů' | 'ű' => out.push('u'),
            'Ý' | 'Ÿ' => out.push('Y'),
            'ý' | 'ÿ' => out.push('y'),
            'Ź' | 'Ż' | 'Ž' => out.push('Z'),
            'ź' | 'ż' | 'ž' => out.push('z'),
            '\u{0300}'..='\u{036f}' => {}
            other => out.push(other),
        }
    }
    out
}

/// Lower-case words joined by `-`. Words break on anything that is not
/// alphanumeric, on lower-to-upper case changes, and between letters and
/// digits.
fn kebab_case(input: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut prev: Option<char> = None;

    for c in input.chars() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev = None;
            continue;
        }
        if let Some(p) = prev {
            let case_break = p.is_lowercase() && c.is_uppercase();
            let digit_break = p.is_ascii_digit() != c.is_ascii_digit();
            if (case_break || digit_break) && !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        }
        current.extend(c.to_lowercase());
        prev = Some(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words.join("-")
}

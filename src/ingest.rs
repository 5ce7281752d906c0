//! Incident log ingestion
//!
//! An incident export is a CSV table. The `triggername` column holds a
//! composite field `"<prefix>_<node-id> <message text>"`; labeled training
//! exports also carry an `is_root` column marking the root-cause alarm.
//!
//! ```text
//! triggername,is_root
//! host_12 disk usage over 95%,1
//! host_7 ping timeout,0
//! ```
//!
//! Each row becomes a [`LogEvent`], tagged with the template its message
//! matches. Messages that match no template keep `template = None`.

use crate::template::{TemplateId, TemplateSet};
use crate::topology::{node_id_from_token, NodeId};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Column holding the composite node/message field
pub const MESSAGE_COLUMN: &str = "triggername";
/// Column holding the root-cause label in training exports
pub const ROOT_COLUMN: &str = "is_root";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IngestError {
    #[error("row {row}: composite field has no message part: '{field}'")]
    MissingMessage { row: usize, field: String },

    #[error("row {row}: cannot extract node id from '{token}'")]
    InvalidNode { row: usize, token: String },

    #[error("missing column '{0}'")]
    MissingColumn(&'static str),

    #[error("row {row}: unrecognised root-cause flag '{value}'")]
    InvalidRootFlag { row: usize, value: String },

    #[error("row {row}: expected {expected} fields, found {found}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("unterminated quoted field")]
    UnterminatedQuote,

    #[error("incident carries {0} root-cause labels, at most one is allowed")]
    MultipleRootCauses(usize),
}

/// One structured log line of an incident
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogEvent {
    pub node: NodeId,
    pub message: String,
    pub template: Option<TemplateId>,
    /// Present only for labeled training incidents
    pub is_root: Option<bool>,
}

/// Split `"<prefix>_<id> <message>"` into node id and message text
///
/// ```
/// use faultline::ingest::parse_composite;
///
/// let (node, message) = parse_composite("host_12 disk usage over 95%").unwrap();
/// assert_eq!(node, 12);
/// assert_eq!(message, "disk usage over 95%");
/// ```
pub fn parse_composite(field: &str) -> Result<(NodeId, &str), IngestError> {
    parse_composite_row(field, 0)
}

fn parse_composite_row(field: &str, row: usize) -> Result<(NodeId, &str), IngestError> {
    let (token, message) = field
        .split_once(' ')
        .ok_or_else(|| IngestError::MissingMessage {
            row,
            field: field.to_string(),
        })?;
    let node = node_id_from_token(token).ok_or_else(|| IngestError::InvalidNode {
        row,
        token: token.to_string(),
    })?;
    Ok((node, message))
}

/// Interpret a boolean-like label
pub fn parse_root_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "1.0" | "true" | "yes" | "y" => Some(true),
        "0" | "0.0" | "false" | "no" | "n" | "" => Some(false),
        _ => None,
    }
}

/// Split CSV text into records
///
/// Supports quoted fields with `""` escapes and embedded separators or line
/// breaks, and both `\n` and `\r\n` line endings. Blank lines are skipped.
pub fn parse_csv(text: &str) -> Result<Vec<Vec<String>>, IngestError> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                if !(record.len() == 1 && record[0].is_empty()) {
                    records.push(std::mem::take(&mut record));
                } else {
                    record.clear();
                }
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(IngestError::UnterminatedQuote);
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    Ok(records)
}

/// Header row plus data rows of one export, with column lookup
struct Table {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn parse(text: &str) -> Result<Self, IngestError> {
        let mut records = parse_csv(text)?.into_iter();
        let header = records
            .next()
            .ok_or(IngestError::MissingColumn(MESSAGE_COLUMN))?
            .into_iter()
            .map(|h| h.trim().to_string())
            .collect::<Vec<_>>();
        let rows: Vec<Vec<String>> = records.collect();
        for (idx, row) in rows.iter().enumerate() {
            if row.len() < header.len() {
                return Err(IngestError::RaggedRow {
                    row: idx + 1,
                    expected: header.len(),
                    found: row.len(),
                });
            }
        }
        Ok(Self { header, rows })
    }

    fn column(&self, name: &'static str) -> Result<usize, IngestError> {
        self.header
            .iter()
            .position(|h| h == name)
            .ok_or(IngestError::MissingColumn(name))
    }
}

/// Parse one incident export into structured events
///
/// With `labeled`, the `is_root` column is required and at most one row may be
/// flagged.
pub fn parse_incident(
    text: &str,
    templates: &TemplateSet,
    labeled: bool,
) -> Result<Vec<LogEvent>, IngestError> {
    let table = Table::parse(text)?;
    let message_col = table.column(MESSAGE_COLUMN)?;
    let root_col = if labeled {
        Some(table.column(ROOT_COLUMN)?)
    } else {
        None
    };

    let mut events = Vec::with_capacity(table.rows.len());
    for (idx, row) in table.rows.iter().enumerate() {
        let (node, message) = parse_composite_row(&row[message_col], idx + 1)?;
        let is_root = match root_col {
            Some(col) => Some(parse_root_flag(&row[col]).ok_or_else(|| {
                IngestError::InvalidRootFlag {
                    row: idx + 1,
                    value: row[col].clone(),
                }
            })?),
            None => None,
        };

        events.push(LogEvent {
            node,
            message: message.to_string(),
            template: templates.template_for(message),
            is_root,
        });
    }

    let roots = events.iter().filter(|e| e.is_root == Some(true)).count();
    if roots > 1 {
        return Err(IngestError::MultipleRootCauses(roots));
    }

    let unmatched = events.iter().filter(|e| e.template.is_none()).count();
    if unmatched > 0 {
        tracing::debug!(unmatched, total = events.len(), "messages without template");
    }

    Ok(events)
}

/// Read an incident from any byte source
pub fn read_incident<R: Read>(
    mut reader: R,
    templates: &TemplateSet,
    labeled: bool,
) -> anyhow::Result<Vec<LogEvent>> {
    let mut text = String::new();
    reader
        .read_to_string(&mut text)
        .context("Failed to read incident log")?;
    Ok(parse_incident(&text, templates, labeled)?)
}

pub fn read_incident_file<P: AsRef<Path>>(
    path: P,
    templates: &TemplateSet,
    labeled: bool,
) -> anyhow::Result<Vec<LogEvent>> {
    let text = fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read incident file: {}", path.as_ref().display()))?;
    parse_incident(&text, templates, labeled)
        .with_context(|| format!("Invalid incident file: {}", path.as_ref().display()))
}

/// CSV files of a directory, numeric stems first in numeric order
pub fn incident_files<P: AsRef<Path>>(dir: P) -> anyhow::Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "csv") {
            files.push(path);
        }
    }

    files.sort_by_key(|path| {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        (stem.parse::<u64>().map_or(1, |_| 0), stem.parse::<u64>().unwrap_or(0), stem)
    });
    Ok(files)
}

/// Every message body of every export in `dir`, the template-mining corpus
pub fn corpus_messages<P: AsRef<Path>>(dir: P) -> anyhow::Result<Vec<String>> {
    let mut messages = Vec::new();
    for path in incident_files(dir)? {
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read corpus file: {}", path.display()))?;
        let table = Table::parse(&text)
            .with_context(|| format!("Invalid corpus file: {}", path.display()))?;
        let col = table.column(MESSAGE_COLUMN)?;
        for (idx, row) in table.rows.iter().enumerate() {
            let (_, message) = parse_composite_row(&row[col], idx + 1)
                .with_context(|| format!("Invalid corpus file: {}", path.display()))?;
            messages.push(message.to_string());
        }
    }
    tracing::debug!(messages = messages.len(), "collected template corpus");
    Ok(messages)
}

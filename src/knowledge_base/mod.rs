//! Knowledge base loading.
//!
//! Reads tabular records from a spreadsheet (via calamine) or a JSON array
//! and keeps the rows whose title and description are both non-empty.


use calamine::{Data, Reader, open_workbook_auto};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::KnowledgeBaseConfig;
use crate::{AssistError, Result};

/// One knowledge base record. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Passage {
    title: String,
    description: String,
    combined_text: String,
}

impl Passage {
    /// Returns `None` when either field is empty after trimming.
    #[inline]
    pub fn new(title: &str, description: &str) -> Option<Self> {
        let title = title.trim();
        let description = description.trim();

        if title.is_empty() || description.is_empty() {
            return None;
        }

        Some(Self {
            combined_text: format!("{title}. {description}"),
            title: title.to_string(),
            description: description.to_string(),
        })
    }

    #[inline]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// `title + ". " + description`, the unit that is embedded and returned
    #[inline]
    pub fn combined_text(&self) -> &str {
        &self.combined_text
    }
}

/// The loaded table of passages, in source row order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnowledgeBase {
    passages: Vec<Passage>,
    skipped_rows: usize,
}

impl KnowledgeBase {
    /// Build from (title, description) pairs, dropping incomplete records.
    #[inline]
    pub fn from_records<I, T, D>(records: I) -> Self
    where
        I: IntoIterator<Item = (T, D)>,
        T: AsRef<str>,
        D: AsRef<str>,
    {
        let mut passages = Vec::new();
        let mut skipped_rows = 0;

        for (title, description) in records {
            match Passage::new(title.as_ref(), description.as_ref()) {
                Some(passage) => passages.push(passage),
                None => skipped_rows += 1,
            }
        }

        Self {
            passages,
            skipped_rows,
        }
    }

    #[inline]
    pub fn passages(&self) -> &[Passage] {
        &self.passages
    }

    #[inline]
    pub fn combined_texts(&self) -> Vec<String> {
        self.passages
            .iter()
            .map(|p| p.combined_text().to_string())
            .collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.passages.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Rows dropped because the title or description was missing
    #[inline]
    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }
}

/// A raw table: header row plus data rows, all cells rendered as text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Required columns that are absent from the header row
    #[inline]
    pub fn missing_columns(&self, config: &KnowledgeBaseConfig) -> Vec<String> {
        validate_columns(&self.headers, config)
    }

    /// Rows where at least one required column is empty
    #[inline]
    pub fn incomplete_rows(&self, config: &KnowledgeBaseConfig) -> usize {
        let (Some(title), Some(description)) = (
            self.column_index(&config.title_column),
            self.column_index(&config.description_column),
        ) else {
            return self.rows.len();
        };

        self.rows
            .iter()
            .filter(|row| {
                cell(row, title).trim().is_empty() || cell(row, description).trim().is_empty()
            })
            .count()
    }

    /// Turn the table into a knowledge base using the configured columns.
    #[inline]
    pub fn into_knowledge_base(self, config: &KnowledgeBaseConfig) -> Result<KnowledgeBase> {
        let missing = self.missing_columns(config);
        if !missing.is_empty() {
            return Err(AssistError::KnowledgeBase(format!(
                "missing columns {:?}; available columns: {:?}",
                missing, self.headers
            )));
        }

        let (Some(title), Some(description)) = (
            self.column_index(&config.title_column),
            self.column_index(&config.description_column),
        ) else {
            return Err(AssistError::KnowledgeBase(
                "required columns not found".to_string(),
            ));
        };

        Ok(KnowledgeBase::from_records(
            self.rows
                .iter()
                .map(|row| (cell(row, title), cell(row, description))),
        ))
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name.trim())
    }
}

fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map_or("", String::as_str)
}

/// Names of required columns missing from `headers`
#[inline]
pub fn validate_columns(headers: &[String], config: &KnowledgeBaseConfig) -> Vec<String> {
    [&config.title_column, &config.description_column]
        .into_iter()
        .filter(|required| !headers.iter().any(|h| h.trim() == required.trim()))
        .cloned()
        .collect()
}

/// Load the knowledge base named in `config`.
#[inline]
pub fn load_knowledge_base(config: &KnowledgeBaseConfig) -> Result<KnowledgeBase> {
    let table = read_table(&config.path)?;
    let row_count = table.rows.len();
    let knowledge_base = table.into_knowledge_base(config)?;

    if knowledge_base.skipped_rows() > 0 {
        warn!(
            "Dropped {} of {} rows with an empty '{}' or '{}'",
            knowledge_base.skipped_rows(),
            row_count,
            config.title_column,
            config.description_column
        );
    }

    info!(
        "Loaded {} knowledge base entries from {}",
        knowledge_base.len(),
        config.path.display()
    );
    Ok(knowledge_base)
}

/// Read the raw table at `path`, choosing the format by file extension.
#[inline]
pub fn read_table(path: &Path) -> Result<Table> {
    if !path.exists() {
        return Err(AssistError::KnowledgeBase(format!(
            "file not found: {}",
            path.display()
        )));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    debug!("Reading knowledge base table from {}", path.display());

    match extension.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_spreadsheet(path),
        "json" => {
            let content = fs::read_to_string(path)?;
            parse_json_table(&content)
        }
        other => Err(AssistError::KnowledgeBase(format!(
            "unsupported file type '{}' for {}",
            other,
            path.display()
        ))),
    }
}

fn read_spreadsheet(path: &Path) -> Result<Table> {
    let mut workbook = open_workbook_auto(path).map_err(|e| {
        AssistError::KnowledgeBase(format!("failed to open {}: {}", path.display(), e))
    })?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| AssistError::KnowledgeBase(format!("{} has no sheets", path.display())))?;

    let range = workbook.worksheet_range(&sheet_name).map_err(|e| {
        AssistError::KnowledgeBase(format!("failed to read sheet '{}': {}", sheet_name, e))
    })?;

    let mut rows = range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect::<Vec<_>>());

    let headers = rows.next().unwrap_or_default();
    let rows = rows
        .filter(|row| row.iter().any(|c| !c.trim().is_empty()))
        .collect();

    Ok(Table { headers, rows })
}

/// Parse a JSON array of objects keyed by column name. Headers are the
/// union of keys in the order they first appear in the document.
#[inline]
pub fn parse_json_table(content: &str) -> Result<Table> {
    let value: Value = serde_json::from_str(content)
        .map_err(|e| AssistError::KnowledgeBase(format!("invalid JSON: {e}")))?;

    let Value::Array(records) = value else {
        return Err(AssistError::KnowledgeBase(
            "expected a JSON array of records".to_string(),
        ));
    };

    let mut headers: Vec<String> = Vec::new();
    for record in &records {
        let Value::Object(map) = record else {
            return Err(AssistError::KnowledgeBase(
                "every record must be a JSON object".to_string(),
            ));
        };
        for key in map.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let rows = records
        .iter()
        .map(|record| {
            headers
                .iter()
                .map(|h| record.get(h).map_or_else(String::new, json_to_string))
                .collect()
        })
        .collect();

    Ok(Table { headers, rows })
}

fn json_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                format!("{:.0}", f)
            } else {
                format!("{}", f)
            }
        }
        Data::Int(i) => format!("{}", i),
        Data::Bool(b) => {
            if *b {
                "TRUE".to_string()
            } else {
                "FALSE".to_string()
            }
        }
        // Error cells count as missing, matching how blank cells are dropped.
        Data::Error(_) => String::new(),
        Data::DateTime(dt) => format!("{}", dt),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}

//! CorpusStore — read-only view of the assessment catalogue, keyed by row.
//!
//! Loaded once from the curated CSV at startup. Row identity is the 0-based
//! position of the data row in the file; the persisted vector index refers to
//! records by that position.

#![allow(dead_code)]

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::assessment::AssessmentRecord;

const REQUIRED_COLUMNS: &[&str] = &["name", "url"];
const DEFAULT_REMOTE: &str = "Yes";
const DEFAULT_ADAPTIVE: &str = "No";

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("corpus file not found at {0}")]
    NotFound(String),

    #[error("corpus is missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("corpus contains no assessments")]
    Empty,
}

/// Raw CSV row. Every optional column may be absent from the header or blank.
#[derive(Debug, Deserialize)]
struct CsvRow {
    name: String,
    url: String,
    #[serde(default)]
    remote: Option<String>,
    #[serde(default)]
    adaptive: Option<String>,
    #[serde(default)]
    test_type: Option<String>,
    #[serde(default)]
    duration: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl From<CsvRow> for AssessmentRecord {
    fn from(row: CsvRow) -> Self {
        AssessmentRecord {
            name: row.name.trim().to_string(),
            url: row.url.trim().to_string(),
            remote_support: non_blank(row.remote).unwrap_or_else(|| DEFAULT_REMOTE.to_string()),
            adaptive_support: non_blank(row.adaptive)
                .unwrap_or_else(|| DEFAULT_ADAPTIVE.to_string()),
            test_type: non_blank(row.test_type).unwrap_or_default(),
            duration: non_blank(row.duration).and_then(|d| parse_minutes(&d)),
            description: non_blank(row.description).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CorpusStore {
    records: Vec<AssessmentRecord>,
}

impl CorpusStore {
    pub fn new(records: Vec<AssessmentRecord>) -> Self {
        Self { records }
    }

    /// Loads the corpus CSV from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CorpusError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CorpusError::NotFound(path.display().to_string()));
        }

        let reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let store = Self::from_reader(reader)?;
        info!("Loaded {} assessments from {}", store.len(), path.display());
        Ok(store)
    }

    fn from_reader<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Self, CorpusError> {
        let headers = reader.headers()?.clone();
        for &column in REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h.trim() == column) {
                return Err(CorpusError::MissingColumn(column));
            }
        }

        let mut records = Vec::new();
        for row in reader.deserialize::<CsvRow>() {
            let record = AssessmentRecord::from(row?);
            if record.name.is_empty() {
                warn!("Corpus row {} has an empty name", records.len());
            }
            records.push(record);
        }

        if records.is_empty() {
            return Err(CorpusError::Empty);
        }

        Ok(Self { records })
    }

    pub fn get(&self, row: usize) -> Option<&AssessmentRecord> {
        self.records.get(row)
    }

    pub fn records(&self) -> &[AssessmentRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("nan"))
}

/// Durations arrive as `30`, `30.0` (spreadsheet export) or free text.
/// Anything that is not a non-negative number is treated as unset.
fn parse_minutes(raw: &str) -> Option<u32> {
    let value: f64 = raw.trim().parse().ok()?;
    if value.is_finite() && value >= 0.0 && value <= u32::MAX as f64 {
        Some(value.round() as u32)
    } else {
        None
    }
}

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::eid::Eid;
use crate::schema::TableId;

/// `kind` header of exported feedback documents
pub const EXPORT_KIND: &str = "tablescout.feedback";
pub const EXPORT_VERSION: u32 = 1;

/// One confirmed (query -> tables) association.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: Eid,
    /// Normalized query text, unique across records
    pub query: String,
    pub tables: Vec<TableId>,
    #[serde(default)]
    pub embedding: Vec<f32>,
    /// Fingerprint of the model that produced `embedding`
    #[serde(default)]
    pub model: String,
    pub pattern: String,
    pub timestamp: DateTime<Utc>,
    pub use_count: u32,
}

impl FeedbackRecord {
    pub fn has_embedding_for(&self, fingerprint: &str) -> bool {
        !self.embedding.is_empty() && self.model == fingerprint
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchSource {
    Exact,
    Pattern,
    Semantic,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FeedbackMatch {
    pub query: String,
    pub similarity: f32,
    pub source: MatchSource,
    pub tables: Vec<TableId>,
    pub timestamp: DateTime<Utc>,
    pub use_count: u32,
}

impl FeedbackMatch {
    pub(crate) fn from_record(record: &FeedbackRecord, similarity: f32, source: MatchSource) -> Self {
        Self {
            query: record.query.clone(),
            similarity,
            source,
            tables: record.tables.clone(),
            timestamp: record.timestamp,
            use_count: record.use_count,
        }
    }
}

/// Self-describing export document, one per record.
#[derive(Clone, Debug, Serialize)]
pub struct ExportDocument<'a> {
    pub kind: &'static str,
    pub version: u32,
    pub query: &'a str,
    pub tables: &'a [TableId],
    pub timestamp: DateTime<Utc>,
    pub use_count: u32,
    pub pattern: &'a str,
    pub model: &'a str,
    pub embedding: &'a [f32],
}

impl<'a> From<&'a FeedbackRecord> for ExportDocument<'a> {
    fn from(record: &'a FeedbackRecord) -> Self {
        Self {
            kind: EXPORT_KIND,
            version: EXPORT_VERSION,
            query: &record.query,
            tables: &record.tables,
            timestamp: record.timestamp,
            use_count: record.use_count,
            pattern: &record.pattern,
            model: &record.model,
            embedding: &record.embedding,
        }
    }
}

/// Import side of [`ExportDocument`]; every field optional so incomplete
/// documents can be reported instead of failing the whole import.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ImportDocument {
    pub kind: Option<String>,
    pub query: Option<String>,
    pub tables: Option<Vec<String>>,
    pub timestamp: Option<DateTime<Utc>>,
    pub use_count: Option<u32>,
    pub model: Option<String>,
    pub embedding: Option<Vec<f32>>,
}

impl ImportDocument {
    /// Names of required fields that are absent or empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.query.as_deref().map_or(true, |q| q.trim().is_empty()) {
            missing.push("query");
        }
        if self.tables.as_ref().map_or(true, |t| t.is_empty()) {
            missing.push("tables");
        }
        if self.timestamp.is_none() {
            missing.push("timestamp");
        }
        missing
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImportReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// (document, reason)
    pub skipped: Vec<(PathBuf, String)>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreOutcome {
    Created,
    Updated,
}

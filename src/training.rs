//! Training data: a CSV with one row per table describing what it holds.
//!
//! The same file backs the last-resort fallback stage of the resolver and
//! the offline ingestion job that seeds the learned stores.

use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};

use crate::feedback::{FeedbackError, FeedbackStore};
use crate::learned::{PatternStore, SynonymHit, SynonymStore};
use crate::schema::{SchemaView, TableId};
use crate::semantic::normalize_query;
use crate::storage::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum TrainingError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("training csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Feedback(#[from] FeedbackError),
}

impl TrainingError {
    pub fn is_busy(&self) -> bool {
        match self {
            TrainingError::Store(e) => e.is_busy(),
            TrainingError::Feedback(e) => e.is_busy(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingRow {
    #[serde(rename = "DB_Config", default)]
    pub db_config: String,
    #[serde(rename = "Schema", default)]
    pub schema: String,
    #[serde(rename = "Table_Name", default)]
    pub table_name: String,
    #[serde(rename = "Primary_Keys", default)]
    pub primary_keys: String,
    #[serde(rename = "Foreign_Keys", default)]
    pub foreign_keys: String,
    #[serde(rename = "Associated_Tables", default)]
    pub associated_tables: String,
    #[serde(rename = "Associated_Views", default)]
    pub associated_views: String,
    #[serde(rename = "Description", default)]
    pub description: String,
    #[serde(rename = "Columns_List", default)]
    pub columns_list: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRecord {
    /// Description as written
    pub text: String,
    /// Normalized description, used for matching
    pub description: String,
    /// The row's table first, then resolvable associated tables
    pub tables: Vec<TableId>,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    records: Vec<TrainingRecord>,
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

impl TrainingSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load(path: &Path, schema: &SchemaView) -> Result<Self, TrainingError> {
        let mut reader = csv::Reader::from_path(path)?;
        let rows = reader
            .deserialize::<TrainingRow>()
            .collect::<Result<Vec<_>, _>>()?;

        let set = Self::from_rows(rows, schema);
        log::info!("loaded {} training records from {}", set.len(), path.display());
        Ok(set)
    }

    /// Rows without a description or with a table the schema lacks are
    /// dropped.
    pub fn from_rows(rows: Vec<TrainingRow>, schema: &SchemaView) -> Self {
        let mut records = Vec::with_capacity(rows.len());

        for row in rows {
            let description = normalize_query(&row.description);
            if description.is_empty() {
                continue;
            }

            let Some(table) = schema.resolve(&format!("{}.{}", row.schema.trim(), row.table_name.trim()))
            else {
                log::warn!(
                    "training row for unknown table {}.{} skipped",
                    row.schema,
                    row.table_name
                );
                continue;
            };

            let associated = split_list(&row.associated_tables).filter_map(|name| {
                let qualified = if name.contains('.') {
                    name.to_string()
                } else {
                    format!("{}.{name}", row.schema.trim())
                };
                schema.resolve(&qualified).cloned()
            });
            let tables = schema.filter_known(std::iter::once(table.clone()).chain(associated));

            records.push(TrainingRecord {
                text: row.description.trim().to_string(),
                description,
                tables,
                columns: split_list(&row.columns_list).map(str::to_string).collect(),
            });
        }

        Self { records }
    }

    /// First record whose description contains the normalized query.
    pub fn find(&self, query: &str) -> Option<&TrainingRecord> {
        let query = normalize_query(query);
        if query.is_empty() {
            return None;
        }
        self.records.iter().find(|r| r.description.contains(&query))
    }

    pub fn records(&self) -> &[TrainingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Write a CSV with one pre-filled row per table, descriptions left blank.
pub fn write_template(path: &Path, schema: &SchemaView, db_name: &str) -> Result<usize, TrainingError> {
    let mut writer = csv::Writer::from_path(path)?;

    for table in schema.tables() {
        let join = |pick: fn(&crate::schema::Column) -> bool| {
            table
                .columns
                .iter()
                .filter(|c| pick(c))
                .map(|c| c.name.clone())
                .collect::<Vec<_>>()
                .join(",")
        };

        let table_name = table.id.to_string();
        let associated: Vec<String> = schema
            .relationships()
            .iter()
            .filter_map(|rel| {
                if rel.from_table.eq_ignore_ascii_case(&table_name) {
                    Some(rel.to_table.clone())
                } else if rel.to_table.eq_ignore_ascii_case(&table_name) {
                    Some(rel.from_table.clone())
                } else {
                    None
                }
            })
            .collect();

        writer.serialize(TrainingRow {
            db_config: db_name.to_string(),
            schema: table.id.schema().to_string(),
            table_name: table.id.table().to_string(),
            primary_keys: join(|c| c.is_primary_key),
            foreign_keys: join(|c| c.is_foreign_key),
            associated_tables: associated.join(","),
            associated_views: String::new(),
            description: String::new(),
            columns_list: join(|_| true),
        })?;
    }

    writer.flush()?;
    Ok(schema.len())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    pub records: usize,
    pub patterns: usize,
    pub synonyms: usize,
    pub feedback: usize,
    pub skipped: usize,
}

/// Seed the learned stores from a training set through their normal write
/// paths: descriptions become literal patterns and feedback records, column
/// names become default synonyms of their table.
pub fn ingest(
    set: &TrainingSet,
    schema: &SchemaView,
    feedback: &FeedbackStore,
    patterns: &PatternStore,
    synonyms: &SynonymStore,
    show_progress: bool,
) -> Result<IngestReport, TrainingError> {
    let mut report = IngestReport {
        records: set.len(),
        ..IngestReport::default()
    };

    let progress = if show_progress {
        ProgressBar::new(set.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    progress.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut pattern_entries = Vec::new();
    let mut synonym_entries = Vec::new();

    for record in set.records() {
        progress.set_message(record.tables.first().map(|t| t.to_string()).unwrap_or_default());

        for table in &record.tables {
            pattern_entries.push((record.description.clone(), table.clone(), 1.0));
        }
        if let Some(owner) = record.tables.first() {
            for column in &record.columns {
                synonym_entries.push(SynonymHit {
                    token: column.to_lowercase(),
                    table: owner.clone(),
                    weight: 1.0,
                });
            }
        }

        let names: Vec<String> = record.tables.iter().map(|t| t.to_string()).collect();
        match feedback.store(&record.text, &names, schema) {
            Ok(_) => report.feedback += 1,
            Err(e) if e.is_busy() => return Err(e.into()),
            Err(e) => {
                log::warn!("training record '{}' not stored: {e}", record.text);
                report.skipped += 1;
            }
        }

        progress.inc(1);
    }

    patterns.set_weights(&pattern_entries)?;
    synonyms.add_defaults(&synonym_entries)?;
    report.patterns = pattern_entries.len();
    report.synonyms = synonym_entries.len();

    progress.finish_and_clear();
    log::info!(
        "ingested {} training records: {} patterns, {} synonyms, {} feedback",
        report.records,
        report.patterns,
        report.synonyms,
        report.feedback
    );

    Ok(report)
}

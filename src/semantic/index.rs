//! Per-table embedding cache and cosine similarity.
//!
//! Holds one identity vector and one vector per column for every table of a
//! schema view, in enumeration order. Built once per schema and reused by
//! semantic scoring and synonym learning.

use crate::schema::{SchemaView, TableId};

use super::embeddings::{Embedder, EmbeddingError};
use super::preprocess::{column_text, identity_text};

/// Compute L2 norm of a vector.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity; 0.0 for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let a_norm = l2_norm(a);
    let b_norm = l2_norm(b);
    if a_norm < f32::EPSILON || b_norm < f32::EPSILON {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    dot_product / (a_norm * b_norm)
}

#[derive(Debug, Clone)]
pub struct TableVectors {
    pub id: TableId,
    pub identity: Vec<f32>,
    /// (column name, vector)
    pub columns: Vec<(String, Vec<f32>)>,
}

impl TableVectors {
    /// Best similarity of `query` against any column of this table.
    pub fn best_column_similarity(&self, query: &[f32]) -> f32 {
        self.columns
            .iter()
            .map(|(_, v)| cosine_similarity(query, v))
            .fold(0.0, f32::max)
    }
}

pub struct TableIndex {
    tables: Vec<TableVectors>,
}

impl TableIndex {
    /// Embed every table identity and column with one batch call.
    pub fn build(schema: &SchemaView, embedder: &dyn Embedder) -> Result<Self, EmbeddingError> {
        let mut texts = Vec::new();
        for table in schema.tables() {
            texts.push(identity_text(table));
            texts.extend(table.columns.iter().map(|c| column_text(&c.name)));
        }

        let vectors = embedder.embed_batch(&texts)?;
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::EmbeddingFailed(format!(
                "expected {} vectors, got {}",
                texts.len(),
                vectors.len()
            )));
        }

        let mut vectors = vectors.into_iter();
        let mut tables = Vec::with_capacity(schema.len());
        for table in schema.tables() {
            let identity = vectors.next().unwrap_or_default();
            let columns = table
                .columns
                .iter()
                .map(|c| (c.name.clone(), vectors.next().unwrap_or_default()))
                .collect();
            tables.push(TableVectors {
                id: table.id.clone(),
                identity,
                columns,
            });
        }

        log::debug!("built table index: {} tables, {} texts", tables.len(), texts.len());

        Ok(Self { tables })
    }

    /// Tables in schema enumeration order.
    pub fn tables(&self) -> &[TableVectors] {
        &self.tables
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

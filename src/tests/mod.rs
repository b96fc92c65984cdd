//! Crate-level tests and shared fixtures.

mod session;
mod training;

use std::path::Path;
use std::time::Duration;

use crate::linguistic::{Analysis, AnalysisError, Analyzer};
use crate::lock::StoreLock;
use crate::schema::SchemaView;
use crate::semantic::{Embedder, EmbeddingError};

pub const SALES_SCHEMA: &str = r#"{
    "tables": {"sales": ["orders", "customers"]},
    "columns": {"sales": {
        "orders": {
            "order_id": {"type": "integer", "nullable": false, "is_primary_key": true},
            "order_date": {"type": "date", "nullable": false},
            "customer_id": {"type": "integer", "is_foreign_key": true}
        },
        "customers": {
            "customer_id": {"type": "integer", "nullable": false, "is_primary_key": true},
            "city": {"type": "varchar(64)"}
        }
    }},
    "relationships": [
        {"from_table": "sales.orders", "from_column": "customer_id",
         "to_table": "sales.customers", "to_column": "customer_id"}
    ]
}"#;

/// `sales.orders(order_id, order_date, customer_id)`, `sales.customers(customer_id, city)`
pub fn sales_schema() -> SchemaView {
    SchemaView::from_json_str(SALES_SCHEMA).expect("fixture schema is valid")
}

/// Short lock wait so contention tests finish quickly.
pub fn test_locks(dir: &Path) -> StoreLock {
    StoreLock::new(dir, Duration::from_millis(200))
}

pub struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn model_id(&self) -> &str {
        "failing"
    }

    fn dimensions(&self) -> usize {
        8
    }

    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::EmbeddingFailed("embedding service offline".to_string()))
    }
}

pub struct FailingAnalyzer;

impl Analyzer for FailingAnalyzer {
    fn analyze(&self, _text: &str) -> Result<Analysis, AnalysisError> {
        Err(AnalysisError::Failed("tagger unavailable".to_string()))
    }
}

const CONCEPTS: &[&[&str]] = &[
    &["customer", "buyer", "client"],
    &["city", "town"],
    &["order", "purchase"],
    &["date", "day", "when"],
];

/// Embeds text onto a handful of concept axes so similarity between
/// synonyms is exact and predictable. Words outside every concept are
/// ignored.
pub struct ConceptEmbedder;

impl Embedder for ConceptEmbedder {
    fn model_id(&self) -> &str {
        "concepts"
    }

    fn dimensions(&self) -> usize {
        CONCEPTS.len()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vector = vec![0.0; CONCEPTS.len()];
        for word in text.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
            for (axis, words) in CONCEPTS.iter().enumerate() {
                if words.iter().any(|w| word.starts_with(w)) {
                    vector[axis] = 1.0;
                }
            }
        }
        Ok(vector)
    }
}

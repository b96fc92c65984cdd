//! Text similarity infrastructure for table identification.
//!
//! # Architecture
//!
//! - `embeddings`: the embedding port, fastembed and hashing implementations
//! - `index`: per-table embedding cache and cosine similarity
//! - `lexical`: keyword matching of queries against schema names
//! - `preprocess`: query normalization and embedding input text

pub mod embeddings;
pub mod index;
pub mod lexical;
pub mod preprocess;

#[cfg(feature = "fastembed")]
pub use embeddings::FastEmbedder;
pub use embeddings::{Embedder, EmbeddingError, HashingEmbedder};
pub use index::{cosine_similarity, TableIndex};
pub use preprocess::{normalize_query, validate_query, QueryError};

/// Default embedding model name
pub const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";

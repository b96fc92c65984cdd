//! Learned state the resolver consults besides feedback history.
//!
//! - `patterns`: curated literal query weights and keyword matching
//! - `synonyms`: token -> table pairings learned from column similarity
//! - `weights`: per-table adaptive scoring weights

pub mod patterns;
pub mod synonyms;
pub mod weights;

pub use patterns::PatternStore;
pub use synonyms::{SynonymHit, SynonymStore};
pub use weights::{TableWeights, WeightBounds};

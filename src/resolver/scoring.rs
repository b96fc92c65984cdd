//! Semantic scoring of tables against a query.

use std::cmp::Ordering;

use crate::learned::{PatternStore, SynonymHit, TableWeights};
use crate::schema::TableId;
use crate::semantic::{cosine_similarity, lexical, TableIndex};

use super::StageResult;

/// Multiplier on a token's peak column similarity
pub const SYNONYM_FACTOR: f32 = 0.8;
/// Bonus when the table name appears verbatim in the query
pub const NAME_BONUS: f32 = 0.5;

pub(crate) struct ScoringInput<'a> {
    pub query: &'a str,
    pub query_vector: &'a [f32],
    pub index: &'a TableIndex,
    pub weights: &'a TableWeights,
    pub synonyms: &'a [SynonymHit],
    pub patterns: &'a PatternStore,
}

/// Score every table, in schema enumeration order.
///
/// `max(identity similarity, best column similarity) * table weight`, plus
/// synonym peaks, the curated pattern weight and the name bonus.
pub(crate) fn score_tables(input: &ScoringInput<'_>) -> Vec<(TableId, f32)> {
    input
        .index
        .tables()
        .iter()
        .map(|table| {
            let identity = cosine_similarity(input.query_vector, &table.identity);
            let column = table.best_column_similarity(input.query_vector);
            let base = identity.max(column).max(0.0);

            let mut score = base * input.weights.get(&table.id);

            score += input
                .synonyms
                .iter()
                .filter(|hit| hit.table.key() == table.id.key())
                .map(|hit| hit.weight * SYNONYM_FACTOR)
                .sum::<f32>();

            score += input.patterns.weight(input.query, &table.id);

            if lexical::mentions(input.query, table.id.table()) {
                score += NAME_BONUS;
            }

            log::trace!("score {} = {score:.4} (base {base:.4})", table.id);
            (table.id.clone(), score)
        })
        .collect()
}

/// Keep positive scores, rank them and accept if the best reaches
/// `threshold` (inclusive).
///
/// The sort is stable, so equal scores keep the order they came in.
pub fn rank_scores(scores: Vec<(TableId, f32)>, top_k: usize, threshold: f32) -> StageResult {
    let mut retained: Vec<(TableId, f32)> = scores.into_iter().filter(|(_, s)| *s > 0.0).collect();
    retained.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    retained.truncate(top_k);

    match retained.first() {
        Some((_, top)) if *top >= threshold => StageResult::Hit {
            confidence: top.clamp(0.0, 1.0),
            tables: retained.into_iter().map(|(id, _)| id).collect(),
        },
        _ => StageResult::Miss,
    }
}

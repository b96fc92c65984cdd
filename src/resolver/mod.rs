//! Table identification pipeline.
//!
//! Stages run in a fixed order and the first hit wins:
//!
//! 1. feedback replay (0.9)
//! 2. pattern and entity match (0.8)
//! 3. semantic scoring (top score)
//! 4. keyword containment (0.7)
//! 5. training descriptions (0.6)
//!
//! A stage that fails on a capability (embedding, analysis, corrupt data) is
//! logged and treated as a miss. Only lock timeouts surface, as
//! [`ResolveError::Busy`], so the caller can retry.

mod scoring;

use std::fmt::Display;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::feedback::FeedbackStore;
use crate::learned::{PatternStore, SynonymStore, TableWeights};
use crate::linguistic::{Analysis, Analyzer};
use crate::schema::{SchemaView, TableId};
use crate::semantic::{lexical, normalize_query, Embedder, EmbeddingError, TableIndex};
use crate::training::TrainingSet;

pub use scoring::{rank_scores, NAME_BONUS, SYNONYM_FACTOR};

pub const FEEDBACK_CONFIDENCE: f32 = 0.9;
pub const PATTERN_CONFIDENCE: f32 = 0.8;
pub const KEYWORD_CONFIDENCE: f32 = 0.7;
pub const TRAINING_CONFIDENCE: f32 = 0.6;

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("learned state is busy: {0}")]
    Busy(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Feedback,
    Pattern,
    Semantic,
    Keyword,
    Training,
    Unresolved,
}

impl Stage {
    const PIPELINE: [Stage; 5] = [
        Stage::Feedback,
        Stage::Pattern,
        Stage::Semantic,
        Stage::Keyword,
        Stage::Training,
    ];
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Feedback => "feedback",
            Stage::Pattern => "pattern",
            Stage::Semantic => "semantic",
            Stage::Keyword => "keyword",
            Stage::Training => "training",
            Stage::Unresolved => "unresolved",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum StageResult {
    Hit { tables: Vec<TableId>, confidence: f32 },
    Miss,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Resolution {
    pub tables: Vec<TableId>,
    pub confidence: f32,
    pub stage: Stage,
}

impl Resolution {
    pub fn unresolved() -> Self {
        Self {
            tables: vec![],
            confidence: 0.0,
            stage: Stage::Unresolved,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolverSettings {
    /// Minimum similarity for feedback replay
    pub feedback_threshold: f32,
    /// Minimum top score for semantic scoring to answer
    pub semantic_threshold: f32,
    pub top_k: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            feedback_threshold: 0.8,
            semantic_threshold: 0.5,
            top_k: 5,
        }
    }
}

/// Stores the resolver reads from.
#[derive(Clone)]
pub struct LearnedStores {
    pub feedback: Arc<FeedbackStore>,
    pub patterns: Arc<PatternStore>,
    pub synonyms: Arc<SynonymStore>,
    pub training: Arc<TrainingSet>,
}

pub struct Resolver {
    schema: Arc<SchemaView>,
    embedder: Arc<dyn Embedder>,
    analyzer: Arc<dyn Analyzer>,
    stores: LearnedStores,
    settings: ResolverSettings,
    /// Built on first semantic scoring
    index: Mutex<Option<Arc<TableIndex>>>,
}

impl Resolver {
    pub fn new(
        schema: Arc<SchemaView>,
        embedder: Arc<dyn Embedder>,
        analyzer: Arc<dyn Analyzer>,
        stores: LearnedStores,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            schema,
            embedder,
            analyzer,
            stores,
            settings,
            index: Mutex::new(None),
        }
    }

    pub fn schema(&self) -> &Arc<SchemaView> {
        &self.schema
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    /// Ranked tables for `query` with a confidence in [0, 1].
    pub fn identify(&self, query: &str, weights: &TableWeights) -> Result<Resolution, ResolveError> {
        let span = tracing::info_span!("identify", query = %query);
        let _enter = span.enter();

        let normalized = normalize_query(query);
        if normalized.is_empty() {
            return Ok(Resolution::unresolved());
        }

        let analysis = self.analyze(query);

        for stage in Stage::PIPELINE {
            let result = match stage {
                Stage::Feedback => self.feedback_stage(&normalized)?,
                Stage::Pattern => self.pattern_stage(&normalized, analysis.as_ref()),
                Stage::Semantic => self.semantic_stage(&normalized, analysis.as_ref(), weights)?,
                Stage::Keyword => self.keyword_stage(&normalized),
                Stage::Training => self.training_stage(&normalized),
                Stage::Unresolved => break,
            };

            if let StageResult::Hit { tables, confidence } = result {
                let tables = self.schema.filter_known(tables);
                if tables.is_empty() {
                    log::debug!("{stage} stage hit only unknown tables");
                    continue;
                }

                log::info!(
                    "'{normalized}' resolved by {stage} stage ({confidence:.2}): {}",
                    tables.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(", ")
                );
                return Ok(Resolution {
                    tables,
                    confidence,
                    stage,
                });
            }

            log::debug!("{stage} stage missed");
        }

        log::info!("'{normalized}' could not be resolved");
        Ok(Resolution::unresolved())
    }

    /// Reinforce the confirmed tables and decay the rest.
    pub fn update_weights_from_feedback(
        &self,
        weights: &TableWeights,
        query: &str,
        confirmed: &[TableId],
    ) -> TableWeights {
        let confirmed = self.schema.filter_known(confirmed.iter().cloned());
        log::debug!("updating weights for '{query}' with {} confirmed tables", confirmed.len());
        weights.reinforced(&confirmed).decayed(&confirmed)
    }

    fn analyze(&self, query: &str) -> Option<Analysis> {
        match self.analyzer.analyze(query) {
            Ok(analysis) => Some(analysis),
            Err(e) => {
                log::warn!("linguistic analysis failed: {e}");
                None
            }
        }
    }

    fn feedback_stage(&self, query: &str) -> Result<StageResult, ResolveError> {
        match self
            .stores
            .feedback
            .find_similar(query, self.settings.feedback_threshold)
        {
            Ok(Some(matches)) => Ok(matches
                .into_iter()
                .next()
                .map(|best| {
                    log::debug!(
                        "feedback {:?} match '{}' ({:.3})",
                        best.source,
                        best.query,
                        best.similarity
                    );
                    StageResult::Hit {
                        tables: best.tables,
                        confidence: FEEDBACK_CONFIDENCE,
                    }
                })
                .unwrap_or(StageResult::Miss)),
            Ok(None) => Ok(StageResult::Miss),
            Err(e) if e.is_busy() => Err(ResolveError::Busy(e.to_string())),
            Err(e) => {
                log::warn!("feedback replay skipped: {e}");
                Ok(StageResult::Miss)
            }
        }
    }

    fn pattern_stage(&self, query: &str, analysis: Option<&Analysis>) -> StageResult {
        let Some(analysis) = analysis else {
            return StageResult::Miss;
        };

        let tables = self
            .stores
            .patterns
            .match_query(query, analysis, &self.schema);
        if tables.is_empty() {
            StageResult::Miss
        } else {
            StageResult::Hit {
                tables,
                confidence: PATTERN_CONFIDENCE,
            }
        }
    }

    fn semantic_stage(
        &self,
        query: &str,
        analysis: Option<&Analysis>,
        weights: &TableWeights,
    ) -> Result<StageResult, ResolveError> {
        Ok(match self.semantic_scores(query, analysis, weights)? {
            Some(scores) => rank_scores(scores, self.settings.top_k, self.settings.semantic_threshold),
            None => StageResult::Miss,
        })
    }

    /// Raw per-table scores, `None` when the embedding port is unavailable.
    pub(crate) fn semantic_scores(
        &self,
        query: &str,
        analysis: Option<&Analysis>,
        weights: &TableWeights,
    ) -> Result<Option<Vec<(TableId, f32)>>, ResolveError> {
        let index = match self.table_index() {
            Ok(index) if !index.is_empty() => index,
            Ok(_) => return Ok(None),
            Err(e) => {
                log::warn!("semantic scoring skipped, table index unavailable: {e}");
                return Ok(None);
            }
        };

        let query_vector = match self.embedder.embed(query) {
            Ok(vector) => vector,
            Err(e) => {
                log::warn!("semantic scoring skipped: {e}");
                return Ok(None);
            }
        };

        let mut tokens = lexical::tokenize(query);
        if let Some(analysis) = analysis {
            for lemma in analysis.content_lemmas() {
                if !tokens.contains(&lemma) {
                    tokens.push(lemma);
                }
            }
        }

        let synonyms = match self
            .stores
            .synonyms
            .match_tokens(&tokens, self.embedder.as_ref(), &index)
        {
            Ok(hits) => hits,
            Err(e) if e.is_busy() => return Err(ResolveError::Busy(e.to_string())),
            Err(e) => {
                log::warn!("synonym matching skipped: {e}");
                vec![]
            }
        };

        Ok(Some(scoring::score_tables(&scoring::ScoringInput {
            query,
            query_vector: &query_vector,
            index: &index,
            weights,
            synonyms: &synonyms,
            patterns: &self.stores.patterns,
        })))
    }

    fn keyword_stage(&self, query: &str) -> StageResult {
        let tables = lexical::mentioned_tables(query, &self.schema);
        if tables.is_empty() {
            StageResult::Miss
        } else {
            StageResult::Hit {
                tables,
                confidence: KEYWORD_CONFIDENCE,
            }
        }
    }

    fn training_stage(&self, query: &str) -> StageResult {
        match self.stores.training.find(query) {
            Some(record) => StageResult::Hit {
                tables: record.tables.clone(),
                confidence: TRAINING_CONFIDENCE,
            },
            None => StageResult::Miss,
        }
    }

    fn table_index(&self) -> Result<Arc<TableIndex>, EmbeddingError> {
        let mut slot = self.index.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(index) = slot.as_ref() {
            return Ok(index.clone());
        }

        let started = std::time::Instant::now();
        let index = Arc::new(TableIndex::build(&self.schema, self.embedder.as_ref())?);
        log::debug!("table index ready in {:?}", started.elapsed());

        *slot = Some(index.clone());
        Ok(index)
    }
}

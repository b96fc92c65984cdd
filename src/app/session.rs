//! Operator-facing entry point for one database.
//!
//! A [`Session`] owns the learned stores, the current [`TableWeights`] and a
//! short history of recent queries. Lock timeouts are retried a bounded
//! number of times; `identify` then hands back a manual-fallback signal
//! instead of an error.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::errors::{AppError, Retryable};
use crate::app::factory::AppPaths;
use crate::config::Config;
use crate::feedback::{FeedbackStore, ImportReport, StoreOutcome};
use crate::learned::{PatternStore, SynonymStore, TableWeights};
use crate::linguistic::Analyzer;
use crate::lock::StoreLock;
use crate::resolver::{LearnedStores, Resolution, ResolveError, Resolver};
use crate::schema::{SchemaView, TableId};
use crate::storage::{self, StoreError};
use crate::semantic::{validate_query, Embedder};
use crate::training::{self, IngestReport, TrainingSet};

const RETRY_BACKOFF: Duration = Duration::from_millis(50);
const HISTORY_STORE: &str = "history";

#[derive(Clone, Debug, PartialEq)]
pub enum Suggestion {
    Suggested(Resolution),
    /// Learned state stayed locked; every table is offered for manual
    /// selection.
    ManualFallback { attempts: u32, tables: Vec<TableId> },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub query: String,
    pub tables: Vec<TableId>,
    pub confirmed: bool,
}

/// Run `op` until it succeeds, fails with something other than a lock
/// timeout, or `attempts` are used up.
fn retry<T, E>(attempts: u32, what: &str, mut op: impl FnMut() -> Result<T, E>) -> Result<T, AppError>
where
    E: Retryable + Into<AppError>,
{
    let attempts = attempts.max(1);
    for attempt in 1..=attempts {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_busy() => {
                log::warn!("{what}: attempt {attempt}/{attempts} hit a busy store");
                if attempt < attempts {
                    std::thread::sleep(RETRY_BACKOFF * attempt);
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(AppError::Busy { attempts })
}

pub struct Session {
    paths: AppPaths,
    config: Config,
    embedder: Arc<dyn Embedder>,
    analyzer: Arc<dyn Analyzer>,
    locks: StoreLock,
    stores: LearnedStores,
    resolver: Resolver,
    weights: TableWeights,
    history: VecDeque<HistoryEntry>,
}

impl Session {
    pub fn open(
        paths: AppPaths,
        config: Config,
        embedder: Arc<dyn Embedder>,
        analyzer: Arc<dyn Analyzer>,
    ) -> Result<Self, AppError> {
        let locks = StoreLock::new(&paths.db_path, config.locking.timeout());
        let schema = Arc::new(load_schema(&paths)?);
        let training = Arc::new(load_training(&paths, &schema));

        let feedback = retry(config.locking.retries, "open feedback store", || {
            FeedbackStore::open(&paths.feedback_dir(), locks.clone(), embedder.clone(), analyzer.clone())
        })?;

        let stores = LearnedStores {
            feedback: Arc::new(feedback),
            patterns: Arc::new(PatternStore::open(&paths.db_path, locks.clone())),
            synonyms: Arc::new(SynonymStore::open(
                &paths.db_path,
                locks.clone(),
                config.synonyms.match_threshold,
            )),
            training,
        };

        let weights = TableWeights::load(&paths.weights_file(), &schema, config.weight_bounds());
        let mut history: VecDeque<HistoryEntry> = storage::read_yaml_or_default(&paths.history_file());
        while history.len() > config.history_size {
            history.pop_front();
        }
        let resolver = Resolver::new(
            schema,
            embedder.clone(),
            analyzer.clone(),
            stores.clone(),
            config.resolver_settings(),
        );

        log::info!(
            "opened database '{}' ({} tables, {} feedback records)",
            paths.db_name,
            resolver.schema().len(),
            stores.feedback.len()
        );

        Ok(Self {
            paths,
            config,
            embedder,
            analyzer,
            locks,
            stores,
            resolver,
            weights,
            history,
        })
    }

    pub fn schema(&self) -> &Arc<SchemaView> {
        self.resolver.schema()
    }

    pub fn weights(&self) -> &TableWeights {
        &self.weights
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    pub fn history(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.history.iter()
    }

    pub fn identify(&mut self, query: &str) -> Result<Suggestion, AppError> {
        let normalized = validate_query(query)?;
        let attempts = self.config.locking.retries.max(1);

        for attempt in 1..=attempts {
            match self.resolver.identify(&normalized, &self.weights) {
                Ok(resolution) => {
                    self.remember(&normalized, resolution.tables.clone(), false);
                    return Ok(Suggestion::Suggested(resolution));
                }
                Err(ResolveError::Busy(store)) => {
                    log::warn!("identify: attempt {attempt}/{attempts}, {store} is busy");
                    if attempt < attempts {
                        std::thread::sleep(RETRY_BACKOFF * attempt);
                    }
                }
            }
        }

        log::warn!("identify gave up after {attempts} attempts, falling back to manual selection");
        Ok(Suggestion::ManualFallback {
            attempts,
            tables: self.schema().tables().iter().map(|t| t.id.clone()).collect(),
        })
    }

    /// Accept `tables` as the answer to `query`.
    pub fn confirm<S: AsRef<str>>(&mut self, query: &str, tables: &[S]) -> Result<StoreOutcome, AppError> {
        self.record_feedback(query, tables)
    }

    /// Replace a wrong suggestion for `query` with `tables`.
    pub fn correct<S: AsRef<str>>(&mut self, query: &str, tables: &[S]) -> Result<StoreOutcome, AppError> {
        log::info!("correcting '{query}'");
        self.record_feedback(query, tables)
    }

    fn record_feedback<S: AsRef<str>>(&mut self, query: &str, tables: &[S]) -> Result<StoreOutcome, AppError> {
        let normalized = validate_query(query)?;
        let confirmed = self.schema().resolve_all(tables)?;
        let retries = self.config.locking.retries;

        let outcome = retry(retries, "store feedback", || {
            self.stores.feedback.store(&normalized, tables, self.resolver.schema())
        })?;

        self.weights = self
            .resolver
            .update_weights_from_feedback(&self.weights, &normalized, &confirmed);
        let weights_file = self.paths.weights_file();
        retry(retries, "checkpoint weights", || self.weights.save(&weights_file, &self.locks))?;

        self.remember(&normalized, confirmed, true);
        Ok(outcome)
    }

    /// Append to the recent-query history shared by every run against this
    /// database. History is best effort: a busy or failing write is logged.
    fn remember(&mut self, query: &str, tables: Vec<TableId>, confirmed: bool) {
        let limit = self.config.history_size;
        if limit == 0 {
            return;
        }
        let entry = HistoryEntry {
            query: query.to_string(),
            tables,
            confirmed,
        };

        let path = self.paths.history_file();
        let written = self.locks.with_lock(HISTORY_STORE, || -> Result<VecDeque<HistoryEntry>, StoreError> {
            let mut history: VecDeque<HistoryEntry> = storage::read_yaml_or_default(&path);
            history.push_back(entry.clone());
            while history.len() > limit {
                history.pop_front();
            }
            storage::write_yaml(&path, &history)?;
            Ok(history)
        });

        match written {
            Ok(history) => self.history = history,
            Err(e) => {
                log::warn!("recent-query history not saved: {e}");
                self.history.push_back(entry);
                while self.history.len() > limit {
                    self.history.pop_front();
                }
            }
        }
    }

    pub fn top_queries(&self, n: usize) -> Result<Vec<(String, u32)>, AppError> {
        retry(self.config.locking.retries, "top queries", || {
            self.stores.feedback.top_queries(n)
        })
    }

    pub fn export_feedback(&self, dir: &Path) -> Result<usize, AppError> {
        retry(self.config.locking.retries, "export feedback", || {
            self.stores.feedback.export(dir)
        })
    }

    pub fn import_feedback(&self, dir: &Path) -> Result<ImportReport, AppError> {
        retry(self.config.locking.retries, "import feedback", || {
            self.stores.feedback.import(dir, Some(self.resolver.schema()))
        })
    }

    pub fn clear_feedback(&self) -> Result<usize, AppError> {
        retry(self.config.locking.retries, "clear feedback", || {
            self.stores.feedback.clear()
        })
    }

    pub fn promote_synonyms(&self) -> Result<usize, AppError> {
        retry(self.config.locking.retries, "promote synonyms", || {
            self.stores.synonyms.promote()
        })
    }

    /// Entry counts of the dynamic and default synonym layers.
    pub fn synonym_layers(&self) -> (usize, usize) {
        (self.stores.synonyms.dynamic_len(), self.stores.synonyms.default_len())
    }

    /// Re-read `schema.json` and the training file, rebuilding the table
    /// weights (from the last checkpoint) and the table-embedding cache.
    /// Pattern and synonym maps are refreshed from disk.
    pub fn reload_schema(&mut self) -> Result<usize, AppError> {
        let retries = self.config.locking.retries;
        retry(retries, "refresh patterns", || self.stores.patterns.save())?;
        retry(retries, "refresh synonyms", || self.stores.synonyms.save())?;

        let schema = Arc::new(load_schema(&self.paths)?);
        self.stores.training = Arc::new(load_training(&self.paths, &schema));
        self.weights = TableWeights::load(&self.paths.weights_file(), &schema, self.config.weight_bounds());
        self.rebuild_resolver(schema);

        log::info!("schema reloaded: {} tables", self.schema().len());
        Ok(self.schema().len())
    }

    /// Ingest a training CSV into the learned stores and keep it as the
    /// training fallback of this database.
    pub fn train(&mut self, csv_path: &Path, show_progress: bool) -> Result<IngestReport, AppError> {
        let set = TrainingSet::load(csv_path, self.schema())?;

        let target = self.paths.training_file();
        let same_file = match (csv_path.canonicalize(), target.canonicalize()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        };
        if !same_file {
            std::fs::copy(csv_path, &target)?;
        }

        let report = training::ingest(
            &set,
            self.resolver.schema(),
            &self.stores.feedback,
            &self.stores.patterns,
            &self.stores.synonyms,
            show_progress,
        )?;

        self.stores.training = Arc::new(set);
        let schema = self.schema().clone();
        self.rebuild_resolver(schema);
        Ok(report)
    }

    pub fn write_template(&self, path: &Path) -> Result<usize, AppError> {
        Ok(training::write_template(path, self.schema(), &self.paths.db_name)?)
    }

    /// Checkpoint the table weights. Pattern and synonym changes are already
    /// on disk.
    pub fn save(&self) -> Result<(), AppError> {
        let weights_file = self.paths.weights_file();
        retry(self.config.locking.retries, "save weights", || {
            self.weights.save(&weights_file, &self.locks)
        })
    }

    fn rebuild_resolver(&mut self, schema: Arc<SchemaView>) {
        self.resolver = Resolver::new(
            schema,
            self.embedder.clone(),
            self.analyzer.clone(),
            self.stores.clone(),
            self.config.resolver_settings(),
        );
    }
}

/// A missing schema file yields an empty view so feedback management still
/// works before the first introspection.
fn load_schema(paths: &AppPaths) -> Result<SchemaView, AppError> {
    let path = paths.schema_file();
    if !path.exists() {
        log::warn!("no schema at {}, starting with an empty schema", path.display());
        return Ok(SchemaView::empty());
    }
    Ok(SchemaView::load(&path)?)
}

fn load_training(paths: &AppPaths, schema: &SchemaView) -> TrainingSet {
    let path = paths.training_file();
    if !path.exists() {
        return TrainingSet::empty();
    }
    match TrainingSet::load(&path, schema) {
        Ok(set) => set,
        Err(e) => {
            log::error!("ignoring unreadable training file {}: {e}", path.display());
            TrainingSet::empty()
        }
    }
}

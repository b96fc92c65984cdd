//! Durable log of confirmed query -> tables associations.
//!
//! One JSON file per record under `records/`, plus a `REVISION` counter that
//! every mutation bumps. Readers keep an in-memory snapshot and reload it when
//! the counter on disk moves, so several processes can share one store.
//!
//! Lookups go through three tiers and stop at the first that matches:
//! exact normalized query, generalized pattern, then embedding similarity.

mod pattern;
mod record;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use chrono::Utc;

use crate::eid::Eid;
use crate::linguistic::{Analysis, Analyzer};
use crate::lock::StoreLock;
use crate::schema::{SchemaError, SchemaView, TableId};
use crate::semantic::{cosine_similarity, normalize_query, Embedder, EmbeddingError};
use crate::storage::{self, BackendLocal, StorageManager, StoreError};

pub use pattern::{generalize, has_placeholders};
pub use record::{
    ExportDocument, FeedbackMatch, FeedbackRecord, ImportDocument, ImportReport, MatchSource,
    StoreOutcome, EXPORT_KIND,
};

const STORE_ID: &str = "feedback";
const REVISION_FILE: &str = "REVISION";

#[derive(Debug, thiserror::Error)]
pub enum FeedbackError {
    #[error("query is empty")]
    EmptyQuery,

    #[error("no tables given")]
    NoTables,

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),
}

impl FeedbackError {
    pub fn is_busy(&self) -> bool {
        matches!(self, FeedbackError::Store(e) if e.is_busy())
    }
}

impl From<std::io::Error> for FeedbackError {
    fn from(err: std::io::Error) -> Self {
        FeedbackError::Store(StoreError::Io(err))
    }
}

#[derive(Debug, Default)]
struct Snapshot {
    revision: u64,
    records: Vec<FeedbackRecord>,
}

impl Snapshot {
    fn by_query(&self, query: &str) -> Option<&FeedbackRecord> {
        self.records.iter().find(|r| r.query == query)
    }
}

/// A validated import document waiting to be merged.
struct ImportCandidate {
    query: String,
    tables: Vec<TableId>,
    timestamp: chrono::DateTime<Utc>,
    use_count: u32,
    pattern: String,
    embedding: Option<Vec<f32>>,
}

pub struct FeedbackStore {
    dir: PathBuf,
    records: BackendLocal,
    locks: StoreLock,
    embedder: Arc<dyn Embedder>,
    analyzer: Arc<dyn Analyzer>,
    snapshot: RwLock<Snapshot>,
}

impl FeedbackStore {
    pub fn open(
        dir: &Path,
        locks: StoreLock,
        embedder: Arc<dyn Embedder>,
        analyzer: Arc<dyn Analyzer>,
    ) -> Result<Self, FeedbackError> {
        let records = BackendLocal::new(&dir.join("records"))?;
        let store = Self {
            dir: dir.to_path_buf(),
            records,
            locks,
            embedder,
            analyzer,
            snapshot: RwLock::new(Snapshot::default()),
        };

        store.locks.with_lock(STORE_ID, || -> Result<(), FeedbackError> {
            store.replace_snapshot(store.load_from_disk());
            Ok(())
        })?;

        log::debug!(
            "opened feedback store at {} ({} records)",
            store.dir.display(),
            store.len()
        );

        Ok(store)
    }

    /// Record that `query` is answered by `tables`.
    ///
    /// All tables must resolve against `schema`; otherwise nothing is written.
    /// Storing the same normalized query again replaces its tables and bumps
    /// its use count.
    pub fn store<S: AsRef<str>>(
        &self,
        query: &str,
        tables: &[S],
        schema: &SchemaView,
    ) -> Result<StoreOutcome, FeedbackError> {
        let normalized = normalize_query(query);
        if normalized.is_empty() {
            return Err(FeedbackError::EmptyQuery);
        }
        if tables.is_empty() {
            return Err(FeedbackError::NoTables);
        }
        let tables = schema.resolve_all(tables)?;

        let analysis = self.analyze(query);
        let pattern = generalize(&normalized, analysis.as_ref());

        self.refresh_if_stale()?;
        let fingerprint = self.embedder.fingerprint();
        let needs_embedding = self
            .snapshot()
            .by_query(&normalized)
            .map_or(true, |r| !r.has_embedding_for(&fingerprint));

        // Computed before taking the lock
        let embedding = if needs_embedding {
            match self.embedder.embed(&normalized) {
                Ok(vector) => Some(vector),
                Err(e) => {
                    log::warn!("storing feedback for '{normalized}' without embedding: {e}");
                    None
                }
            }
        } else {
            None
        };

        self.locks.with_lock(STORE_ID, || {
            let current = self.load_from_disk();
            let now = Utc::now();

            let (record, outcome) = match current.by_query(&normalized) {
                Some(existing) => {
                    let mut record = existing.clone();
                    record.tables = tables.clone();
                    record.pattern = pattern.clone();
                    record.timestamp = now;
                    record.use_count = record.use_count.saturating_add(1);
                    if let Some(vector) = &embedding {
                        record.embedding = vector.clone();
                        record.model = fingerprint.clone();
                    }
                    (record, StoreOutcome::Updated)
                }
                None => {
                    let record = FeedbackRecord {
                        id: Eid::new(),
                        query: normalized.clone(),
                        tables: tables.clone(),
                        model: if embedding.is_some() {
                            fingerprint.clone()
                        } else {
                            String::new()
                        },
                        embedding: embedding.clone().unwrap_or_default(),
                        pattern: pattern.clone(),
                        timestamp: now,
                        use_count: 1,
                    };
                    (record, StoreOutcome::Created)
                }
            };

            self.commit(&[record], &[])?;
            log::info!("feedback {outcome:?}: '{normalized}' -> {}", join_tables(&tables));
            Ok(outcome)
        })
    }

    /// Look up past confirmations similar to `query`.
    ///
    /// Returns `None` when no tier matched. Exact and pattern hits have
    /// similarity 1.0; semantic hits are those with cosine similarity at or
    /// above `threshold`, best first.
    pub fn find_similar(
        &self,
        query: &str,
        threshold: f32,
    ) -> Result<Option<Vec<FeedbackMatch>>, FeedbackError> {
        let normalized = normalize_query(query);
        if normalized.is_empty() {
            return Ok(None);
        }

        self.refresh_if_stale()?;

        if let Some(record) = self.snapshot().by_query(&normalized) {
            return Ok(Some(vec![FeedbackMatch::from_record(record, 1.0, MatchSource::Exact)]));
        }

        let pattern = generalize(&normalized, self.analyze(query).as_ref());
        if has_placeholders(&pattern) {
            if let Some(found) = self.match_pattern(&pattern) {
                return Ok(Some(vec![found]));
            }
        }

        let fingerprint = self.embedder.fingerprint();
        if !self
            .snapshot()
            .records
            .iter()
            .any(|r| r.has_embedding_for(&fingerprint))
        {
            return Ok(None);
        }

        let query_vector = self.embedder.embed(&normalized)?;

        let mut matches: Vec<FeedbackMatch> = self
            .snapshot()
            .records
            .iter()
            .filter(|r| r.has_embedding_for(&fingerprint))
            .filter_map(|r| {
                let similarity = cosine_similarity(&query_vector, &r.embedding);
                (similarity >= threshold)
                    .then(|| FeedbackMatch::from_record(r, similarity, MatchSource::Semantic))
            })
            .collect();

        matches.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(Ordering::Equal));

        Ok((!matches.is_empty()).then_some(matches))
    }

    /// Pattern entry: tables of the most recent contributor, summed use count.
    fn match_pattern(&self, pattern: &str) -> Option<FeedbackMatch> {
        let snapshot = self.snapshot();
        let contributors: Vec<&FeedbackRecord> = snapshot
            .records
            .iter()
            .filter(|r| r.pattern == pattern)
            .collect();

        let latest = contributors
            .iter()
            .max_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)))?;

        let mut found = FeedbackMatch::from_record(latest, 1.0, MatchSource::Pattern);
        found.use_count = contributors.iter().map(|r| r.use_count).sum();
        Some(found)
    }

    /// Most used queries; ties ordered by query text.
    pub fn top_queries(&self, n: usize) -> Result<Vec<(String, u32)>, FeedbackError> {
        self.refresh_if_stale()?;

        let mut queries: Vec<(String, u32)> = self
            .snapshot()
            .records
            .iter()
            .map(|r| (r.query.clone(), r.use_count))
            .collect();
        queries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        queries.truncate(n);

        Ok(queries)
    }

    /// Remove every record. Returns how many were removed.
    pub fn clear(&self) -> Result<usize, FeedbackError> {
        self.locks.with_lock(STORE_ID, || {
            let current = self.load_from_disk();
            let ids: Vec<Eid> = current.records.iter().map(|r| r.id.clone()).collect();
            self.commit(&[], &ids)?;
            log::info!("cleared {} feedback records", ids.len());
            Ok(ids.len())
        })
    }

    /// Write one `feedback_<id>.json` document per record into `dir`.
    pub fn export(&self, dir: &Path) -> Result<usize, FeedbackError> {
        self.refresh_if_stale()?;
        std::fs::create_dir_all(dir)?;

        let snapshot = self.snapshot();
        for record in &snapshot.records {
            let document = ExportDocument::from(record);
            let data = serde_json::to_vec_pretty(&document).map_err(StoreError::from)?;
            storage::write_atomic(&dir.join(format!("feedback_{}.json", record.id)), &data)?;
        }

        log::info!("exported {} feedback records to {}", snapshot.records.len(), dir.display());
        Ok(snapshot.records.len())
    }

    /// Merge exported documents from `dir`.
    ///
    /// Unknown queries are created; known ones are replaced only by a newer
    /// document, keeping the larger use count. Importing the same directory
    /// twice changes nothing the second time. When `schema` is given, tables
    /// are validated and canonicalized against it.
    pub fn import(
        &self,
        dir: &Path,
        schema: Option<&SchemaView>,
    ) -> Result<ImportReport, FeedbackError> {
        self.refresh_if_stale()?;

        let mut report = ImportReport::default();
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let fingerprint = self.embedder.fingerprint();
        let mut candidates: HashMap<String, ImportCandidate> = HashMap::new();
        let mut order: Vec<String> = Vec::new();

        for path in paths {
            match self.parse_import_document(&path, schema, &fingerprint) {
                Ok(candidate) => {
                    let newer = candidates
                        .get(&candidate.query)
                        .map_or(true, |existing| candidate.timestamp > existing.timestamp);
                    if !candidates.contains_key(&candidate.query) {
                        order.push(candidate.query.clone());
                    }
                    if newer {
                        candidates.insert(candidate.query.clone(), candidate);
                    }
                }
                Err(reason) => {
                    log::warn!("skipping {}: {reason}", path.display());
                    report.skipped.push((path, reason));
                }
            }
        }

        // Embeddings for records that will be created, computed before locking
        for query in &order {
            let Some(candidate) = candidates.get_mut(query) else {
                continue;
            };
            if candidate.embedding.is_none() && self.snapshot().by_query(query).is_none() {
                match self.embedder.embed(query) {
                    Ok(vector) => candidate.embedding = Some(vector),
                    Err(e) => log::warn!("importing '{query}' without embedding: {e}"),
                }
            }
        }

        self.locks.with_lock(STORE_ID, || -> Result<(), FeedbackError> {
            let current = self.load_from_disk();
            let mut changed = Vec::new();

            for query in &order {
                let Some(candidate) = candidates.remove(query) else {
                    continue;
                };

                match current.by_query(query) {
                    None => {
                        report.created += 1;
                        let has_embedding = candidate.embedding.is_some();
                        changed.push(FeedbackRecord {
                            id: Eid::new(),
                            query: candidate.query,
                            tables: candidate.tables,
                            embedding: candidate.embedding.unwrap_or_default(),
                            model: if has_embedding {
                                fingerprint.clone()
                            } else {
                                String::new()
                            },
                            pattern: candidate.pattern,
                            timestamp: candidate.timestamp,
                            use_count: candidate.use_count,
                        });
                    }
                    Some(existing) if candidate.timestamp > existing.timestamp => {
                        report.updated += 1;
                        let mut record = existing.clone();
                        record.tables = candidate.tables;
                        record.pattern = candidate.pattern;
                        record.timestamp = candidate.timestamp;
                        record.use_count = record.use_count.max(candidate.use_count);
                        if !record.has_embedding_for(&fingerprint) {
                            if let Some(vector) = candidate.embedding {
                                record.embedding = vector;
                                record.model = fingerprint.clone();
                            }
                        }
                        changed.push(record);
                    }
                    Some(_) => report.unchanged += 1,
                }
            }

            if !changed.is_empty() {
                self.commit(&changed, &[])?;
            }
            Ok(())
        })?;

        log::info!(
            "imported feedback from {}: {} created, {} updated, {} unchanged, {} skipped",
            dir.display(),
            report.created,
            report.updated,
            report.unchanged,
            report.skipped.len()
        );

        Ok(report)
    }

    fn parse_import_document(
        &self,
        path: &Path,
        schema: Option<&SchemaView>,
        fingerprint: &str,
    ) -> Result<ImportCandidate, String> {
        let data = std::fs::read(path).map_err(|e| format!("unreadable: {e}"))?;
        let document: ImportDocument =
            serde_json::from_slice(&data).map_err(|e| format!("not a feedback document: {e}"))?;

        if let Some(kind) = &document.kind {
            if kind != EXPORT_KIND {
                return Err(format!("unexpected document kind '{kind}'"));
            }
        }

        let missing = document.missing_fields();
        if !missing.is_empty() {
            return Err(format!("missing {}", missing.join(", ")));
        }

        let query_text = document.query.unwrap_or_default();
        let names = document.tables.unwrap_or_default();
        let tables = match schema {
            Some(schema) => schema.resolve_all(&names).map_err(|e| e.to_string())?,
            None => names
                .iter()
                .map(|name| TableId::parse(name))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| e.to_string())?,
        };

        let query = normalize_query(&query_text);
        let embedding = match (document.model.as_deref(), document.embedding) {
            (Some(model), Some(vector)) if model == fingerprint && !vector.is_empty() => Some(vector),
            _ => None,
        };

        Ok(ImportCandidate {
            pattern: generalize(&query, self.analyze(&query_text).as_ref()),
            query,
            tables,
            timestamp: document.timestamp.unwrap_or_else(Utc::now),
            use_count: document.use_count.unwrap_or(1).max(1),
            embedding,
        })
    }

    pub fn len(&self) -> usize {
        self.snapshot().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current records, refreshed from disk when stale.
    pub fn records(&self) -> Result<Vec<FeedbackRecord>, FeedbackError> {
        self.refresh_if_stale()?;
        Ok(self.snapshot().records.clone())
    }

    fn analyze(&self, text: &str) -> Option<Analysis> {
        match self.analyzer.analyze(text) {
            Ok(analysis) => Some(analysis),
            Err(e) => {
                log::debug!("analysis unavailable for pattern extraction: {e}");
                None
            }
        }
    }

    fn snapshot(&self) -> RwLockReadGuard<'_, Snapshot> {
        self.snapshot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn replace_snapshot(&self, snapshot: Snapshot) {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    fn revision_path(&self) -> PathBuf {
        self.dir.join(REVISION_FILE)
    }

    fn read_revision(&self) -> u64 {
        std::fs::read_to_string(self.revision_path())
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Reload the snapshot if another writer bumped the revision.
    fn refresh_if_stale(&self) -> Result<(), FeedbackError> {
        if self.read_revision() == self.snapshot().revision {
            return Ok(());
        }

        self.locks.with_lock(STORE_ID, || -> Result<(), FeedbackError> {
            self.replace_snapshot(self.load_from_disk());
            Ok(())
        })
    }

    /// Read every record file. Unreadable files are skipped.
    fn load_from_disk(&self) -> Snapshot {
        let started = std::time::Instant::now();
        let revision = self.read_revision();

        let mut by_query: HashMap<String, FeedbackRecord> = HashMap::new();
        for name in self.records.list() {
            if !name.ends_with(".json") {
                continue;
            }

            let record: FeedbackRecord = match self
                .records
                .read(&name)
                .map_err(|e| e.to_string())
                .and_then(|data| serde_json::from_slice(&data).map_err(|e| e.to_string()))
            {
                Ok(record) => record,
                Err(e) => {
                    log::warn!("skipping corrupt feedback record {name}: {e}");
                    continue;
                }
            };

            match by_query.get(&record.query) {
                Some(existing) if existing.timestamp >= record.timestamp => {}
                _ => {
                    by_query.insert(record.query.clone(), record);
                }
            }
        }

        let mut records: Vec<FeedbackRecord> = by_query.into_values().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));

        log::debug!("loaded {} feedback records in {:?}", records.len(), started.elapsed());

        Snapshot { revision, records }
    }

    /// Write and delete record files, bump the revision and reload.
    /// Caller must hold the store lock.
    fn commit(&self, changed: &[FeedbackRecord], removed: &[Eid]) -> Result<(), FeedbackError> {
        for record in changed {
            let data = serde_json::to_vec_pretty(record).map_err(StoreError::from)?;
            self.records.write(&record.id.file_name(), &data)?;
        }
        for id in removed {
            self.records.delete(&id.file_name())?;
        }

        let revision = self.read_revision() + 1;
        storage::write_atomic(&self.revision_path(), revision.to_string().as_bytes())?;

        self.replace_snapshot(self.load_from_disk());
        Ok(())
    }
}

fn join_tables(tables: &[TableId]) -> String {
    tables
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linguistic::RuleAnalyzer;
    use crate::semantic::HashingEmbedder;
    use crate::tests::{sales_schema, test_locks, FailingEmbedder};

    fn open(dir: &Path) -> FeedbackStore {
        FeedbackStore::open(
            dir,
            test_locks(dir),
            Arc::new(HashingEmbedder::new(256)),
            Arc::new(RuleAnalyzer::new()),
        )
        .unwrap()
    }

    #[test]
    fn storing_twice_updates_in_place() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open(tmp.path());
        let schema = sales_schema();

        assert_eq!(
            store.store("Show all   orders", &["sales.orders"], &schema).unwrap(),
            StoreOutcome::Created
        );
        assert_eq!(
            store.store("show all orders", &["SALES.CUSTOMERS"], &schema).unwrap(),
            StoreOutcome::Updated
        );

        let records = store.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].use_count, 2);
        assert_eq!(records[0].query, "show all orders");
        assert_eq!(records[0].tables, vec![TableId::new("sales", "customers")]);
    }

    #[test]
    fn invalid_tables_leave_store_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open(tmp.path());
        let schema = sales_schema();

        let err = store
            .store("orders placed last year", &["sales.orders", "badschema.badtable"], &schema)
            .unwrap_err();
        assert!(matches!(err, FeedbackError::Schema(SchemaError::UnknownTables(_))));
        assert!(store.is_empty());

        assert!(matches!(
            store.store("   ", &["sales.orders"], &schema),
            Err(FeedbackError::EmptyQuery)
        ));
        assert!(matches!(
            store.store("orders", &[] as &[&str], &schema),
            Err(FeedbackError::NoTables)
        ));
        assert!(store.records().unwrap().is_empty());
    }

    #[test]
    fn lookup_tiers() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open(tmp.path());
        let schema = sales_schema();

        store.store("orders from 2021", &["sales.orders"], &schema).unwrap();

        let exact = store.find_similar("ORDERS from 2021", 0.8).unwrap().unwrap();
        assert_eq!(exact[0].source, MatchSource::Exact);
        assert_eq!(exact[0].similarity, 1.0);

        let by_pattern = store.find_similar("orders from 2022", 0.8).unwrap().unwrap();
        assert_eq!(by_pattern[0].source, MatchSource::Pattern);
        assert_eq!(by_pattern[0].tables, vec![TableId::new("sales", "orders")]);

        let semantic = store.find_similar("orders from", 0.5).unwrap().unwrap();
        assert_eq!(semantic[0].source, MatchSource::Semantic);
        assert!(semantic[0].similarity >= 0.5);

        assert!(store.find_similar("zebra habitats", 0.99).unwrap().is_none());
    }

    #[test]
    fn pattern_entry_uses_latest_tables_and_summed_counts() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open(tmp.path());
        let schema = sales_schema();

        store.store("orders from 2020", &["sales.customers"], &schema).unwrap();
        store.store("orders from 2020", &["sales.customers"], &schema).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.store("orders from 2021", &["sales.orders"], &schema).unwrap();

        let found = store.find_similar("orders from 1999", 0.8).unwrap().unwrap();
        assert_eq!(found[0].source, MatchSource::Pattern);
        assert_eq!(found[0].tables, vec![TableId::new("sales", "orders")]);
        assert_eq!(found[0].use_count, 3);
    }

    #[test]
    fn top_queries_break_ties_by_text() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open(tmp.path());
        let schema = sales_schema();

        for query in ["zeta orders", "alpha orders", "beta orders", "beta orders"] {
            store.store(query, &["sales.orders"], &schema).unwrap();
        }

        assert_eq!(
            store.top_queries(3).unwrap(),
            vec![
                ("beta orders".to_string(), 2),
                ("alpha orders".to_string(), 1),
                ("zeta orders".to_string(), 1),
            ]
        );
        assert_eq!(store.top_queries(1).unwrap().len(), 1);
    }

    #[test]
    fn clear_removes_everything() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open(tmp.path());
        let schema = sales_schema();

        store.store("alpha orders", &["sales.orders"], &schema).unwrap();
        store.store("beta orders", &["sales.orders"], &schema).unwrap();

        assert_eq!(store.clear().unwrap(), 2);
        assert!(store.is_empty());
        assert!(store.find_similar("alpha orders", 0.8).unwrap().is_none());
    }

    #[test]
    fn second_instance_sees_writes_of_the_first() {
        let tmp = tempfile::tempdir().unwrap();
        let first = open(tmp.path());
        let second = open(tmp.path());
        let schema = sales_schema();

        first.store("alpha orders", &["sales.orders"], &schema).unwrap();

        let found = second.find_similar("alpha orders", 0.8).unwrap().unwrap();
        assert_eq!(found[0].source, MatchSource::Exact);

        second.store("alpha orders", &["sales.orders"], &schema).unwrap();
        assert_eq!(first.records().unwrap()[0].use_count, 2);
    }

    #[test]
    fn embedding_failure_still_stores_record() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FeedbackStore::open(
            tmp.path(),
            test_locks(tmp.path()),
            Arc::new(FailingEmbedder),
            Arc::new(RuleAnalyzer::new()),
        )
        .unwrap();
        let schema = sales_schema();

        store.store("alpha orders", &["sales.orders"], &schema).unwrap();
        let records = store.records().unwrap();
        assert!(records[0].embedding.is_empty());

        // Exact tier still works, semantic tier has nothing to compare with
        assert!(store.find_similar("alpha orders", 0.8).unwrap().is_some());
        assert!(store.find_similar("beta orders", 0.1).unwrap().is_none());
    }

    #[test]
    fn corrupt_record_files_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let schema = sales_schema();
        {
            let store = open(tmp.path());
            store.store("alpha orders", &["sales.orders"], &schema).unwrap();
        }
        std::fs::write(tmp.path().join("records").join("broken.json"), b"{ nope").unwrap();

        let store = open(tmp.path());
        assert_eq!(store.len(), 1);
    }
}

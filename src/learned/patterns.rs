//! Literal query patterns and schema-driven keyword matching.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use crate::linguistic::{Analysis, EntityKind};
use crate::lock::StoreLock;
use crate::schema::{SchemaView, TableId};
use crate::semantic::{lexical, normalize_query};
use crate::storage::{self, StoreError};

const STORE_ID: &str = "patterns";
pub const FILE_NAME: &str = "patterns.yaml";

/// Curated weights above this count as a pattern match
const CURATED_MATCH_THRESHOLD: f32 = 0.5;

/// normalized query -> table -> weight in [0, 1]
pub type PatternMap = BTreeMap<String, BTreeMap<TableId, f32>>;

pub struct PatternStore {
    path: PathBuf,
    locks: StoreLock,
    patterns: RwLock<PatternMap>,
}

impl PatternStore {
    pub fn open(dir: &Path, locks: StoreLock) -> Self {
        let path = dir.join(FILE_NAME);
        let patterns: PatternMap = storage::read_yaml_or_default(&path);
        log::debug!("loaded {} literal patterns", patterns.len());

        Self {
            path,
            locks,
            patterns: RwLock::new(patterns),
        }
    }

    /// Tables the query points at by name, by entity type, or by a curated
    /// literal pattern. Returned in schema enumeration order.
    pub fn match_query(&self, query: &str, analysis: &Analysis, schema: &SchemaView) -> Vec<TableId> {
        let query = normalize_query(query);
        let mut positions = BTreeSet::new();

        let wants_date = analysis.has_entity(EntityKind::Date);
        let wants_place = analysis.has_entity(EntityKind::Place);
        let wants_number = analysis.has_entity(EntityKind::Cardinal);

        for (idx, table) in schema.tables().iter().enumerate() {
            let by_name = lexical::mentions(&query, table.id.table())
                || table.columns.iter().any(|c| lexical::mentions(&query, &c.name));
            let by_entity = (wants_date && table.columns.iter().any(|c| c.is_temporal()))
                || (wants_place && table.columns.iter().any(|c| c.is_location()))
                || (wants_number && table.columns.iter().any(|c| c.is_measure()));

            if by_name || by_entity {
                positions.insert(idx);
            }
        }

        if let Some(curated) = self.read().get(&query) {
            for (table, weight) in curated {
                if *weight > CURATED_MATCH_THRESHOLD {
                    if let Some(idx) = schema.position(table) {
                        positions.insert(idx);
                    }
                }
            }
        }

        positions
            .into_iter()
            .map(|idx| schema.tables()[idx].id.clone())
            .collect()
    }

    /// Curated weight of (query, table); 0.0 when unknown.
    pub fn weight(&self, query: &str, table: &TableId) -> f32 {
        let query = normalize_query(query);
        self.read()
            .get(&query)
            .and_then(|tables| {
                tables
                    .iter()
                    .find(|(id, _)| id.key() == table.key())
                    .map(|(_, w)| *w)
            })
            .unwrap_or(0.0)
    }

    pub fn set_weight(&self, query: &str, table: &TableId, weight: f32) -> Result<(), StoreError> {
        self.set_weights(&[(query.to_string(), table.clone(), weight)])
    }

    /// Persist several weights in one locked rewrite.
    pub fn set_weights(&self, entries: &[(String, TableId, f32)]) -> Result<(), StoreError> {
        if entries.is_empty() {
            return Ok(());
        }

        self.locks.with_lock(STORE_ID, || {
            let mut on_disk: PatternMap = storage::read_yaml_or_default(&self.path);
            for (query, table, weight) in entries {
                let query = normalize_query(query);
                if query.is_empty() {
                    continue;
                }
                on_disk
                    .entry(query)
                    .or_default()
                    .insert(table.clone(), weight.clamp(0.0, 1.0));
            }
            storage::write_yaml(&self.path, &on_disk)?;
            *self.patterns.write().unwrap_or_else(PoisonError::into_inner) = on_disk;
            Ok(())
        })
    }

    /// Atomically rewrite the file as it stands on disk and adopt it in
    /// memory. Mutations write through under the lock, so in-memory entries
    /// are never merged back over newer writes from other processes.
    pub fn save(&self) -> Result<(), StoreError> {
        self.locks.with_lock(STORE_ID, || {
            let on_disk: PatternMap = storage::read_yaml_or_default(&self.path);
            storage::write_yaml(&self.path, &on_disk)?;
            *self.patterns.write().unwrap_or_else(PoisonError::into_inner) = on_disk;
            Ok(())
        })
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, PatternMap> {
        self.patterns.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linguistic::{Analyzer, RuleAnalyzer};
    use crate::tests::{sales_schema, test_locks};

    fn matched(store: &PatternStore, query: &str) -> Vec<String> {
        let analysis = RuleAnalyzer::new().analyze(query).unwrap();
        store
            .match_query(query, &analysis, &sales_schema())
            .iter()
            .map(|t| t.to_string())
            .collect()
    }

    #[test]
    fn matches_names_and_entities() {
        let tmp = tempfile::tempdir().unwrap();
        let store = PatternStore::open(tmp.path(), test_locks(tmp.path()));

        assert_eq!(matched(&store, "orders placed last year"), vec!["sales.orders"]);
        assert_eq!(matched(&store, "who lives in Texas"), vec!["sales.customers"]);
        assert_eq!(
            matched(&store, "customer id lookup"),
            vec!["sales.orders", "sales.customers"]
        );
        assert!(matched(&store, "anything interesting").is_empty());
    }

    #[test]
    fn curated_weights_above_half_match() {
        let tmp = tempfile::tempdir().unwrap();
        let store = PatternStore::open(tmp.path(), test_locks(tmp.path()));
        let customers = TableId::new("sales", "customers");
        let orders = TableId::new("sales", "orders");

        store.set_weight("top buyers", &customers, 0.9).unwrap();
        store.set_weight("top buyers", &orders, 0.5).unwrap();

        assert_eq!(matched(&store, "Top  Buyers"), vec!["sales.customers"]);
        assert_eq!(store.weight("top buyers", &orders), 0.5);
        assert_eq!(store.weight("unknown query", &orders), 0.0);
    }

    #[test]
    fn weights_persist_across_instances() {
        let tmp = tempfile::tempdir().unwrap();
        let customers = TableId::new("sales", "customers");
        {
            let store = PatternStore::open(tmp.path(), test_locks(tmp.path()));
            store.set_weight("top buyers", &customers, 1.7).unwrap();
            store.save().unwrap();
        }

        let reopened = PatternStore::open(tmp.path(), test_locks(tmp.path()));
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.weight("top buyers", &customers), 1.0);
    }

    #[test]
    fn save_keeps_newer_weights_from_other_instances() {
        let tmp = tempfile::tempdir().unwrap();
        let customers = TableId::new("sales", "customers");
        let first = PatternStore::open(tmp.path(), test_locks(tmp.path()));
        let second = PatternStore::open(tmp.path(), test_locks(tmp.path()));

        first.set_weight("top buyers", &customers, 0.9).unwrap();
        second.set_weight("top buyers", &customers, 0.2).unwrap();
        first.save().unwrap();

        assert_eq!(first.weight("top buyers", &customers), 0.2);
        let reopened = PatternStore::open(tmp.path(), test_locks(tmp.path()));
        assert_eq!(reopened.weight("top buyers", &customers), 0.2);
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(FILE_NAME), "::: not yaml [").unwrap();

        let store = PatternStore::open(tmp.path(), test_locks(tmp.path()));
        assert!(store.is_empty());
    }
}

//! Token -> table associations learned from column similarity.
//!
//! Two layers: `dynamic` entries are learned during sessions, `default`
//! entries come from training or from promoting the dynamic layer. Each
//! weight is the peak similarity seen between the token and a column of the
//! table.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use crate::lock::StoreLock;
use crate::schema::TableId;
use crate::semantic::{Embedder, TableIndex};
use crate::storage::{self, StoreError};

const STORE_ID: &str = "synonyms";
pub const DYNAMIC_FILE: &str = "synonyms.dynamic.yaml";
pub const DEFAULT_FILE: &str = "synonyms.default.yaml";

pub type SynonymMap = BTreeMap<String, BTreeMap<TableId, f32>>;

#[derive(Clone, Debug, PartialEq)]
pub struct SynonymHit {
    pub token: String,
    pub table: TableId,
    pub weight: f32,
}

#[derive(Debug, Default)]
struct Layers {
    dynamic: SynonymMap,
    default: SynonymMap,
}

pub struct SynonymStore {
    dynamic_path: PathBuf,
    default_path: PathBuf,
    locks: StoreLock,
    threshold: f32,
    layers: RwLock<Layers>,
}

/// Merge `from` into `into`, keeping the larger weight per pair.
fn merge_max(into: &mut SynonymMap, from: &SynonymMap) -> usize {
    let mut pairs = 0;
    for (token, tables) in from {
        let entry = into.entry(token.clone()).or_default();
        for (table, weight) in tables {
            let slot = entry.entry(table.clone()).or_insert(0.0);
            *slot = slot.max(*weight);
            pairs += 1;
        }
    }
    pairs
}

impl SynonymStore {
    pub fn open(dir: &Path, locks: StoreLock, threshold: f32) -> Self {
        let dynamic_path = dir.join(DYNAMIC_FILE);
        let default_path = dir.join(DEFAULT_FILE);
        let layers = Layers {
            dynamic: storage::read_yaml_or_default(&dynamic_path),
            default: storage::read_yaml_or_default(&default_path),
        };

        Self {
            dynamic_path,
            default_path,
            locks,
            threshold,
            layers: RwLock::new(layers),
        }
    }

    /// Tables known for `token` across both layers, peak weight per table.
    pub fn lookup(&self, token: &str) -> BTreeMap<TableId, f32> {
        let token = token.to_lowercase();
        let layers = self.read();
        let mut merged = BTreeMap::new();
        for layer in [&layers.default, &layers.dynamic] {
            if let Some(tables) = layer.get(&token) {
                for (table, weight) in tables {
                    let slot = merged.entry(table.clone()).or_insert(0.0_f32);
                    *slot = slot.max(*weight);
                }
            }
        }
        merged
    }

    /// Learned peak similarity of (token, table).
    #[cfg(test)]
    pub fn peak(&self, token: &str, table: &TableId) -> Option<f32> {
        self.lookup(token).get(table).copied()
    }

    /// Resolve tokens to tables.
    ///
    /// Known tokens return their tables regardless of weight. Unknown tokens
    /// are embedded and compared with every column; pairings at or above the
    /// match threshold are learned into the dynamic layer and returned.
    pub fn match_tokens(
        &self,
        tokens: &[String],
        embedder: &dyn Embedder,
        index: &TableIndex,
    ) -> Result<Vec<SynonymHit>, StoreError> {
        let mut hits = Vec::new();
        let mut unknown: Vec<String> = Vec::new();

        for token in tokens {
            let token = token.to_lowercase();
            if hits.iter().any(|h: &SynonymHit| h.token == token) || unknown.contains(&token) {
                continue;
            }
            let known = self.lookup(&token);
            if known.is_empty() {
                unknown.push(token);
            } else {
                hits.extend(known.into_iter().map(|(table, weight)| SynonymHit {
                    token: token.clone(),
                    table,
                    weight,
                }));
            }
        }

        if unknown.is_empty() || index.is_empty() {
            return Ok(hits);
        }

        // Embedding happens before any lock is taken
        let vectors = match embedder.embed_batch(&unknown) {
            Ok(vectors) => vectors,
            Err(e) => {
                log::warn!("synonym learning skipped: {e}");
                return Ok(hits);
            }
        };

        let mut learned = Vec::new();
        for (token, vector) in unknown.iter().zip(vectors.iter()) {
            for table in index.tables() {
                let peak = table.best_column_similarity(vector);
                if peak >= self.threshold {
                    learned.push(SynonymHit {
                        token: token.clone(),
                        table: table.id.clone(),
                        weight: peak.min(1.0),
                    });
                }
            }
        }

        if !learned.is_empty() {
            self.learn(&learned)?;
            log::info!("learned {} synonym pairings", learned.len());
            hits.extend(learned);
        }

        Ok(hits)
    }

    /// Add pairings to the dynamic layer.
    pub fn learn(&self, hits: &[SynonymHit]) -> Result<(), StoreError> {
        self.write_layer(hits, false)
    }

    /// Add pairings straight to the default layer (training ingestion).
    pub fn add_defaults(&self, hits: &[SynonymHit]) -> Result<(), StoreError> {
        self.write_layer(hits, true)
    }

    fn write_layer(&self, hits: &[SynonymHit], default_layer: bool) -> Result<(), StoreError> {
        let path = if default_layer {
            &self.default_path
        } else {
            &self.dynamic_path
        };

        let mut incoming = SynonymMap::new();
        for hit in hits {
            incoming
                .entry(hit.token.to_lowercase())
                .or_default()
                .insert(hit.table.clone(), hit.weight.clamp(0.0, 1.0));
        }

        self.locks.with_lock(STORE_ID, || {
            let mut on_disk: SynonymMap = storage::read_yaml_or_default(path);
            merge_max(&mut on_disk, &incoming);
            storage::write_yaml(path, &on_disk)?;

            let mut layers = self.layers.write().unwrap_or_else(PoisonError::into_inner);
            if default_layer {
                layers.default = on_disk;
            } else {
                layers.dynamic = on_disk;
            }
            Ok(())
        })
    }

    /// Merge the dynamic layer into the default layer and empty it.
    /// Returns the number of promoted pairings.
    pub fn promote(&self) -> Result<usize, StoreError> {
        self.locks.with_lock(STORE_ID, || {
            let dynamic: SynonymMap = storage::read_yaml_or_default(&self.dynamic_path);
            let mut default: SynonymMap = storage::read_yaml_or_default(&self.default_path);

            let promoted = merge_max(&mut default, &dynamic);
            storage::write_yaml(&self.default_path, &default)?;
            storage::write_yaml(&self.dynamic_path, &SynonymMap::new())?;

            let mut layers = self.layers.write().unwrap_or_else(PoisonError::into_inner);
            layers.default = default;
            layers.dynamic = SynonymMap::new();

            log::info!("promoted {promoted} synonym pairings");
            Ok(promoted)
        })
    }

    /// Atomically rewrite both layers as they stand on disk and adopt them
    /// in memory. Every mutation already writes through under the lock.
    pub fn save(&self) -> Result<(), StoreError> {
        self.locks.with_lock(STORE_ID, || {
            let dynamic: SynonymMap = storage::read_yaml_or_default(&self.dynamic_path);
            let default: SynonymMap = storage::read_yaml_or_default(&self.default_path);
            storage::write_yaml(&self.dynamic_path, &dynamic)?;
            storage::write_yaml(&self.default_path, &default)?;

            let mut layers = self.layers.write().unwrap_or_else(PoisonError::into_inner);
            layers.dynamic = dynamic;
            layers.default = default;
            Ok(())
        })
    }

    pub fn dynamic_len(&self) -> usize {
        self.read().dynamic.len()
    }

    pub fn default_len(&self) -> usize {
        self.read().default.len()
    }

    fn read(&self) -> RwLockReadGuard<'_, Layers> {
        self.layers.read().unwrap_or_else(PoisonError::into_inner)
    }
}

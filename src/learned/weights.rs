//! Per-table adaptive scoring weights.
//!
//! `TableWeights` is a value: updates return a new table and the caller
//! decides when to checkpoint it to `weights.yaml`.

use std::path::Path;

use indexmap::IndexMap;

use crate::lock::StoreLock;
use crate::schema::{SchemaView, TableId};
use crate::storage::{self, StoreError};

const STORE_ID: &str = "weights";
pub const FILE_NAME: &str = "weights.yaml";

pub const INITIAL_WEIGHT: f32 = 1.0;
pub const REINFORCE_FACTOR: f32 = 1.1;
pub const DECAY_FACTOR: f32 = 0.95;

/// Band every weight is clamped into after an update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeightBounds {
    pub min: f32,
    pub max: f32,
}

impl Default for WeightBounds {
    fn default() -> Self {
        Self { min: 0.1, max: 10.0 }
    }
}

impl WeightBounds {
    fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableWeights {
    weights: IndexMap<TableId, f32>,
    bounds: WeightBounds,
}

impl TableWeights {
    /// Every table of the schema at the initial weight.
    pub fn for_schema(schema: &SchemaView, bounds: WeightBounds) -> Self {
        Self {
            weights: schema
                .tables()
                .iter()
                .map(|t| (t.id.clone(), INITIAL_WEIGHT))
                .collect(),
            bounds,
        }
    }

    /// Weight of a table; untracked tables weigh the initial value.
    pub fn get(&self, table: &TableId) -> f32 {
        self.weights.get(table).copied().unwrap_or(INITIAL_WEIGHT)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TableId, f32)> {
        self.weights.iter().map(|(id, w)| (id, *w))
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Multiply each listed table by the reinforce factor.
    /// Untracked tables start from the initial weight.
    pub fn reinforced(&self, tables: &[TableId]) -> Self {
        let mut next = self.clone();
        for table in tables {
            let current = next.get(table);
            next.weights
                .insert(table.clone(), self.bounds.clamp(current * REINFORCE_FACTOR));
        }
        next
    }

    /// Multiply every tracked table outside `confirmed` by the decay factor.
    pub fn decayed(&self, confirmed: &[TableId]) -> Self {
        let mut next = self.clone();
        for (table, weight) in next.weights.iter_mut() {
            if !confirmed.contains(table) {
                *weight = self.bounds.clamp(*weight * DECAY_FACTOR);
            }
        }
        next
    }

    /// Load checkpointed weights on top of a fresh table for `schema`.
    /// Tables no longer in the schema are dropped.
    pub fn load(path: &Path, schema: &SchemaView, bounds: WeightBounds) -> Self {
        let mut weights = Self::for_schema(schema, bounds);
        let stored: IndexMap<String, f32> = storage::read_yaml_or_default(path);

        for (name, weight) in stored {
            match schema.resolve(&name) {
                Some(id) if weight.is_finite() && weight >= 0.0 => {
                    weights.weights.insert(id.clone(), bounds.clamp(weight));
                }
                Some(_) => log::warn!("ignoring invalid weight {weight} for {name}"),
                None => log::debug!("dropping weight of unknown table {name}"),
            }
        }

        weights
    }

    /// Checkpoint to disk under the weights lock.
    pub fn save(&self, path: &Path, locks: &StoreLock) -> Result<(), StoreError> {
        let serialized: IndexMap<String, f32> = self
            .weights
            .iter()
            .map(|(id, w)| (id.to_string(), *w))
            .collect();

        locks.with_lock(STORE_ID, || storage::write_yaml(path, &serialized))?;
        log::debug!("saved {} table weights to {}", serialized.len(), path.display());
        Ok(())
    }
}

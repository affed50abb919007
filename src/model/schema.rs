use crate::error::CatalogError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Monotonic union of column name -> column type. A column may be
/// introduced once; any later observation with a different type is a
/// hard error.
///
/// Insertion order is preserved so `to_json`/serde round-trips are
/// stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    columns: IndexMap<String, String>,
}

/// Outcome of an [`Schema::accumulate`] call, used by tests and callers
/// that want to distinguish a no-op re-accumulation from genuine growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulateOutcome {
    Added,
    NothingAdded,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `(column, type)` pairs into the accumulated schema.
    /// Re-accumulating the same column/type pair is a no-op. A column
    /// reappearing with a different type raises [`CatalogError::SchemaConflict`].
    pub fn accumulate(
        &mut self,
        columns: &[String],
        types: &[String],
    ) -> Result<AccumulateOutcome, CatalogError> {
        assert_eq!(columns.len(), types.len(), "columns/types length mismatch");
        let mut outcome = AccumulateOutcome::NothingAdded;
        for (col, ty) in columns.iter().zip(types.iter()) {
            match self.columns.get(col) {
                Some(existing) if existing == ty => {}
                Some(existing) => {
                    return Err(CatalogError::SchemaConflict {
                        column: col.clone(),
                        previous: existing.clone(),
                        found: ty.clone(),
                    });
                }
                None => {
                    self.columns.insert(col.clone(), ty.clone());
                    outcome = AccumulateOutcome::Added;
                }
            }
        }
        Ok(outcome)
    }

    /// Merges another schema's columns into this one in its insertion
    /// order. Used when folding the union of per-log-object schemas.
    pub fn merge(&mut self, other: &Schema) -> Result<AccumulateOutcome, CatalogError> {
        let (cols, types): (Vec<String>, Vec<String>) = other
            .columns
            .iter()
            .map(|(c, t)| (c.clone(), t.clone()))
            .unzip();
        self.accumulate(&cols, &types)
    }

    pub fn columns(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }

    pub fn types(&self) -> Vec<String> {
        self.columns.values().cloned().collect()
    }

    pub fn pairs(&self) -> Vec<(String, String)> {
        self.columns
            .iter()
            .map(|(c, t)| (c.clone(), t.clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn to_json(&self) -> Result<String, CatalogError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(s)?)
    }
}

//! Typed, columnar row sets, carried as a batch of columns rather than
//! per-row dictionaries for performance, while keeping the public surface
//! a plain record batch callers already have on hand.
//!
//! [`InsertBatch`] is what callers hand to [`crate::ingest::insert`]: an
//! arrow [`RecordBatch`] plus an optional per-row partition override,
//! modeled as an explicit constructor argument rather than a magic row
//! field — see DESIGN.md.

use crate::error::{CatalogError, Result};
use crate::partition_fn::PartitionFunction;
use datafusion::arrow::array::{RecordBatch, UInt32Array};
use datafusion::arrow::compute::take;
use indexmap::IndexMap;

pub struct InsertBatch {
    pub batch: RecordBatch,
    pub partition_override: Option<Vec<String>>,
}

impl InsertBatch {
    pub fn new(batch: RecordBatch) -> Self {
        Self {
            batch,
            partition_override: None,
        }
    }

    /// Explicit per-row partition assignment, stripping the need for any
    /// `_partition` row field entirely.
    pub fn with_partition_override(batch: RecordBatch, partitions: Vec<String>) -> Result<Self> {
        if partitions.len() != batch.num_rows() {
            return Err(CatalogError::Collaborator(format!(
                "partition override has {} entries but batch has {} rows",
                partitions.len(),
                batch.num_rows()
            )));
        }
        Ok(Self {
            batch,
            partition_override: Some(partitions),
        })
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    fn partitions(&self, partition_fn: &dyn PartitionFunction) -> Vec<String> {
        match &self.partition_override {
            Some(p) => p.clone(),
            None => (0..self.batch.num_rows())
                .map(|i| partition_fn.partition(&self.batch, i))
                .collect(),
        }
    }

    /// Groups rows by partition, preserving the order partitions are
    /// first encountered and the relative row order within each group.
    pub fn group_by_partition(
        &self,
        partition_fn: &dyn PartitionFunction,
    ) -> Result<IndexMap<String, RecordBatch>> {
        let partitions = self.partitions(partition_fn);
        let mut indices: IndexMap<String, Vec<u32>> = IndexMap::new();
        for (row, part) in partitions.into_iter().enumerate() {
            indices.entry(part).or_default().push(row as u32);
        }

        let mut out = IndexMap::with_capacity(indices.len());
        for (part, rows) in indices {
            let idx = UInt32Array::from(rows);
            let mut columns = Vec::with_capacity(self.batch.num_columns());
            for col in self.batch.columns() {
                columns.push(
                    take(col.as_ref(), &idx, None)
                        .map_err(|e| CatalogError::Collaborator(e.to_string()))?,
                );
            }
            let grouped = RecordBatch::try_new(self.batch.schema(), columns)
                .map_err(|e| CatalogError::Collaborator(e.to_string()))?;
            out.insert(part, grouped);
        }
        Ok(out)
    }
}

//! The partition-function collaborator: a strategy interface with a
//! single `partition(row) -> string` method.

use datafusion::arrow::array::RecordBatch;

/// Computes the partition string for row `row_index` of `batch`. The
/// core treats the result as an opaque byte string: it is never parsed,
/// only used as a sub-path under `_data/`.
pub trait PartitionFunction: Send + Sync {
    fn partition(&self, batch: &RecordBatch, row_index: usize) -> String;
}

/// A [`PartitionFunction`] built from a plain closure, for callers who
/// don't want to name a type.
pub struct FnPartitioner<F>(pub F)
where
    F: Fn(&RecordBatch, usize) -> String + Send + Sync;

impl<F> PartitionFunction for FnPartitioner<F>
where
    F: Fn(&RecordBatch, usize) -> String + Send + Sync,
{
    fn partition(&self, batch: &RecordBatch, row_index: usize) -> String {
        (self.0)(batch, row_index)
    }
}

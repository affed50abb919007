//! A serverless, append-only analytical table catalog layered directly
//! on object storage.
//!
//! Writers append columnar data files and record their existence in an
//! immutable, lexicographically-ordered log; readers reconstruct the live
//! file set by folding the log forward; a merger compacts small files; a
//! collector garbage-collects superseded log and data objects once a
//! grace period passes. None of this needs a coordinator: the log is the
//! only shared state, and it's append-only.
//!
//! This crate covers the catalog itself — the log-structured metadata
//! plane and the operations that mutate it. The columnar encoder, the
//! SQL engine behind merges and rewrites, and the batching/ingestion
//! front-end are external collaborators reached through the narrow
//! [`columnar::ColumnarWriter`], [`columnar::ColumnarRewriter`], and
//! [`columnar::SchemaDescriber`] traits; [`columnar::DataFusionColumnar`]
//! is the default, DataFusion-backed implementation of all three.

pub mod collect;
pub mod columnar;
pub mod config;
pub mod error;
pub mod ingest;
pub mod log;
pub mod merge;
pub mod model;
pub mod partition_fn;
pub mod remove;
pub mod rewrite;
pub mod rowset;
pub mod store;

pub use collect::{CollectOutcome, collect_tombstones};
pub use columnar::{ColumnarRewriter, ColumnarWriter, Compression, DataFusionColumnar, SchemaDescriber};
pub use config::{CatalogConfig, MergePolicy};
pub use error::{CatalogError, Result};
pub use ingest::{InsertOptions, insert};
pub use log::FoldedState;
pub use merge::{MergeOutcome, merge as merge_once};
pub use model::{FileMarker, LogTombstone, Schema};
pub use partition_fn::{FnPartitioner, PartitionFunction};
pub use remove::{RemoveOutcome, remove_partitions};
pub use rewrite::{RewriteOutcome, rewrite_partition};
pub use rowset::InsertBatch;
pub use store::ObjectStoreClient;

use std::sync::Arc;

/// A handle bundling an object store client, a configuration, and the
/// external collaborators, exposing the five catalog operations as plain
/// methods. Building one is cheap (it only clones `Arc`s); cloning it is
/// the normal way to share it across `insert` calls running concurrently.
#[derive(Clone)]
pub struct Catalog {
    store: ObjectStoreClient,
    config: CatalogConfig,
    writer: Arc<dyn ColumnarWriter>,
    rewriter: Arc<dyn ColumnarRewriter>,
    describer: Arc<dyn SchemaDescriber>,
}

impl Catalog {
    pub fn new(store: ObjectStoreClient, config: CatalogConfig) -> Self {
        let default = Arc::new(DataFusionColumnar);
        Self {
            store,
            config,
            writer: default.clone(),
            rewriter: default.clone(),
            describer: default,
        }
    }

    /// Swaps in non-default external collaborators (e.g. a rewriter that
    /// proxies to an out-of-process query engine).
    pub fn with_collaborators(
        mut self,
        writer: Arc<dyn ColumnarWriter>,
        rewriter: Arc<dyn ColumnarRewriter>,
        describer: Arc<dyn SchemaDescriber>,
    ) -> Self {
        self.writer = writer;
        self.rewriter = rewriter;
        self.describer = describer;
        self
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn store(&self) -> &ObjectStoreClient {
        &self.store
    }

    /// Folds the log forward to the current live state.
    pub async fn read(&self) -> Result<FoldedState> {
        let keys = log::current_log_keys(&self.store).await?;
        log::fold_forward(&self.store, &keys).await
    }

    /// Inserts `rows`, partitioned by `partition_fn`.
    pub async fn insert(
        &self,
        partition_fn: &dyn PartitionFunction,
        options: &InsertOptions,
        rows: InsertBatch,
        now_ms: i64,
    ) -> Result<Vec<FileMarker>> {
        ingest::insert(
            &self.store,
            &self.config,
            partition_fn,
            self.writer.clone(),
            self.describer.clone(),
            options,
            rows,
            now_ms,
        )
        .await
    }

    /// Runs one merge pass. `custom_query` overrides the default
    /// `SELECT * FROM source_files`.
    pub async fn merge(
        &self,
        policy: MergePolicy,
        custom_query: Option<&str>,
        row_group_size: usize,
        now_ms: i64,
    ) -> Result<Option<MergeOutcome>> {
        merge::merge(
            &self.store,
            &self.config,
            self.rewriter.clone(),
            policy,
            custom_query,
            row_group_size,
            now_ms,
        )
        .await
    }

    /// Tombstones every live file in partitions `predicate` selects.
    pub async fn remove_partitions(
        &self,
        predicate: &dyn Fn(&str) -> bool,
        now_ms: i64,
    ) -> Result<Option<RemoveOutcome>> {
        remove::remove_partitions(&self.store, &self.config, predicate, now_ms).await
    }

    /// Rewrites every live file in `partition` through `query`.
    pub async fn rewrite_partition(
        &self,
        partition: &str,
        query: &str,
        row_group_size: usize,
        now_ms: i64,
    ) -> Result<RewriteOutcome> {
        rewrite::rewrite_partition(
            &self.store,
            &self.config,
            self.rewriter.clone(),
            partition,
            query,
            row_group_size,
            now_ms,
        )
        .await
    }

    /// Runs one tombstone collection pass.
    pub async fn collect_tombstones(
        &self,
        min_age_ms: Option<i64>,
        now_ms: i64,
    ) -> Result<Option<CollectOutcome>> {
        collect::collect_tombstones(&self.store, &self.config, min_age_ms, now_ms).await
    }
}

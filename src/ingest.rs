//! Writer / insert: group rows by partition, invoke the external
//! columnar writer per partition on a bounded worker pool, then append
//! one log object listing the new file markers.

use crate::columnar::{ColumnarWriter, Compression, SchemaDescriber};
use crate::config::CatalogConfig;
use crate::error::{CatalogError, Result};
use crate::log;
use crate::model::{FileMarker, Schema};
use crate::partition_fn::PartitionFunction;
use crate::rowset::InsertBatch;
use crate::store::ObjectStoreClient;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub struct InsertOptions {
    pub sort_order: Vec<String>,
    pub compression: Compression,
    pub row_group_size: usize,
}

impl Default for InsertOptions {
    fn default() -> Self {
        Self {
            sort_order: Vec::new(),
            compression: Compression::Lz4Raw,
            row_group_size: 122_880,
        }
    }
}

/// Inserts `rows`, fanning the per-partition uploads out across up to
/// `config.max_threads` workers. Either the whole operation succeeds and
/// the new log object is visible, or it fails and neither data nor log
/// state changed from a reader's perspective — the log append is the
/// commit point — though a permanently failed bucket upload may still
/// leave an orphan data object behind; the caller is responsible for
/// deciding whether to sweep it.
pub async fn insert(
    store: &ObjectStoreClient,
    config: &CatalogConfig,
    partition_fn: &dyn PartitionFunction,
    writer: Arc<dyn ColumnarWriter>,
    describer: Arc<dyn SchemaDescriber>,
    options: &InsertOptions,
    rows: InsertBatch,
    now_ms: i64,
) -> Result<Vec<FileMarker>> {
    let buckets = rows.group_by_partition(partition_fn)?;
    if buckets.is_empty() {
        return Ok(Vec::new());
    }

    let semaphore = Arc::new(Semaphore::new(config.max_threads.max(1)));
    let mut tasks: JoinSet<Result<(FileMarker, Vec<String>, Vec<String>)>> = JoinSet::new();

    for (partition, batch) in buckets {
        let store = store.clone();
        let semaphore = semaphore.clone();
        let writer = writer.clone();
        let describer = describer.clone();
        let sort_order = options.sort_order.clone();
        let compression = options.compression;
        let row_group_size = options.row_group_size;

        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("semaphore is never closed");

            let (columns, types) = describer.describe(&batch)?;
            let file_id = uuid::Uuid::new_v4();
            let key = format!("_data/{partition}/{file_id}.parquet");
            let schema = batch.schema();
            let file_bytes = writer
                .write(
                    &store,
                    &key,
                    &[batch],
                    schema,
                    &sort_order,
                    compression,
                    row_group_size,
                )
                .await?;

            let marker = FileMarker::new(key, now_ms, file_bytes);
            Ok((marker, columns, types))
        });
    }

    let mut markers = Vec::new();
    let mut running_schema = Schema::new();
    while let Some(res) = tasks.join_next().await {
        let (marker, columns, types) =
            res.map_err(|e| CatalogError::Collaborator(format!("upload task panicked: {e}")))??;
        running_schema.accumulate(&columns, &types)?;
        markers.push(marker);
    }

    let (_key, _header) = log::append(
        store,
        &config.host,
        1,
        &running_schema,
        &markers,
        &[],
        false,
        now_ms,
    )
    .await?;

    Ok(markers)
}

//! Partition rewriter: replace every live file in one partition with the
//! result of a user-supplied SQL query over them. Unlike the merger,
//! cohort selection is fixed (the whole partition) and the query is
//! caller-supplied rather than defaulting to `SELECT *`.

use crate::columnar::ColumnarRewriter;
use crate::config::CatalogConfig;
use crate::error::{CatalogError, Result};
use crate::log;
use crate::model::{FileMarker, LogTombstone};
use crate::store::ObjectStoreClient;
use object_store::ObjectMeta;
use std::collections::HashSet;
use std::sync::Arc;

/// Logical table name a partition rewrite's query addresses: the
/// external rewriter sees the partition's source paths bound to this
/// name.
pub const ROWS_TABLE: &str = "_rows";

pub struct RewriteOutcome {
    pub new_log_key: String,
    pub new_marker: FileMarker,
    pub replaced: Vec<FileMarker>,
}

/// Rewrites every live file in `partition` through `query` (addressed as
/// `_rows`) into a single new file. Errors with
/// [`CatalogError::Collaborator`] if the partition has no live files.
pub async fn rewrite_partition(
    store: &ObjectStoreClient,
    config: &CatalogConfig,
    rewriter: Arc<dyn ColumnarRewriter>,
    partition: &str,
    query: &str,
    row_group_size: usize,
    now_ms: i64,
) -> Result<RewriteOutcome> {
    let keys = log::current_log_keys(store).await?;
    let state = log::fold_forward(store, &keys).await?;

    let replaced: Vec<FileMarker> = state
        .live_files()
        .into_iter()
        .filter(|fm| fm.partition() == Some(partition))
        .cloned()
        .collect();
    if replaced.is_empty() {
        return Err(CatalogError::Collaborator(format!(
            "partition '{partition}' has no live files to rewrite"
        )));
    }

    let source_metas: Vec<ObjectMeta> = replaced
        .iter()
        .map(|fm| ObjectMeta {
            location: store.full_object_path(&fm.path),
            last_modified: chrono::Utc::now(),
            size: fm.file_bytes as usize,
            e_tag: None,
            version: None,
        })
        .collect();

    let file_id = uuid::Uuid::new_v4();
    let dest_key = format!("_data/{partition}/{file_id}.parquet");
    let new_size = rewriter
        .rewrite(
            store,
            &source_metas,
            ROWS_TABLE,
            query,
            &dest_key,
            row_group_size,
        )
        .await?;
    let new_marker = FileMarker::new(dest_key, now_ms, new_size);

    let source_log_keys: Vec<String> = replaced
        .iter()
        .filter_map(|fm| fm.source_log_key.clone())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let source_state = log::fold_forward(store, &source_log_keys).await?;

    let replaced_paths: HashSet<&str> = replaced.iter().map(|fm| fm.path.as_str()).collect();
    let mut markers: Vec<FileMarker> = source_state
        .markers
        .values()
        .map(|fm| {
            if replaced_paths.contains(fm.path.as_str()) {
                fm.tombstoned_at(now_ms)
            } else {
                fm.clone()
            }
        })
        .collect();
    markers.push(new_marker.clone());

    let tombstones: Vec<LogTombstone> = source_log_keys
        .iter()
        .map(|key| LogTombstone::new(key.clone(), now_ms))
        .collect();

    let (new_log_key, _header) = log::append(
        store,
        &config.host,
        1,
        &source_state.schema,
        &markers,
        &tombstones,
        true,
        now_ms,
    )
    .await?;

    Ok(RewriteOutcome {
        new_log_key,
        new_marker,
        replaced,
    })
}

//! Merger: pick a partition, choose a cohort of files by size/count
//! policy, invoke the external rewriter, append a log object that
//! tombstones the cohort's file markers and the log objects that
//! introduced them.

use crate::columnar::ColumnarRewriter;
use crate::config::{CatalogConfig, MergePolicy};
use crate::error::Result;
use crate::log;
use crate::model::{FileMarker, LogMetadata, LogTombstone};
use crate::store::ObjectStoreClient;
use indexmap::IndexMap;
use object_store::ObjectMeta;
use std::collections::HashSet;
use std::sync::Arc;

pub struct MergeOutcome {
    pub new_log_key: String,
    pub new_marker: FileMarker,
    pub partition: String,
    pub cohort: Vec<FileMarker>,
    pub header: LogMetadata,
}

/// Default logical table name a merge's rewrite query addresses.
pub const SOURCE_FILES_TABLE: &str = "source_files";

/// Picks a partition, chooses a cohort, rewrites it, and appends the
/// merge log object. Returns `None` if no partition had a cohort of at
/// least 2 live markers.
pub async fn merge(
    store: &ObjectStoreClient,
    config: &CatalogConfig,
    rewriter: Arc<dyn ColumnarRewriter>,
    policy: MergePolicy,
    custom_query: Option<&str>,
    row_group_size: usize,
    now_ms: i64,
) -> Result<Option<MergeOutcome>> {
    let keys = log::current_log_keys(store).await?;
    let state = log::fold_forward(store, &keys).await?;

    let mut by_partition: IndexMap<String, Vec<FileMarker>> = IndexMap::new();
    for fm in state.live_files() {
        if let Some(part) = fm.partition() {
            by_partition
                .entry(part.to_string())
                .or_default()
                .push(fm.clone());
        }
    }

    let mut partitions: Vec<(String, Vec<FileMarker>)> = by_partition.into_iter().collect();
    // "most files first" is the default (recent activity); ascending
    // selects least-compacted partitions for slow background work.
    partitions.sort_by_key(|(_, markers)| markers.len());
    if !policy.ascending {
        partitions.reverse();
    }

    for (partition, mut markers) in partitions {
        if markers.len() < 2 {
            continue;
        }
        markers.sort_by_key(|m| m.file_bytes);

        let mut acc_bytes: u64 = 0;
        let mut cohort: Vec<FileMarker> = Vec::new();
        for marker in markers {
            acc_bytes += marker.file_bytes;
            cohort.push(marker);
            let count = cohort.len();
            let size_break = acc_bytes >= policy.max_file_size;
            let count_break = count >= 2 && count >= policy.max_file_count;
            if size_break || count_break {
                break;
            }
        }
        if cohort.len() < 2 {
            continue;
        }

        return Ok(Some(
            merge_cohort(
                store,
                config,
                rewriter,
                partition,
                cohort,
                custom_query,
                row_group_size,
                now_ms,
            )
            .await?,
        ));
    }

    Ok(None)
}

async fn merge_cohort(
    store: &ObjectStoreClient,
    config: &CatalogConfig,
    rewriter: Arc<dyn ColumnarRewriter>,
    partition: String,
    cohort: Vec<FileMarker>,
    custom_query: Option<&str>,
    row_group_size: usize,
    now_ms: i64,
) -> Result<MergeOutcome> {
    let source_metas: Vec<ObjectMeta> = cohort
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
    let query = custom_query.unwrap_or("SELECT * FROM source_files");
    let merged_size = rewriter
        .rewrite(
            store,
            &source_metas,
            SOURCE_FILES_TABLE,
            query,
            &dest_key,
            row_group_size,
        )
        .await?;
    let new_marker = FileMarker::new(dest_key, now_ms, merged_size);

    // Re-fold just the cohort's source log objects to recover their
    // schema and the full set of markers they introduced. This keeps the
    // new merge log self-contained without having to carry every
    // historical tombstone forward: fold_forward reads every surviving
    // log object regardless of tombstone status, so the collector is the
    // only place that needs the authoritative, fully-folded view.
    let source_log_keys: Vec<String> = cohort
        .iter()
        .filter_map(|fm| fm.source_log_key.clone())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let source_state = log::fold_forward(store, &source_log_keys).await?;

    let cohort_paths: HashSet<&str> = cohort.iter().map(|fm| fm.path.as_str()).collect();
    let mut markers: Vec<FileMarker> = source_state
        .markers
        .values()
        .map(|fm| {
            if cohort_paths.contains(fm.path.as_str()) {
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

    let (new_log_key, header) = log::append(
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

    Ok(MergeOutcome {
        new_log_key,
        new_marker,
        partition,
        cohort,
        header,
    })
}

//! Partition remover: tombstone every live marker in the partitions a
//! predicate selects, without rewriting any data.

use crate::config::CatalogConfig;
use crate::error::Result;
use crate::log;
use crate::model::LogTombstone;
use crate::store::ObjectStoreClient;
use std::collections::HashSet;

pub struct RemoveOutcome {
    pub new_log_key: String,
    pub removed_partitions: Vec<String>,
    pub tombstoned_markers: usize,
}

/// Tombstones every live marker whose partition satisfies `predicate`. A
/// no-op (returns `None`) if the predicate selects nothing live.
pub async fn remove_partitions(
    store: &ObjectStoreClient,
    config: &CatalogConfig,
    predicate: &dyn Fn(&str) -> bool,
    now_ms: i64,
) -> Result<Option<RemoveOutcome>> {
    let keys = log::current_log_keys(store).await?;
    let state = log::fold_forward(store, &keys).await?;

    let mut removed_partitions: HashSet<String> = HashSet::new();
    let mut removed_paths: HashSet<String> = HashSet::new();
    for fm in state.live_files() {
        let Some(partition) = fm.partition() else {
            continue;
        };
        if predicate(partition) {
            removed_partitions.insert(partition.to_string());
            removed_paths.insert(fm.path.clone());
        }
    }

    if removed_paths.is_empty() {
        return Ok(None);
    }

    // Every log object touched by a removal is about to be named in a
    // log tombstone, which makes it eligible for physical deletion once
    // the grace period passes. The new merge log object must therefore
    // carry every marker those source logs introduced — not just the
    // ones this removal tombstones — or an untouched partition sharing a
    // source log with a removed one would lose its markers the moment
    // that source log is collected. Re-fold the touched source logs
    // directly, the same way merge and rewrite keep their merge log
    // objects self-contained.
    let source_log_keys: Vec<String> = state
        .live_files()
        .into_iter()
        .filter(|fm| removed_paths.contains(&fm.path))
        .filter_map(|fm| fm.source_log_key.clone())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let source_state = log::fold_forward(store, &source_log_keys).await?;

    let markers: Vec<_> = source_state
        .markers
        .values()
        .map(|fm| {
            if removed_paths.contains(&fm.path) {
                fm.tombstoned_at(now_ms)
            } else {
                fm.clone()
            }
        })
        .collect();

    let tombstones: Vec<LogTombstone> = source_log_keys
        .iter()
        .map(|key| LogTombstone::new(key.clone(), now_ms))
        .collect();

    let tombstoned_markers = removed_paths.len();
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

    Ok(Some(RemoveOutcome {
        new_log_key,
        removed_partitions: removed_partitions.into_iter().collect(),
        tombstoned_markers,
    }))
}

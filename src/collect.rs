//! Tombstone collector: walk merge log objects past the grace period,
//! physically delete what they superseded, then fold the survivors into
//! one fresh consolidated merge log object.

use crate::config::CatalogConfig;
use crate::error::Result;
use crate::log;
use crate::model::{FileMarker, LogTombstone, Schema};
use crate::store::ObjectStoreClient;
use indexmap::{IndexMap, IndexSet};

pub struct CollectOutcome {
    pub new_log_key: String,
    pub consolidated_merge_logs: Vec<String>,
    pub deleted_logs: Vec<String>,
    pub deleted_data: Vec<String>,
}

/// Runs one collection pass. `min_age_ms` overrides `config.min_age_ms`
/// when set. Returns `None` if there are no merge log objects to
/// consolidate.
pub async fn collect_tombstones(
    store: &ObjectStoreClient,
    config: &CatalogConfig,
    min_age_ms: Option<i64>,
    now_ms: i64,
) -> Result<Option<CollectOutcome>> {
    let min_age = min_age_ms.unwrap_or(config.min_age_ms);
    let cutoff = now_ms - min_age;

    // Step 1: authoritative live FMs and LTs at time T.
    let keys = log::current_log_keys(store).await?;
    let state = log::fold_forward(store, &keys).await?;

    // Step 2: every merge log object.
    let merge_keys: Vec<String> = keys
        .iter()
        .filter(|k| matches!(crate::log::LogKey::parse(k), Ok(parsed) if parsed.merged))
        .cloned()
        .collect();
    if merge_keys.is_empty() {
        return Ok(None);
    }
    let mut sorted_merge_keys = merge_keys.clone();
    sorted_merge_keys.sort();

    // Step 3: classify each merge object's own LTs and FMs. A source log
    // or data path can legitimately be re-emitted, unchanged, by more
    // than one merge object that's alive at the same time (e.g. two
    // merges on different partitions that happen to share a source log
    // object), so these are sets, not logs of every mention — plain
    // `Vec`s here would report the same physical object deleted once per
    // merge object it appears in.
    let mut delete_logs: IndexSet<String> = IndexSet::new();
    let mut delete_data: IndexSet<String> = IndexSet::new();
    let mut kept_tombstones: IndexMap<String, LogTombstone> = IndexMap::new();
    let mut kept_markers: IndexMap<String, FileMarker> = IndexMap::new();
    let mut schema = Schema::new();

    for key in &sorted_merge_keys {
        let content = log::read_object(store, key).await?;
        schema.merge(&content.schema)?;

        for t in content.tombstones {
            if t.created_ms <= cutoff {
                delete_logs.insert(t.path.clone());
            } else {
                kept_tombstones.insert(t.path.clone(), t);
            }
        }

        for fm in content.markers {
            let effective_tombstone = state
                .markers
                .get(&fm.path)
                .and_then(|authoritative| authoritative.tombstone)
                .or(fm.tombstone);
            match effective_tombstone {
                Some(ts) if ts <= cutoff => {
                    delete_data.insert(fm.path.clone());
                }
                _ => {
                    let latest = state.markers.get(&fm.path).cloned().unwrap_or(fm);
                    kept_markers.insert(latest.path.clone(), latest);
                }
            }
        }
    }

    // Step 4: physically delete.
    let delete_logs: Vec<String> = delete_logs.into_iter().collect();
    let delete_data: Vec<String> = delete_data.into_iter().collect();
    store.delete_many(&delete_logs).await?;
    store.delete_many(&delete_data).await?;

    // Step 5: append the consolidated merge log before touching the
    // objects it just took over responsibility for. A crash between here
    // and step 6 just leaves extra log objects a future fold handles
    // idempotently; a crash before this point would leave dangling
    // references, which is why delete always follows append, never the
    // other way round.
    let markers: Vec<FileMarker> = kept_markers.into_values().collect();
    let tombstones: Vec<LogTombstone> = kept_tombstones.into_values().collect();
    let (new_log_key, _header) = log::append(
        store,
        &config.host,
        1,
        &schema,
        &markers,
        &tombstones,
        true,
        now_ms,
    )
    .await?;

    // Step 6: delete the merge log objects just consolidated.
    store.delete_many(&sorted_merge_keys).await?;

    Ok(Some(CollectOutcome {
        new_log_key,
        consolidated_merge_logs: sorted_merge_keys,
        deleted_logs: delete_logs,
        deleted_data: delete_data,
    }))
}

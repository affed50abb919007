use super::key::LogKey;
use crate::error::{CatalogError, Result};
use crate::model::{FileMarker, LogMetadata, LogTombstone, Schema};
use crate::store::ObjectStoreClient;
use indexmap::IndexMap;

/// Result of folding a set of log objects forward: the accumulated
/// schema, the latest record for every marker path observed (alive and
/// tombstoned — callers that only want the live set should call
/// [`FoldedState::live_files`]), the latest record for every log
/// tombstone, and the ascending-sorted keys that were folded.
#[derive(Debug, Clone)]
pub struct FoldedState {
    pub schema: Schema,
    pub markers: IndexMap<String, FileMarker>,
    pub tombstones: IndexMap<String, LogTombstone>,
    pub log_keys: Vec<String>,
}

impl FoldedState {
    pub fn live_files(&self) -> Vec<&FileMarker> {
        self.markers.values().filter(|m| m.is_alive()).collect()
    }

    pub fn is_log_tombstoned(&self, log_key: &str) -> bool {
        self.tombstones.contains_key(log_key)
    }
}

/// Lists every key under `_log/`.
pub async fn current_log_keys(store: &ObjectStoreClient) -> Result<Vec<String>> {
    let listed = store.list("_log").await?;
    Ok(listed.into_iter().map(|o| o.key).collect())
}

/// Lists the log keys a reader needs to fold, skipping log objects whose
/// effects are provably superseded.
///
/// A log object's key does not embed which older timestamp it
/// supersedes — only whether it is a merge object at all (the `_m`
/// flag). Telling "this merge object is a full consolidation of
/// everything before it" from "this merge object only tombstoned a few
/// partitions' worth of log objects" requires reading the object's own
/// tombstone lines, not just its key. So this helper conservatively
/// returns the same listing as [`current_log_keys`]; it exists as a
/// named extension point for a future backend (e.g. one that also
/// records the superseded threshold in the key) to plug in a real
/// short-circuit without changing any caller. [`fold_forward`] is
/// always correct over the full listing regardless.
pub async fn list_relevant(store: &ObjectStoreClient) -> Result<Vec<String>> {
    current_log_keys(store).await
}

/// One log object's own content, independent of any other object —
/// used by tombstone collection to read each merge object's own log
/// tombstones and file markers.
pub struct LogObjectContent {
    pub schema: Schema,
    pub tombstones: Vec<LogTombstone>,
    pub markers: Vec<FileMarker>,
}

/// Reads and parses a single log object's lines by the fixed section
/// layout (header, schema, tombstones?, markers).
pub async fn read_object(store: &ObjectStoreClient, key: &str) -> Result<LogObjectContent> {
    let bytes = store.get(key).await?;
    let text =
        std::str::from_utf8(&bytes).map_err(|_| corrupt(key, "log object is not valid utf-8"))?;
    let lines: Vec<&str> = text.split('\n').collect();

    let header_line = lines
        .first()
        .ok_or_else(|| corrupt(key, "empty log object"))?;
    let header: LogMetadata = serde_json::from_str(header_line)?;

    let schema_line = lines
        .get(header.schema_line_index)
        .ok_or_else(|| corrupt(key, "missing schema line"))?;
    let schema = Schema::from_json(schema_line)?;

    let mut tombstones = Vec::new();
    if let Some(tmb_idx) = header.tombstone_line_index {
        for i in tmb_idx..header.file_line_index {
            let line = lines
                .get(i)
                .ok_or_else(|| corrupt(key, "tombstone section truncated"))?;
            tombstones.push(serde_json::from_str(line)?);
        }
    }

    let mut markers = Vec::new();
    for line in lines.iter().skip(header.file_line_index) {
        if line.is_empty() {
            continue;
        }
        let mut fm: FileMarker = serde_json::from_str(line)?;
        fm.source_log_key = Some(key.to_string());
        markers.push(fm);
    }

    Ok(LogObjectContent {
        schema,
        tombstones,
        markers,
    })
}

/// Reads each key in ascending order, accumulating schema, the latest
/// marker per path, and the latest log tombstone per path.
pub async fn fold_forward(store: &ObjectStoreClient, keys: &[String]) -> Result<FoldedState> {
    if keys.is_empty() {
        return Err(CatalogError::NoLogs);
    }
    let mut sorted: Vec<String> = keys.to_vec();
    sorted.sort();

    let mut schema = Schema::new();
    let mut markers: IndexMap<String, FileMarker> = IndexMap::new();
    let mut tombstones: IndexMap<String, LogTombstone> = IndexMap::new();

    for key in &sorted {
        let content = read_object(store, key).await?;
        schema.merge(&content.schema)?;
        for t in content.tombstones {
            tombstones.insert(t.path.clone(), t);
        }
        for fm in content.markers {
            markers.insert(fm.path.clone(), fm);
        }
    }

    Ok(FoldedState {
        schema,
        markers,
        tombstones,
        log_keys: sorted,
    })
}

/// Lists log keys, drops those whose embedded timestamp is `>= t`, then
/// folds forward. Used to bound "now" against clock skew; a caller
/// typically passes the current time.
pub async fn read_at_max_time(store: &ObjectStoreClient, t_ms: i64) -> Result<FoldedState> {
    let keys = current_log_keys(store).await?;
    let mut filtered = Vec::with_capacity(keys.len());
    for key in keys {
        let parsed = LogKey::parse(&key)?;
        if parsed.timestamp_ms < t_ms {
            filtered.push(key);
        }
    }
    fold_forward(store, &filtered).await
}

fn corrupt(key: &str, reason: &str) -> CatalogError {
    CatalogError::Corruption {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::writer::append;
    use object_store::memory::InMemory;
    use std::sync::Arc;

    fn store() -> ObjectStoreClient {
        ObjectStoreClient::new(Arc::new(InMemory::new()), "tenant")
    }

    #[tokio::test]
    async fn fold_forward_on_no_keys_errors() {
        let store = store();
        let err = fold_forward(&store, &[]).await.unwrap_err();
        assert!(matches!(err, CatalogError::NoLogs));
    }

    #[tokio::test]
    async fn current_log_keys_on_empty_bucket_yields_empty_and_fold_errors() {
        let store = store();
        let keys = current_log_keys(&store).await.unwrap();
        assert!(keys.is_empty());
        assert!(fold_forward(&store, &keys).await.is_err());
    }

    #[tokio::test]
    async fn later_marker_for_same_path_overwrites_earlier() {
        let store = store();
        let mut schema = Schema::new();
        schema.accumulate(&["a".into()], &["INT".into()]).unwrap();

        let m1 = FileMarker::new("_data/p/f.parquet", 10, 100);
        append(&store, "h", 1, &schema, &[m1.clone()], &[], false, 1000)
            .await
            .unwrap();

        let m1_tombstoned = m1.tombstoned_at(2000);
        append(
            &store,
            "h",
            1,
            &schema,
            &[m1_tombstoned.clone()],
            &[],
            false,
            2000,
        )
        .await
        .unwrap();

        let keys = current_log_keys(&store).await.unwrap();
        let state = fold_forward(&store, &keys).await.unwrap();
        assert_eq!(state.markers.len(), 1);
        assert!(!state.markers["_data/p/f.parquet"].is_alive());
        assert!(state.live_files().is_empty());
    }

    #[tokio::test]
    async fn read_at_max_time_excludes_keys_at_or_after_cutoff() {
        let store = store();
        let schema = Schema::new();
        let m1 = FileMarker::new("_data/p/a.parquet", 10, 1);
        let m2 = FileMarker::new("_data/p/b.parquet", 20, 1);
        append(&store, "h", 1, &schema, &[m1], &[], false, 1000)
            .await
            .unwrap();
        append(&store, "h", 1, &schema, &[m2], &[], false, 2000)
            .await
            .unwrap();

        let state = read_at_max_time(&store, 2000).await.unwrap();
        assert_eq!(state.markers.len(), 1);
        assert!(state.markers.contains_key("_data/p/a.parquet"));
    }

    #[tokio::test]
    async fn schema_conflict_during_fold_is_surfaced() {
        let store = store();
        let mut s1 = Schema::new();
        s1.accumulate(&["a".into()], &["INT".into()]).unwrap();
        let mut s2 = Schema::new();
        s2.accumulate(&["a".into()], &["VARCHAR".into()]).unwrap();

        append(
            &store,
            "h",
            1,
            &s1,
            &[FileMarker::new("_data/p/a.parquet", 1, 1)],
            &[],
            false,
            1000,
        )
        .await
        .unwrap();
        append(
            &store,
            "h",
            1,
            &s2,
            &[FileMarker::new("_data/p/b.parquet", 1, 1)],
            &[],
            false,
            2000,
        )
        .await
        .unwrap();

        let keys = current_log_keys(&store).await.unwrap();
        let err = fold_forward(&store, &keys).await.unwrap_err();
        assert!(matches!(err, CatalogError::SchemaConflict { .. }));
    }
}

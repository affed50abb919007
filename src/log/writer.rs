use super::key::LogKey;
use crate::error::Result;
use crate::model::{FileMarker, LogMetadata, LogTombstone, Schema};
use crate::store::ObjectStoreClient;
use bytes::Bytes;

/// Serializes and uploads a new log object with the fixed section order
/// (header, schema, tombstones?, markers) and a globally-ordered
/// filename.
///
/// Returns the key the object was written under and the header that was
/// embedded in it.
#[allow(clippy::too_many_arguments)]
pub async fn append(
    store: &ObjectStoreClient,
    host: &str,
    version: u32,
    schema: &Schema,
    markers: &[FileMarker],
    tombstones: &[LogTombstone],
    merged: bool,
    timestamp_ms: i64,
) -> Result<(String, LogMetadata)> {
    let header = LogMetadata::build(version, tombstones.len(), markers.len(), timestamp_ms);

    let mut lines = Vec::with_capacity(2 + tombstones.len() + markers.len());
    lines.push(serde_json::to_string(&header)?);
    lines.push(schema.to_json()?);
    for tombstone in tombstones {
        lines.push(serde_json::to_string(tombstone)?);
    }
    for marker in markers {
        lines.push(serde_json::to_string(marker)?);
    }

    let key = LogKey::new(timestamp_ms, merged, host).to_key();
    store.put(&key, Bytes::from(lines.join("\n"))).await?;
    tracing::info!(key = %key, markers = markers.len(), tombstones = tombstones.len(), merged, "appended log object");
    Ok((key, header))
}

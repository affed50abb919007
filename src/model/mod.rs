//! On-disk record shapes for log objects.
//!
//! Field names are kept short (`p`, `b`, `t`, `tmb`, `v`, `sch`, `f`) to
//! keep log objects compact on the wire.

mod schema;

pub use schema::Schema;

use serde::{Deserialize, Serialize};

/// Durable record of a data object's existence and optional tombstone.
///
/// A marker is alive iff `tombstone` is `None`. `source_log_key` is the
/// key of the log object this marker was read from; it is populated only
/// during folding, as a transient back-reference, and is never part of
/// the serialized form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMarker {
    #[serde(rename = "p")]
    pub path: String,

    #[serde(rename = "b")]
    pub file_bytes: u64,

    #[serde(rename = "t")]
    pub created_ms: i64,

    #[serde(rename = "tmb", skip_serializing_if = "Option::is_none")]
    pub tombstone: Option<i64>,

    #[serde(skip)]
    pub source_log_key: Option<String>,
}

impl FileMarker {
    pub fn new(path: impl Into<String>, created_ms: i64, file_bytes: u64) -> Self {
        Self {
            path: path.into(),
            file_bytes,
            created_ms,
            tombstone: None,
            source_log_key: None,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.tombstone.is_none()
    }

    /// Returns a copy tombstoned at `at_ms`. A no-op if already
    /// tombstoned: a marker transitions alive -> tombstoned exactly once,
    /// so re-tombstoning is idempotent rather than moving the timestamp.
    #[must_use]
    pub fn tombstoned_at(&self, at_ms: i64) -> Self {
        let mut copy = self.clone();
        if copy.tombstone.is_none() {
            copy.tombstone = Some(at_ms);
        }
        copy
    }

    /// Recovers the partition string by stripping the `_data/` prefix and
    /// the filename component.
    pub fn partition(&self) -> Option<&str> {
        let rest = self.path.strip_prefix("_data/").or_else(|| {
            self.path
                .split_once("/_data/")
                .map(|(_, rest)| rest)
        })?;
        let (dir, _file) = rest.rsplit_once('/')?;
        Some(dir)
    }
}

/// Durable record that a previous log object's effects have been
/// superseded by a merge log object. The only way to delete a log object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogTombstone {
    #[serde(rename = "p")]
    pub path: String,

    #[serde(rename = "t")]
    pub created_ms: i64,
}

impl LogTombstone {
    pub fn new(path: impl Into<String>, created_ms: i64) -> Self {
        Self {
            path: path.into(),
            created_ms,
        }
    }
}

/// First line of every log object. Section order is fixed: header,
/// schema, (optional) tombstones, markers. The indices let a reader seek
/// to each section without scanning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMetadata {
    #[serde(rename = "v")]
    pub version: u32,

    #[serde(rename = "sch")]
    pub schema_line_index: usize,

    #[serde(rename = "f")]
    pub file_line_index: usize,

    #[serde(rename = "tmb", skip_serializing_if = "Option::is_none")]
    pub tombstone_line_index: Option<usize>,

    #[serde(rename = "t")]
    pub timestamp: i64,
}

impl LogMetadata {
    /// Builds the header for a log object with `tombstones_len` tombstone
    /// lines and `markers_len` marker lines, following the fixed
    /// layout: line 0 is this header, line 1 is the schema, lines
    /// `[2, 2+tombstones_len)` are tombstones (only present when
    /// `tombstones_len > 0`), and the remaining lines are markers.
    pub fn build(version: u32, tombstones_len: usize, markers_len: usize, timestamp: i64) -> Self {
        let _ = markers_len;
        let schema_line_index = 1;
        let (tombstone_line_index, file_line_index) = if tombstones_len == 0 {
            (None, 2)
        } else {
            (Some(2), 2 + tombstones_len)
        };
        Self {
            version,
            schema_line_index,
            file_line_index,
            tombstone_line_index,
            timestamp,
        }
    }
}

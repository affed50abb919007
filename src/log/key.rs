//! Log object key encoding/decoding: `_log/<ts>[_m]_<host>.jsonl`.
//!
//! `<ts>` is zero-padded so keys sort lexicographically in the same order
//! as their creation timestamps.

use crate::error::{CatalogError, Result};

/// Width chosen so every millisecond timestamp between the epoch and the
/// year ~5138 zero-pads to the same length; comfortably larger than any
/// real timestamp while staying a fixed, auditable constant.
const TIMESTAMP_WIDTH: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogKey {
    pub timestamp_ms: i64,
    pub merged: bool,
    pub host: String,
}

impl LogKey {
    pub fn new(timestamp_ms: i64, merged: bool, host: impl Into<String>) -> Self {
        Self {
            timestamp_ms,
            merged,
            host: host.into(),
        }
    }

    /// The full key, including the `_log/` directory prefix.
    pub fn to_key(&self) -> String {
        let merge_tag = if self.merged { "_m" } else { "" };
        format!(
            "_log/{:0width$}{merge_tag}_{}.jsonl",
            self.timestamp_ms,
            self.host,
            width = TIMESTAMP_WIDTH
        )
    }

    /// Parses a key as returned by [`crate::store::ObjectStoreClient::list`]
    /// (i.e. relative to the tenant root, including the `_log/` prefix).
    pub fn parse(key: &str) -> Result<Self> {
        let file_name = key
            .strip_prefix("_log/")
            .ok_or_else(|| corrupt(key, "missing _log/ prefix"))?;
        let stem = file_name
            .strip_suffix(".jsonl")
            .ok_or_else(|| corrupt(key, "missing .jsonl suffix"))?;
        let (ts_part, rest) = stem
            .split_once('_')
            .ok_or_else(|| corrupt(key, "missing host separator"))?;
        let timestamp_ms: i64 = ts_part
            .parse()
            .map_err(|_| corrupt(key, "non-numeric timestamp"))?;
        let (merged, host) = match rest.strip_prefix("m_") {
            Some(host) => (true, host),
            None => (false, rest),
        };
        if host.is_empty() {
            return Err(corrupt(key, "empty host"));
        }
        Ok(Self {
            timestamp_ms,
            merged,
            host: host.to_string(),
        })
    }
}

fn corrupt(key: &str, reason: &str) -> CatalogError {
    CatalogError::Corruption {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

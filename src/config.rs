use serde::{Deserialize, Serialize};

/// Operator-chosen knobs that shape how the catalog lays out keys and
/// bounds background work. Plain data: no CLI parsing lives here (the
/// CLI/config front-end is an external collaborator per the spec), but
/// every embedder needs a value of this shape to construct a [`crate::Catalog`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Key prefix under the bucket root, e.g. `"tenant-42"`.
    pub prefix: String,

    /// Path-safe identifier unique to this writer process, used as the
    /// object-key disambiguator that breaks ties between writers whose
    /// log objects land in the same millisecond.
    pub host: String,

    /// Upper bound on concurrent per-partition upload workers during
    /// insert's fan-out.
    pub max_threads: usize,

    /// Minimum age, in milliseconds, a tombstoned object must reach
    /// before the collector may physically delete it. Should exceed the
    /// longest a concurrent reader is expected to take.
    pub min_age_ms: i64,

    /// Default merge policy applied when callers don't override it.
    pub merge_policy: MergePolicy,
}

impl CatalogConfig {
    pub fn new(prefix: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            host: host.into(),
            max_threads: 8,
            min_age_ms: 24 * 60 * 60 * 1000,
            merge_policy: MergePolicy::default(),
        }
    }
}

/// Cohort-selection policy used by the merger.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MergePolicy {
    pub max_file_size: u64,
    pub max_file_count: usize,
    /// Partition iteration order: `false` = most files first (recent
    /// activity), `true` = fewest files first (slow background sweep).
    pub ascending: bool,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            max_file_size: 10_000_000,
            max_file_count: 10,
            ascending: false,
        }
    }
}

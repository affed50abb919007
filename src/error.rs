use thiserror::Error;

/// Errors surfaced by catalog operations.
///
/// Transient object-store errors are retried below this layer (inside the
/// default [`crate::columnar`] writer); everything that reaches a caller
/// here is either terminal I/O, a semantic violation, or a corrupted log
/// object.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// No log objects were found under `_log/` (or none survive a
    /// `read_at_max_time` cutoff).
    #[error("no log objects found")]
    NoLogs,

    /// A column was observed with two different types across the fold.
    /// `previous` and `found` are the conflicting type strings, in the
    /// order they were observed.
    #[error("schema conflict on column '{column}': {previous} vs {found}")]
    SchemaConflict {
        column: String,
        previous: String,
        found: String,
    },

    /// A log object's internal structure violates the fixed section
    /// order (missing schema line, indices out of range, ...).
    #[error("corrupt log object {key}: {reason}")]
    Corruption { key: String, reason: String },

    /// The external columnar writer or rewriter failed.
    #[error("collaborator failure: {0}")]
    Collaborator(String),

    /// An unsupported or invalid compression codec was requested.
    #[error("invalid compression codec: {0}")]
    InvalidCompression(String),

    /// Object store transport error (terminal, after any internal retry
    /// budget for uploads has been exhausted).
    #[error("object store error: {0}")]
    Store(#[from] object_store::Error),

    /// A path could not be parsed as an object store key.
    #[error("invalid object path: {0}")]
    Path(#[from] object_store::path::Error),

    /// Malformed JSON within a log object line.
    #[error("malformed log record: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

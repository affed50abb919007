//! The log-structured metadata plane: key encoding, the writer that
//! appends new log objects, and the reader that folds them forward into
//! current state.

pub mod key;
pub mod reader;
pub mod writer;

pub use key::LogKey;
pub use reader::{
    FoldedState, LogObjectContent, current_log_keys, fold_forward, list_relevant,
    read_at_max_time, read_object,
};
pub use writer::append;

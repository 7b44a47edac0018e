//! Local side of snapshot transfers.
//!
//! - [`TransferScheduler`]: bounded-concurrency parallel map shared by
//!   uploads and downloads.
//! - [`ProgressSink`]: per-transfer byte progress events.
//! - [`ContentStore`]: digest -> local path resolution and manifest index.
//! - Digest verification and data path validation.

mod checksum;
mod progress;
mod scheduler;
mod store;
mod task;
mod validation;

pub use checksum::{checksum_bytes, file_digest, verify_file};
pub use progress::{
    ChannelProgress, LogProgress, NoProgress, ProgressSink, SpeedCalculator, TransferEvent,
    TransferProgress,
};
pub use scheduler::{FailurePolicy, ScheduleError, ScheduleReport, TaskOutcome, TransferScheduler};
pub use store::{ContentStore, FsContentStore, SnapshotIndex, SnapshotIndexEntry};
pub use task::TransferTask;
pub use validation::{validate_data_path, validate_segment};

/// Buffer size for streaming file bodies (256 KiB).
pub const STREAM_BUFFER_SIZE: usize = 256 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("digest mismatch for {path}: expected {expected}, got {actual}")]
    DigestMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("size mismatch for {path}: expected {expected}, got {actual}")]
    SizeMismatch {
        path: String,
        expected: u64,
        actual: u64,
    },

    #[error("concurrency limit must be at least 1, got {0}")]
    InvalidConcurrency(usize),

    #[error("manifest error: {0}")]
    Manifest(#[from] datasync_protocol::ProtocolError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

use std::path::PathBuf;

/// Result of a successful upload session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The peer already had the snapshot; nothing was sent.
    AlreadyReplicated,
    /// Every file is on the peer and the session was committed.
    Committed {
        session_id: String,
        /// Files whose bodies were sent.
        uploaded: usize,
        /// Files the peer already held for this session.
        skipped: usize,
        /// Body bytes sent.
        bytes: u64,
    },
}

/// Result of a successful download session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// Distinct files fetched.
    pub files: usize,
    pub bytes: u64,
    /// Where the manifest was persisted.
    pub manifest_path: PathBuf,
    /// Snapshots listed in the regenerated index.
    pub snapshots: usize,
}

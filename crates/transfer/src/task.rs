use std::collections::HashSet;

use datasync_protocol::{FileRecord, Manifest, label_for_key};

use crate::ContentStore;

/// One independent file transfer, produced by expanding a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTask {
    /// Display name decoded from the file key.
    pub label: String,
    /// Content-store relative path derived from the digest.
    pub data_path: String,
    /// Digest and size named by the manifest.
    pub record: FileRecord,
}

impl TransferTask {
    /// Expands manifest entries into tasks, in key order.
    ///
    /// Keys sharing a digest share one stored file, so only the first of
    /// them produces a task.
    pub fn from_manifest(manifest: &Manifest, store: &dyn ContentStore) -> Vec<TransferTask> {
        let mut seen = HashSet::new();
        manifest
            .iter()
            .filter(|(_, record)| seen.insert(record.sha256.as_str()))
            .map(|(key, record)| TransferTask {
                label: label_for_key(key),
                data_path: store.data_path(&record.sha256),
                record: record.clone(),
            })
            .collect()
    }
}

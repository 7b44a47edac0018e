//! Local content-addressed store.
//!
//! Layout under the store root:
//!
//! ```text
//! data/<d[0..2]>/<d[2..4]>/<digest>        file bodies, keyed by sha256
//! manifests/<storeId>/<rootHash>.dat       one manifest per snapshot
//! manifests/<storeId>/index.json           regenerated after each pull
//! ```

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use chrono::{DateTime, Utc};
use datasync_protocol::Manifest;
use datasync_protocol::constants::MANIFEST_EXTENSION;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{TransferError, validate_data_path, validate_segment};

const DATA_DIR: &str = "data";
const MANIFESTS_DIR: &str = "manifests";
const INDEX_FILE: &str = "index.json";

/// Resolves digests to local paths and maintains the snapshot index.
///
/// Implemented by [`FsContentStore`]; sessions only see this trait so an
/// embedding application can supply its own layout.
pub trait ContentStore: Send + Sync {
    /// Content-store relative path for a digest.
    fn data_path(&self, sha256: &str) -> String;

    /// Absolute local path for a data path, rejecting traversal.
    fn local_path(&self, data_path: &str) -> Result<PathBuf, TransferError>;

    /// Canonical local path of the manifest for one snapshot.
    fn manifest_path(&self, store_id: &str, root_hash: &str) -> Result<PathBuf, TransferError>;

    /// Rebuilds the local index of snapshots held for `store_id`.
    fn regenerate_index<'a>(
        &'a self,
        store_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<SnapshotIndex, TransferError>> + Send + 'a>>;
}

/// One snapshot listed in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotIndexEntry {
    pub root_hash: String,
    pub files: usize,
    pub bytes: u64,
}

/// Contents of `manifests/<storeId>/index.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotIndex {
    pub store_id: String,
    pub regenerated_at: DateTime<Utc>,
    pub snapshots: Vec<SnapshotIndexEntry>,
}

/// Filesystem-backed [`ContentStore`].
#[derive(Debug, Clone)]
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn manifests_dir(&self, store_id: &str) -> Result<PathBuf, TransferError> {
        validate_segment(store_id)?;
        Ok(self.root.join(MANIFESTS_DIR).join(store_id))
    }

    async fn build_index(&self, store_id: &str) -> Result<SnapshotIndex, TransferError> {
        let dir = self.manifests_dir(store_id)?;
        tokio::fs::create_dir_all(&dir).await?;

        let mut snapshots = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(MANIFEST_EXTENSION) {
                continue;
            }
            let Some(root_hash) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let bytes = tokio::fs::read(&path).await?;
            match Manifest::from_slice(&bytes) {
                Ok(manifest) => snapshots.push(SnapshotIndexEntry {
                    root_hash: root_hash.to_string(),
                    files: manifest.len(),
                    bytes: manifest.total_size(),
                }),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable manifest");
                }
            }
        }
        snapshots.sort_by(|a, b| a.root_hash.cmp(&b.root_hash));

        let index = SnapshotIndex {
            store_id: store_id.to_string(),
            regenerated_at: Utc::now(),
            snapshots,
        };
        let json = serde_json::to_vec_pretty(&index)?;
        tokio::fs::write(dir.join(INDEX_FILE), json).await?;

        debug!(store = %store_id, snapshots = index.snapshots.len(), "index regenerated");
        Ok(index)
    }
}

impl ContentStore for FsContentStore {
    fn data_path(&self, sha256: &str) -> String {
        match (sha256.get(0..2), sha256.get(2..4)) {
            (Some(a), Some(b)) => format!("{DATA_DIR}/{a}/{b}/{sha256}"),
            _ => format!("{DATA_DIR}/{sha256}"),
        }
    }

    fn local_path(&self, data_path: &str) -> Result<PathBuf, TransferError> {
        validate_data_path(data_path)?;
        Ok(self.root.join(data_path))
    }

    fn manifest_path(&self, store_id: &str, root_hash: &str) -> Result<PathBuf, TransferError> {
        validate_segment(root_hash)?;
        Ok(self
            .manifests_dir(store_id)?
            .join(Manifest::file_name(root_hash)))
    }

    fn regenerate_index<'a>(
        &'a self,
        store_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<SnapshotIndex, TransferError>> + Send + 'a>> {
        Box::pin(self.build_index(store_id))
    }
}

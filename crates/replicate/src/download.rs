//! Pull one snapshot from a peer into the local content store.

use datasync_peer::PeerError;
use datasync_protocol::Manifest;
use datasync_transfer::{
    ContentStore, NoProgress, ProgressSink, ScheduleError, TransferTask, verify_file,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::connection::PeerConnection;
use crate::error::SyncError;
use crate::types::DownloadOutcome;

/// Drives one download of `(store_id, root_hash)` from one peer.
///
/// The manifest is only persisted once every file has landed, so an
/// aborted download never shows up in the local index. File bodies
/// written before the abort stay on disk; a re-run overwrites them.
pub struct DownloadSession<'a> {
    peer: &'a dyn PeerConnection,
    store: &'a dyn ContentStore,
    progress: &'a dyn ProgressSink,
    config: &'a SyncConfig,
    cancel: CancellationToken,
}

impl<'a> DownloadSession<'a> {
    pub fn new(
        peer: &'a dyn PeerConnection,
        store: &'a dyn ContentStore,
        config: &'a SyncConfig,
    ) -> Self {
        Self {
            peer,
            store,
            progress: &NoProgress,
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_progress(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn run(&self, store_id: &str, root_hash: &str) -> Result<DownloadOutcome, SyncError> {
        self.config.validate()?;
        self.check_cancelled()?;

        let probe = self
            .peer
            .probe_store(store_id, Some(root_hash))
            .await
            .map_err(SyncError::Probe)?;
        if !(probe.store_exists && probe.root_hash_exists) {
            return Err(SyncError::NotFound {
                store_id: store_id.to_string(),
                root_hash: root_hash.to_string(),
            });
        }

        let manifest_name = Manifest::file_name(root_hash);
        let manifest_bytes = self
            .peer
            .fetch_manifest(store_id, root_hash, self.progress)
            .await
            .map_err(|source| SyncError::Transfer {
                path: manifest_name.clone(),
                source,
            })?;
        let manifest = Manifest::from_slice(&manifest_bytes)?;

        let tasks = TransferTask::from_manifest(&manifest, self.store);
        info!(
            peer = %self.peer.address(),
            store = %store_id,
            root_hash = %root_hash,
            files = tasks.len(),
            bytes = manifest.total_size(),
            "downloading snapshot"
        );

        let scheduler = self.config.download_scheduler(&self.cancel)?;
        let report = scheduler
            .run(tasks, |task| self.download_one(store_id, task))
            .await;
        let sizes = match report.into_result() {
            Ok(sizes) => sizes,
            Err(ScheduleError::Failed(err)) => {
                warn!(store = %store_id, root_hash = %root_hash, error = %err, "download aborted");
                return Err(err);
            }
            Err(ScheduleError::Interrupted) => return Err(SyncError::Cancelled),
        };
        self.check_cancelled()?;

        let manifest_path = self.store.manifest_path(store_id, root_hash)?;
        if let Some(parent) = manifest_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&manifest_path, &manifest_bytes).await?;
        let index = self.store.regenerate_index(store_id).await?;

        let outcome = DownloadOutcome {
            files: sizes.len(),
            bytes: sizes.iter().sum(),
            manifest_path,
            snapshots: index.snapshots.len(),
        };
        info!(
            store = %store_id,
            root_hash = %root_hash,
            files = outcome.files,
            bytes = outcome.bytes,
            "snapshot downloaded"
        );
        Ok(outcome)
    }

    async fn download_one(&self, store_id: &str, task: TransferTask) -> Result<u64, SyncError> {
        let dest = self.store.local_path(&task.data_path)?;
        let transfer_failed = |source: PeerError| SyncError::Transfer {
            path: task.data_path.clone(),
            source,
        };

        let written = self
            .peer
            .download_file(store_id, &task.data_path, &dest, self.progress, &task.label)
            .await
            .map_err(transfer_failed)?;

        if self.config.verify_downloads
            && let Err(e) = verify_file(&dest, &task.record).await
        {
            let _ = tokio::fs::remove_file(&dest).await;
            return Err(transfer_failed(PeerError::Transfer(e)));
        }
        debug!(path = %task.data_path, label = %task.label, bytes = written, "file downloaded");
        Ok(written)
    }

    fn check_cancelled(&self) -> Result<(), SyncError> {
        if self.cancel.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }
}

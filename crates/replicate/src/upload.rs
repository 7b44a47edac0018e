//! Push one snapshot to a peer.
//!
//! States: probed, credentials acquired (only for a new store), session
//! started, uploading, committed. Any failure aborts the session before
//! commit; the peer never sees a partial snapshot as existing.

use datasync_peer::{Credentials, PeerError, UploadAuth};
use datasync_protocol::constants::HEADER_NONCE;
use datasync_protocol::{Manifest, ProtocolError};
use datasync_transfer::{ContentStore, NoProgress, ProgressSink, ScheduleError, TransferTask};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::{AuthSigner, CredentialPrompt};
use crate::config::SyncConfig;
use crate::connection::PeerConnection;
use crate::error::SyncError;
use crate::types::UploadOutcome;

/// What happened to one file of the snapshot.
enum FileUpload {
    Skipped,
    Sent(u64),
}

/// Drives one upload of `(store_id, root_hash)` to one peer.
pub struct UploadSession<'a> {
    peer: &'a dyn PeerConnection,
    store: &'a dyn ContentStore,
    signer: &'a dyn AuthSigner,
    prompt: &'a dyn CredentialPrompt,
    progress: &'a dyn ProgressSink,
    config: &'a SyncConfig,
    cancel: CancellationToken,
}

impl<'a> UploadSession<'a> {
    pub fn new(
        peer: &'a dyn PeerConnection,
        store: &'a dyn ContentStore,
        signer: &'a dyn AuthSigner,
        prompt: &'a dyn CredentialPrompt,
        config: &'a SyncConfig,
    ) -> Self {
        Self {
            peer,
            store,
            signer,
            prompt,
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

    /// Runs the whole session.
    pub async fn run(&self, store_id: &str, root_hash: &str) -> Result<UploadOutcome, SyncError> {
        self.config.validate()?;
        self.check_cancelled()?;

        let probe = self
            .peer
            .probe_store(store_id, Some(root_hash))
            .await
            .map_err(SyncError::Probe)?;
        if probe.root_hash_exists {
            info!(peer = %self.peer.address(), store = %store_id, root_hash = %root_hash, "snapshot already replicated");
            return Ok(UploadOutcome::AlreadyReplicated);
        }

        let credentials = if probe.store_exists {
            None
        } else {
            info!(peer = %self.peer.address(), store = %store_id, "store unknown to peer, credentials required");
            let creds = self
                .prompt
                .ask(self.peer.address())
                .await
                .map_err(SyncError::Credentials)?;
            Some(creds)
        };

        self.check_cancelled()?;
        let (session_id, manifest) = self
            .start(store_id, root_hash, credentials.as_ref())
            .await?;

        let tasks = TransferTask::from_manifest(&manifest, self.store);
        info!(
            store = %store_id,
            session = %session_id,
            files = tasks.len(),
            bytes = manifest.total_size(),
            "uploading snapshot"
        );

        let scheduler = self.config.upload_scheduler(&self.cancel)?;
        let report = scheduler
            .run(tasks, |task| self.upload_one(store_id, &session_id, task))
            .await;
        let results = match report.into_result() {
            Ok(results) => results,
            Err(ScheduleError::Failed(err)) => {
                warn!(store = %store_id, session = %session_id, error = %err, "upload aborted, session not committed");
                return Err(err);
            }
            Err(ScheduleError::Interrupted) => return Err(SyncError::Cancelled),
        };
        self.check_cancelled()?;

        let (mut uploaded, mut skipped, mut bytes) = (0, 0, 0);
        for result in results {
            match result {
                FileUpload::Skipped => skipped += 1,
                FileUpload::Sent(n) => {
                    uploaded += 1;
                    bytes += n;
                }
            }
        }

        let commit = self
            .peer
            .commit(store_id, &session_id, credentials.as_ref())
            .await
            .map_err(SyncError::Commit)?;
        if commit.is_rejected() {
            let reason = commit
                .message
                .unwrap_or_else(|| "committed: false".to_string());
            return Err(SyncError::CommitRejected(reason));
        }

        info!(store = %store_id, root_hash = %root_hash, session = %session_id, uploaded, skipped, bytes, "snapshot committed");
        Ok(UploadOutcome::Committed {
            session_id,
            uploaded,
            skipped,
            bytes,
        })
    }

    /// Reads the local manifest and opens a session with it.
    async fn start(
        &self,
        store_id: &str,
        root_hash: &str,
        credentials: Option<&Credentials>,
    ) -> Result<(String, Manifest), SyncError> {
        let path = self.store.manifest_path(store_id, root_hash)?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| SyncError::SessionStart(PeerError::Io(e)))?;
        let manifest = Manifest::from_slice(&bytes)?;

        let started = self
            .peer
            .start_session(store_id, root_hash, bytes, credentials)
            .await
            .map_err(SyncError::SessionStart)?;
        Ok((started.session_id, manifest))
    }

    async fn upload_one(
        &self,
        store_id: &str,
        session_id: &str,
        task: TransferTask,
    ) -> Result<FileUpload, SyncError> {
        let local_path = self.store.local_path(&task.data_path)?;

        let probe = self
            .peer
            .file_nonce(store_id, session_id, &task.data_path)
            .await
            .map_err(|source| SyncError::Nonce {
                path: task.data_path.clone(),
                source,
            })?;
        if probe.file_exists {
            debug!(path = %task.data_path, "peer already has file, skipping");
            return Ok(FileUpload::Skipped);
        }
        let Some(nonce) = probe.nonce else {
            return Err(ProtocolError::MissingHeader(HEADER_NONCE).into());
        };

        let signature = self.signer.sign(&nonce)?;
        let auth = UploadAuth {
            nonce,
            public_key: hex::encode(self.signer.public_key()),
            signature: hex::encode(signature),
        };

        let sent = self
            .peer
            .upload_file(
                store_id,
                session_id,
                &task.data_path,
                &local_path,
                &auth,
                self.progress,
                &task.label,
            )
            .await
            .map_err(|source| SyncError::Transfer {
                path: task.data_path.clone(),
                source,
            })?;
        debug!(path = %task.data_path, label = %task.label, bytes = sent, "file uploaded");
        Ok(FileUpload::Sent(sent))
    }

    fn check_cancelled(&self) -> Result<(), SyncError> {
        if self.cancel.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }
}

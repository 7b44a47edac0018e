//! Session tuning.

use std::time::Duration;

use datasync_transfer::{FailurePolicy, TransferScheduler};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::SyncError;

/// Default number of concurrent file uploads.
pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 3;

/// Default number of concurrent file downloads.
pub const DEFAULT_DOWNLOAD_CONCURRENCY: usize = 5;

/// Knobs shared by upload and download sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub upload_concurrency: usize,
    pub download_concurrency: usize,
    pub failure_policy: FailurePolicy,
    /// Check sha256 and size of every downloaded file.
    pub verify_downloads: bool,
    pub request_timeout_secs: Option<u64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            upload_concurrency: DEFAULT_UPLOAD_CONCURRENCY,
            download_concurrency: DEFAULT_DOWNLOAD_CONCURRENCY,
            failure_policy: FailurePolicy::Drain,
            verify_downloads: true,
            request_timeout_secs: None,
        }
    }
}

impl SyncConfig {
    /// Rejects concurrency limits below 1.
    pub fn validate(&self) -> Result<(), SyncError> {
        for (name, value) in [
            ("upload_concurrency", self.upload_concurrency),
            ("download_concurrency", self.download_concurrency),
        ] {
            if value == 0 {
                return Err(SyncError::Config(format!("{name} must be at least 1")));
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub(crate) fn upload_scheduler(
        &self,
        cancel: &CancellationToken,
    ) -> Result<TransferScheduler, SyncError> {
        self.scheduler(self.upload_concurrency, cancel)
    }

    pub(crate) fn download_scheduler(
        &self,
        cancel: &CancellationToken,
    ) -> Result<TransferScheduler, SyncError> {
        self.scheduler(self.download_concurrency, cancel)
    }

    fn scheduler(
        &self,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<TransferScheduler, SyncError> {
        let scheduler = TransferScheduler::new(limit, self.failure_policy)
            .map_err(|e| SyncError::Config(e.to_string()))?;
        Ok(scheduler.with_cancel(cancel.clone()))
    }
}

//! Streaming of file bodies with progress reporting.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use datasync_transfer::{STREAM_BUFFER_SIZE, TransferProgress};
use futures_util::{StreamExt, TryStreamExt};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::io::ReaderStream;

use crate::error::PeerError;

/// Shares one progress handle between a body stream and its owner.
#[derive(Clone)]
pub(crate) struct ProgressRelay {
    handle: Arc<Mutex<Option<Box<dyn TransferProgress>>>>,
    transferred: Arc<AtomicU64>,
}

impl ProgressRelay {
    pub(crate) fn new(handle: Box<dyn TransferProgress>) -> Self {
        Self {
            handle: Arc::new(Mutex::new(Some(handle))),
            transferred: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Adds `bytes` and reports the new cumulative total.
    pub(crate) fn advance(&self, bytes: u64) -> u64 {
        let total = self.transferred.fetch_add(bytes, Ordering::Relaxed) + bytes;
        if let Ok(mut guard) = self.handle.lock()
            && let Some(handle) = guard.as_mut()
        {
            handle.on_progress(total);
        }
        total
    }

    pub(crate) fn transferred(&self) -> u64 {
        self.transferred.load(Ordering::Relaxed)
    }

    /// Ends the transfer; later calls are no-ops.
    pub(crate) fn finish(&self) {
        let handle = self.handle.lock().ok().and_then(|mut guard| guard.take());
        if let Some(handle) = handle {
            handle.on_end();
        }
    }
}

/// Opens `path` as a streaming request body that reports progress.
pub(crate) async fn file_body(
    path: &Path,
    relay: &ProgressRelay,
) -> Result<(reqwest::Body, u64), PeerError> {
    let file = tokio::fs::File::open(path).await?;
    let size = file.metadata().await?.len();
    let relay = relay.clone();
    let stream = ReaderStream::with_capacity(file, STREAM_BUFFER_SIZE).inspect_ok(move |chunk| {
        relay.advance(chunk.len() as u64);
    });
    Ok((reqwest::Body::wrap_stream(stream), size))
}

/// Streams a response body into `dest`, creating parent directories.
///
/// Bytes land in a sibling `.partial` file that is renamed over `dest`
/// only once the declared length has been received.
pub(crate) async fn write_body(
    resp: reqwest::Response,
    dest: &Path,
    expected: u64,
    relay: &ProgressRelay,
) -> Result<u64, PeerError> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let partial = PartialFile::new(partial_path(dest));
    let file = tokio::fs::File::create(partial.path()).await?;
    let mut writer = BufWriter::with_capacity(STREAM_BUFFER_SIZE, file);

    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        writer.write_all(&chunk).await?;
        relay.advance(chunk.len() as u64);
    }
    writer.flush().await?;
    drop(writer);

    let received = relay.transferred();
    if received != expected {
        return Err(PeerError::ShortBody {
            expected,
            actual: received,
        });
    }
    tokio::fs::rename(partial.path(), dest).await?;
    partial.keep();
    Ok(received)
}

/// Removes an unfinished download when dropped, whether the transfer
/// failed or its future was cancelled mid-stream.
struct PartialFile {
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// The file was renamed into place; nothing to clean up.
    fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.armed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Buffers a response body fully in memory.
pub(crate) async fn read_body(
    resp: reqwest::Response,
    expected: u64,
    relay: &ProgressRelay,
) -> Result<Vec<u8>, PeerError> {
    let mut buf = Vec::with_capacity(expected.min(64 * 1024 * 1024) as usize);
    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        buf.extend_from_slice(&chunk);
        relay.advance(chunk.len() as u64);
    }
    if buf.len() as u64 != expected {
        return Err(PeerError::ShortBody {
            expected,
            actual: buf.len() as u64,
        });
    }
    Ok(buf)
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    dest.with_file_name(name)
}

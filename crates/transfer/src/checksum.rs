use std::path::Path;

use datasync_protocol::FileRecord;
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use crate::{STREAM_BUFFER_SIZE, TransferError};

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Streams a file through SHA-256, returning `(hex digest, size)`.
pub async fn file_digest(path: &Path) -> Result<(String, u64), TransferError> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; STREAM_BUFFER_SIZE];
    let mut size = 0u64;
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }
    Ok((hex::encode(hasher.finalize()), size))
}

/// Checks a local file against the record that named it.
pub async fn verify_file(path: &Path, record: &FileRecord) -> Result<(), TransferError> {
    let (digest, size) = file_digest(path).await?;
    let shown = path.display().to_string();
    if size != record.size {
        return Err(TransferError::SizeMismatch {
            path: shown,
            expected: record.size,
            actual: size,
        });
    }
    if digest != record.sha256 {
        return Err(TransferError::DigestMismatch {
            path: shown,
            expected: record.sha256.clone(),
            actual: digest,
        });
    }
    Ok(())
}

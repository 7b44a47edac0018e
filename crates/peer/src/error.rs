//! Transport error types.

use datasync_protocol::ProtocolError;
use datasync_transfer::TransferError;

/// Errors produced while talking to a peer.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("peer returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("response has no content-length")]
    MissingContentLength,

    #[error("body ended after {actual} of {expected} bytes")]
    ShortBody { expected: u64, actual: u64 },

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),
}

impl PeerError {
    /// HTTP status of a rejected request, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            PeerError::Status { status, .. } => Some(*status),
            PeerError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

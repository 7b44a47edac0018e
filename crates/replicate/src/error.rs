//! Session error types.

use datasync_peer::PeerError;
use datasync_protocol::ProtocolError;
use datasync_transfer::TransferError;

use crate::auth::SignerError;

/// Errors that abort an upload or download session.
///
/// Every variant is fatal to the session that raised it; nothing is
/// retried and no partial snapshot is committed or finalized.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("existence probe failed: {0}")]
    Probe(#[source] PeerError),

    #[error("could not start upload session: {0}")]
    SessionStart(#[source] PeerError),

    #[error("could not obtain nonce for {path}: {source}")]
    Nonce { path: String, source: PeerError },

    #[error("transfer of {path} failed: {source}")]
    Transfer { path: String, source: PeerError },

    #[error("commit failed: {0}")]
    Commit(#[source] PeerError),

    #[error("peer refused to commit: {0}")]
    CommitRejected(String),

    #[error("snapshot {root_hash} of store {store_id} not found on peer")]
    NotFound { store_id: String, root_hash: String },

    #[error("credentials unavailable: {0}")]
    Credentials(String),

    #[error("signing failed: {0}")]
    Signer(#[from] SignerError),

    #[error("cancelled")]
    Cancelled,

    #[error("malformed data: {0}")]
    Malformed(#[from] ProtocolError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("local store error: {0}")]
    Store(#[from] TransferError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

//! Wire contract for pushing and pulling DataStore snapshots.
//!
//! This crate has no I/O. It describes what travels over the wire:
//! endpoint paths, header names, the typed response of every call and
//! the manifest (`<rootHash>.dat`) that names the files of a snapshot.

pub mod constants;
pub mod endpoint;
pub mod manifest;
pub mod responses;

pub use endpoint::Endpoint;
pub use manifest::{FileRecord, Manifest, label_for_key};
pub use responses::{CommitResponse, FileProbe, NonceProbe, SessionStartResponse, StoreProbe};

/// Errors raised when a peer response or a manifest violates the contract.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("missing header: {0}")]
    MissingHeader(&'static str),

    #[error("invalid value for header {name}: {value:?}")]
    InvalidHeader { name: &'static str, value: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

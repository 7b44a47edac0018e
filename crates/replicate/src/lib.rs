//! Session engine for pushing and pulling DataStore snapshots.
//!
//! Both directions follow a fixed pipeline against one peer:
//!
//! - **Upload**: probe, credentials if the store is new, session start,
//!   nonce plus signed PUT per file, commit.
//! - **Download**: probe, manifest fetch, parallel file fetch, manifest
//!   persisted locally and the index regenerated.
//!
//! The transport is reached through [`PeerConnection`] so sessions can be
//! driven against an in-memory peer.

pub mod auth;
pub mod config;
pub mod connection;
pub mod download;
pub mod error;
pub mod types;
pub mod upload;

#[cfg(test)]
mod testing;

pub use auth::{AuthSigner, CredentialPrompt, SignerError, StaticCredentials};
pub use config::SyncConfig;
pub use connection::{PeerConnection, PeerFuture};
pub use download::DownloadSession;
pub use error::SyncError;
pub use types::{DownloadOutcome, UploadOutcome};
pub use upload::UploadSession;

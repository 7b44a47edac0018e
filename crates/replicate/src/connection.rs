//! Transport seam between the session engine and a peer.
//!
//! [`PeerClient`] implements this over HTTPS; tests use an in-memory peer.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use datasync_peer::{Credentials, PeerClient, PeerError, UploadAuth};
use datasync_protocol::{CommitResponse, NonceProbe, SessionStartResponse, StoreProbe};
use datasync_transfer::ProgressSink;

/// Boxed future returned by every [`PeerConnection`] call.
pub type PeerFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, PeerError>> + Send + 'a>>;

/// Every protocol call a session makes against one peer.
pub trait PeerConnection: Send + Sync {
    /// `host:port`, shown to the operator and the credential prompt.
    fn address(&self) -> &str;

    fn probe_store<'a>(
        &'a self,
        store_id: &'a str,
        root_hash: Option<&'a str>,
    ) -> PeerFuture<'a, StoreProbe>;

    fn start_session<'a>(
        &'a self,
        store_id: &'a str,
        root_hash: &'a str,
        manifest: Vec<u8>,
        credentials: Option<&'a Credentials>,
    ) -> PeerFuture<'a, SessionStartResponse>;

    fn file_nonce<'a>(
        &'a self,
        store_id: &'a str,
        session_id: &'a str,
        data_path: &'a str,
    ) -> PeerFuture<'a, NonceProbe>;

    #[allow(clippy::too_many_arguments)]
    fn upload_file<'a>(
        &'a self,
        store_id: &'a str,
        session_id: &'a str,
        data_path: &'a str,
        local_path: &'a Path,
        auth: &'a UploadAuth,
        progress: &'a dyn ProgressSink,
        label: &'a str,
    ) -> PeerFuture<'a, u64>;

    fn commit<'a>(
        &'a self,
        store_id: &'a str,
        session_id: &'a str,
        credentials: Option<&'a Credentials>,
    ) -> PeerFuture<'a, CommitResponse>;

    fn fetch_manifest<'a>(
        &'a self,
        store_id: &'a str,
        root_hash: &'a str,
        progress: &'a dyn ProgressSink,
    ) -> PeerFuture<'a, Vec<u8>>;

    fn download_file<'a>(
        &'a self,
        store_id: &'a str,
        data_path: &'a str,
        dest: &'a Path,
        progress: &'a dyn ProgressSink,
        label: &'a str,
    ) -> PeerFuture<'a, u64>;
}

impl PeerConnection for PeerClient {
    fn address(&self) -> &str {
        PeerClient::address(self)
    }

    fn probe_store<'a>(
        &'a self,
        store_id: &'a str,
        root_hash: Option<&'a str>,
    ) -> PeerFuture<'a, StoreProbe> {
        Box::pin(PeerClient::probe_store(self, store_id, root_hash))
    }

    fn start_session<'a>(
        &'a self,
        store_id: &'a str,
        root_hash: &'a str,
        manifest: Vec<u8>,
        credentials: Option<&'a Credentials>,
    ) -> PeerFuture<'a, SessionStartResponse> {
        Box::pin(PeerClient::start_session(
            self,
            store_id,
            root_hash,
            manifest,
            credentials,
        ))
    }

    fn file_nonce<'a>(
        &'a self,
        store_id: &'a str,
        session_id: &'a str,
        data_path: &'a str,
    ) -> PeerFuture<'a, NonceProbe> {
        Box::pin(PeerClient::file_nonce(self, store_id, session_id, data_path))
    }

    fn upload_file<'a>(
        &'a self,
        store_id: &'a str,
        session_id: &'a str,
        data_path: &'a str,
        local_path: &'a Path,
        auth: &'a UploadAuth,
        progress: &'a dyn ProgressSink,
        label: &'a str,
    ) -> PeerFuture<'a, u64> {
        Box::pin(PeerClient::upload_file(
            self, store_id, session_id, data_path, local_path, auth, progress, label,
        ))
    }

    fn commit<'a>(
        &'a self,
        store_id: &'a str,
        session_id: &'a str,
        credentials: Option<&'a Credentials>,
    ) -> PeerFuture<'a, CommitResponse> {
        Box::pin(PeerClient::commit(self, store_id, session_id, credentials))
    }

    fn fetch_manifest<'a>(
        &'a self,
        store_id: &'a str,
        root_hash: &'a str,
        progress: &'a dyn ProgressSink,
    ) -> PeerFuture<'a, Vec<u8>> {
        Box::pin(PeerClient::fetch_manifest(self, store_id, root_hash, progress))
    }

    fn download_file<'a>(
        &'a self,
        store_id: &'a str,
        data_path: &'a str,
        dest: &'a Path,
        progress: &'a dyn ProgressSink,
        label: &'a str,
    ) -> PeerFuture<'a, u64> {
        Box::pin(PeerClient::download_file(
            self, store_id, data_path, dest, progress, label,
        ))
    }
}

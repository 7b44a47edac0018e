//! In-memory peer, signers and store fixtures for session tests.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use datasync_peer::{Credentials, PeerError, UploadAuth};
use datasync_protocol::{
    CommitResponse, FileRecord, Manifest, NonceProbe, SessionStartResponse, StoreProbe,
};
use datasync_transfer::{ContentStore, FsContentStore, ProgressSink, checksum_bytes};
use tempfile::TempDir;

use crate::auth::{AuthSigner, CredentialPrompt, SignerError};
use crate::connection::{PeerConnection, PeerFuture};

pub(crate) const SESSION_ID: &str = "session-1";

/// Peer that records every call and checks upload signatures.
pub(crate) struct MockPeer {
    pub store_exists: bool,
    pub root_hash_exists: bool,
    /// Data paths the peer already holds for the session.
    pub present: HashSet<String>,
    /// Data paths whose upload or download fails.
    pub failing: HashSet<String>,
    pub commit_response: CommitResponse,
    /// Served by `fetch_manifest`.
    pub manifest: Option<Vec<u8>>,
    /// Served by `download_file`, keyed by data path.
    pub blobs: HashMap<String, Vec<u8>>,
    pub omit_content_length: bool,
    pub delay: Duration,

    calls: Mutex<Vec<String>>,
    auth_seen: Mutex<Vec<(&'static str, Option<Credentials>)>>,
    nonces: Mutex<HashMap<String, String>>,
    received: Mutex<HashMap<String, Vec<u8>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockPeer {
    pub(crate) fn new() -> Self {
        Self {
            store_exists: true,
            root_hash_exists: false,
            present: HashSet::new(),
            failing: HashSet::new(),
            commit_response: CommitResponse::default(),
            manifest: None,
            blobs: HashMap::new(),
            omit_content_length: false,
            delay: Duration::from_millis(5),
            calls: Mutex::new(Vec::new()),
            auth_seen: Mutex::new(Vec::new()),
            nonces: Mutex::new(HashMap::new()),
            received: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub(crate) fn position(&self, call: &str) -> Option<usize> {
        self.calls.lock().unwrap().iter().position(|c| c == call)
    }

    /// Credentials attached to `start` and `commit` calls, in order.
    pub(crate) fn auth_seen(&self) -> Vec<(&'static str, Option<Credentials>)> {
        self.auth_seen.lock().unwrap().clone()
    }

    pub(crate) fn received(&self, data_path: &str) -> Option<Vec<u8>> {
        self.received.lock().unwrap().get(data_path).cloned()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn rejected(status: u16, body: &str) -> PeerError {
        PeerError::Status {
            status,
            body: body.to_string(),
        }
    }

    async fn accept_upload(
        &self,
        data_path: &str,
        local_path: &Path,
        auth: &UploadAuth,
    ) -> Result<u64, PeerError> {
        if self.failing.contains(data_path) {
            return Err(Self::rejected(500, "disk full"));
        }
        let issued = self.nonces.lock().unwrap().get(data_path).cloned();
        if issued.as_deref() != Some(auth.nonce.as_str()) {
            return Err(Self::rejected(403, "nonce mismatch"));
        }
        if auth.public_key != hex::encode(MockSigner::KEY)
            || auth.signature != hex::encode(MockSigner::signature_for(&auth.nonce))
        {
            return Err(Self::rejected(403, "bad key ownership signature"));
        }
        let body = tokio::fs::read(local_path).await?;
        let len = body.len() as u64;
        self.received
            .lock()
            .unwrap()
            .insert(data_path.to_string(), body);
        Ok(len)
    }

    async fn serve_download(&self, data_path: &str, dest: &Path) -> Result<u64, PeerError> {
        if self.failing.contains(data_path) {
            return Err(Self::rejected(500, "read error"));
        }
        if self.omit_content_length {
            return Err(PeerError::MissingContentLength);
        }
        let Some(body) = self.blobs.get(data_path) else {
            return Err(Self::rejected(404, "no such file"));
        };
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, body).await?;
        Ok(body.len() as u64)
    }
}

impl PeerConnection for MockPeer {
    fn address(&self) -> &str {
        "mock-peer:8575"
    }

    fn probe_store<'a>(
        &'a self,
        store_id: &'a str,
        _root_hash: Option<&'a str>,
    ) -> PeerFuture<'a, StoreProbe> {
        self.record(format!("probe:{store_id}"));
        Box::pin(async move {
            Ok(StoreProbe {
                store_exists: self.store_exists,
                root_hash_exists: self.store_exists && self.root_hash_exists,
            })
        })
    }

    fn start_session<'a>(
        &'a self,
        _store_id: &'a str,
        _root_hash: &'a str,
        _manifest: Vec<u8>,
        credentials: Option<&'a Credentials>,
    ) -> PeerFuture<'a, SessionStartResponse> {
        self.record("start".to_string());
        self.auth_seen
            .lock()
            .unwrap()
            .push(("start", credentials.cloned()));
        Box::pin(async move {
            if !self.store_exists && credentials.is_none() {
                return Err(Self::rejected(401, "credentials required"));
            }
            Ok(SessionStartResponse {
                session_id: SESSION_ID.to_string(),
            })
        })
    }

    fn file_nonce<'a>(
        &'a self,
        _store_id: &'a str,
        session_id: &'a str,
        data_path: &'a str,
    ) -> PeerFuture<'a, NonceProbe> {
        self.record(format!("nonce:{data_path}"));
        Box::pin(async move {
            if session_id != SESSION_ID {
                return Err(Self::rejected(404, "unknown session"));
            }
            if self.present.contains(data_path) {
                return Ok(NonceProbe {
                    file_exists: true,
                    nonce: None,
                });
            }
            let nonce = format!("nonce-{}", checksum_bytes(data_path.as_bytes()));
            self.nonces
                .lock()
                .unwrap()
                .insert(data_path.to_string(), nonce.clone());
            Ok(NonceProbe {
                file_exists: false,
                nonce: Some(nonce),
            })
        })
    }

    fn upload_file<'a>(
        &'a self,
        _store_id: &'a str,
        _session_id: &'a str,
        data_path: &'a str,
        local_path: &'a Path,
        auth: &'a UploadAuth,
        progress: &'a dyn ProgressSink,
        label: &'a str,
    ) -> PeerFuture<'a, u64> {
        self.record(format!("put:{data_path}"));
        Box::pin(async move {
            self.enter();
            let handle = progress.on_start(0, label);
            tokio::time::sleep(self.delay).await;
            let result = self.accept_upload(data_path, local_path, auth).await;
            handle.on_end();
            self.leave();
            if result.is_ok() {
                self.record(format!("put-done:{data_path}"));
            }
            result
        })
    }

    fn commit<'a>(
        &'a self,
        _store_id: &'a str,
        session_id: &'a str,
        credentials: Option<&'a Credentials>,
    ) -> PeerFuture<'a, CommitResponse> {
        self.record("commit".to_string());
        self.auth_seen
            .lock()
            .unwrap()
            .push(("commit", credentials.cloned()));
        Box::pin(async move {
            if session_id != SESSION_ID {
                return Err(Self::rejected(404, "unknown session"));
            }
            Ok(self.commit_response.clone())
        })
    }

    fn fetch_manifest<'a>(
        &'a self,
        _store_id: &'a str,
        root_hash: &'a str,
        _progress: &'a dyn ProgressSink,
    ) -> PeerFuture<'a, Vec<u8>> {
        self.record(format!("fetch:{root_hash}.dat"));
        Box::pin(async move {
            if self.omit_content_length {
                return Err(PeerError::MissingContentLength);
            }
            self.manifest
                .clone()
                .ok_or_else(|| Self::rejected(404, "no such manifest"))
        })
    }

    fn download_file<'a>(
        &'a self,
        _store_id: &'a str,
        data_path: &'a str,
        dest: &'a Path,
        progress: &'a dyn ProgressSink,
        label: &'a str,
    ) -> PeerFuture<'a, u64> {
        self.record(format!("get:{data_path}"));
        Box::pin(async move {
            self.enter();
            let handle = progress.on_start(0, label);
            tokio::time::sleep(self.delay).await;
            let result = self.serve_download(data_path, dest).await;
            handle.on_end();
            self.leave();
            result
        })
    }
}

/// Signs `sig:<nonce>` with a fixed key.
pub(crate) struct MockSigner;

impl MockSigner {
    pub(crate) const KEY: &'static [u8] = b"mock-public-key";

    pub(crate) fn signature_for(nonce: &str) -> Vec<u8> {
        format!("sig:{nonce}").into_bytes()
    }
}

impl AuthSigner for MockSigner {
    fn public_key(&self) -> Vec<u8> {
        Self::KEY.to_vec()
    }

    fn sign(&self, nonce: &str) -> Result<Vec<u8>, SignerError> {
        Ok(Self::signature_for(nonce))
    }
}

/// Replays a signature made for one nonce against every request.
pub(crate) struct ReplaySigner(pub String);

impl AuthSigner for ReplaySigner {
    fn public_key(&self) -> Vec<u8> {
        MockSigner::KEY.to_vec()
    }

    fn sign(&self, _nonce: &str) -> Result<Vec<u8>, SignerError> {
        Ok(MockSigner::signature_for(&self.0))
    }
}

/// Prompt that counts how often it was asked.
pub(crate) struct CountingPrompt {
    pub credentials: Credentials,
    asked: AtomicUsize,
}

impl CountingPrompt {
    pub(crate) fn new(username: &str, password: &str) -> Self {
        Self {
            credentials: Credentials::new(username, password),
            asked: AtomicUsize::new(0),
        }
    }

    pub(crate) fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

impl CredentialPrompt for CountingPrompt {
    fn ask<'a>(
        &'a self,
        _peer_address: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Credentials, String>> + Send + 'a>> {
        self.asked.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move { Ok(self.credentials.clone()) })
    }
}

/// Temporary content store.
pub(crate) struct Fixture {
    _dir: TempDir,
    pub store: FsContentStore,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::new(dir.path());
        Self { _dir: dir, store }
    }

    /// Writes `data` into the store and returns its record.
    pub(crate) fn add_blob(&self, data: &[u8]) -> FileRecord {
        let record = record(data);
        let path = self
            .store
            .local_path(&self.store.data_path(&record.sha256))
            .unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
        record
    }

    /// Writes the manifest where sessions look it up, returning its bytes.
    pub(crate) fn save_manifest(&self, store_id: &str, root_hash: &str, manifest: &Manifest) -> Vec<u8> {
        let bytes = manifest.to_vec().unwrap();
        let path = self.store.manifest_path(store_id, root_hash).unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, &bytes).unwrap();
        bytes
    }
}

pub(crate) fn record(data: &[u8]) -> FileRecord {
    FileRecord {
        sha256: checksum_bytes(data),
        size: data.len() as u64,
    }
}

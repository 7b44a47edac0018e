//! Client for every call of the propagation protocol.

use std::fmt;
use std::path::Path;

use datasync_protocol::constants::{
    HEADER_KEY_OWNERSHIP_SIG, HEADER_NONCE, HEADER_PUBLIC_KEY, MANIFEST_FIELD,
};
use datasync_protocol::{
    CommitResponse, Endpoint, Manifest, NonceProbe, SessionStartResponse,
};
use datasync_transfer::ProgressSink;
use reqwest::Method;
use reqwest::header::{CONTENT_LENGTH, HeaderMap};
use reqwest::multipart::{Form, Part};
use tracing::debug;

use crate::body::{ProgressRelay, file_body, read_body, write_body};
use crate::channel::SecureChannel;
use crate::error::PeerError;

/// Basic-auth credentials for creating a store the peer does not know yet.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Proof of key ownership attached to one file upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadAuth {
    pub nonce: String,
    /// Hex-encoded public key.
    pub public_key: String,
    /// Hex-encoded signature over `nonce`.
    pub signature: String,
}

/// HTTP client bound to one peer.
#[derive(Debug, Clone)]
pub struct PeerClient {
    http: reqwest::Client,
    base_url: String,
    address: String,
}

impl PeerClient {
    /// Creates a client for `https://host:port`.
    pub fn new(channel: &SecureChannel, host: &str, port: u16) -> Self {
        Self {
            http: channel.client().clone(),
            base_url: format!("https://{host}:{port}"),
            address: format!("{host}:{port}"),
        }
    }

    /// Creates a client against an explicit base URL (e.g. a plain-HTTP test server).
    pub fn with_base_url(channel: &SecureChannel, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        let base_url = base_url.trim_end_matches('/').to_string();
        let address = base_url
            .split_once("://")
            .map(|(_, rest)| rest.to_string())
            .unwrap_or_else(|| base_url.clone());
        Self {
            http: channel.client().clone(),
            base_url,
            address,
        }
    }

    /// `host:port` of the peer.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub(crate) fn request(&self, endpoint: Endpoint<'_>) -> reqwest::RequestBuilder {
        let method = match endpoint.method() {
            "HEAD" => Method::HEAD,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            _ => Method::GET,
        };
        let url = format!("{}{}", self.base_url, endpoint.path());
        let query = endpoint.query();
        let builder = self.http.request(method, url);
        if query.is_empty() {
            builder
        } else {
            builder.query(&query)
        }
    }

    /// Opens an upload session for `root_hash` by submitting its manifest.
    pub async fn start_session(
        &self,
        store_id: &str,
        root_hash: &str,
        manifest: Vec<u8>,
        credentials: Option<&Credentials>,
    ) -> Result<SessionStartResponse, PeerError> {
        let part = Part::bytes(manifest)
            .file_name(Manifest::file_name(root_hash))
            .mime_str("application/octet-stream")?;
        let form = Form::new().part(MANIFEST_FIELD, part);

        let mut req = self
            .request(Endpoint::StartSession {
                store_id,
                root_hash,
            })
            .multipart(form);
        if let Some(creds) = credentials {
            req = req.basic_auth(&creds.username, Some(&creds.password));
        }

        let resp = ensure_success(req.send().await?).await?;
        let body = resp.bytes().await?;
        let started = SessionStartResponse::from_slice(&body)?;
        debug!(store = %store_id, root_hash = %root_hash, session = %started.session_id, "session started");
        Ok(started)
    }

    /// Asks for the per-file nonce; also reports whether the peer
    /// already holds the file for this session.
    pub async fn file_nonce(
        &self,
        store_id: &str,
        session_id: &str,
        data_path: &str,
    ) -> Result<NonceProbe, PeerError> {
        let resp = self
            .request(Endpoint::FileNonce {
                store_id,
                session_id,
                data_path,
            })
            .send()
            .await?;
        let resp = ensure_success(resp).await?;
        Ok(NonceProbe::from_headers(header_lookup(resp.headers()))?)
    }

    /// Streams a local file to the peer, signed for one nonce.
    ///
    /// Returns the number of bytes sent.
    #[allow(clippy::too_many_arguments)]
    pub async fn upload_file(
        &self,
        store_id: &str,
        session_id: &str,
        data_path: &str,
        local_path: &Path,
        auth: &UploadAuth,
        progress: &dyn ProgressSink,
        label: &str,
    ) -> Result<u64, PeerError> {
        let size = tokio::fs::metadata(local_path).await?.len();
        let relay = ProgressRelay::new(progress.on_start(size, label));

        let result = async {
            let (body, size) = file_body(local_path, &relay).await?;
            let resp = self
                .request(Endpoint::UploadFile {
                    store_id,
                    session_id,
                    data_path,
                })
                .header(CONTENT_LENGTH, size)
                .header(HEADER_NONCE, &auth.nonce)
                .header(HEADER_PUBLIC_KEY, &auth.public_key)
                .header(HEADER_KEY_OWNERSHIP_SIG, &auth.signature)
                .body(body)
                .send()
                .await?;
            ensure_success(resp).await?;
            Ok::<_, PeerError>(size)
        }
        .await;

        relay.finish();
        result
    }

    /// Commits a session whose files have all been uploaded.
    pub async fn commit(
        &self,
        store_id: &str,
        session_id: &str,
        credentials: Option<&Credentials>,
    ) -> Result<CommitResponse, PeerError> {
        let mut req = self.request(Endpoint::Commit {
            store_id,
            session_id,
        });
        if let Some(creds) = credentials {
            req = req.basic_auth(&creds.username, Some(&creds.password));
        }
        let resp = ensure_success(req.send().await?).await?;
        let body = resp.bytes().await?;
        Ok(CommitResponse::from_slice(&body)?)
    }

    /// Fetches the serialized manifest `<rootHash>.dat`, buffered in memory.
    pub async fn fetch_manifest(
        &self,
        store_id: &str,
        root_hash: &str,
        progress: &dyn ProgressSink,
    ) -> Result<Vec<u8>, PeerError> {
        let name = Manifest::file_name(root_hash);
        let resp = self.fetch(store_id, &name).await?;
        let expected = resp.content_length().ok_or(PeerError::MissingContentLength)?;

        let relay = ProgressRelay::new(progress.on_start(expected, &name));
        let result = read_body(resp, expected, &relay).await;
        relay.finish();
        result
    }

    /// Streams one content-store file to `dest`.
    ///
    /// Returns the number of bytes written.
    pub async fn download_file(
        &self,
        store_id: &str,
        data_path: &str,
        dest: &Path,
        progress: &dyn ProgressSink,
        label: &str,
    ) -> Result<u64, PeerError> {
        let resp = self.fetch(store_id, data_path).await?;
        let expected = resp.content_length().ok_or(PeerError::MissingContentLength)?;

        let relay = ProgressRelay::new(progress.on_start(expected, label));
        let result = write_body(resp, dest, expected, &relay).await;
        relay.finish();
        result
    }

    async fn fetch(&self, store_id: &str, data_path: &str) -> Result<reqwest::Response, PeerError> {
        let resp = self
            .request(Endpoint::Fetch {
                store_id,
                data_path,
            })
            .send()
            .await?;
        ensure_success(resp).await
    }
}

/// Turns a non-2xx response into [`PeerError::Status`].
pub(crate) async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, PeerError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(PeerError::Status {
        status: status.as_u16(),
        body,
    })
}

pub(crate) fn header_lookup<'h>(headers: &'h HeaderMap) -> impl Fn(&str) -> Option<&'h str> + 'h {
    move |name| headers.get(name).and_then(|v| v.to_str().ok())
}

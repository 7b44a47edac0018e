//! TLS client context shared by every request to a peer.

use std::path::{Path, PathBuf};
use std::time::Duration;

use datasync_protocol::constants::DEFAULT_PEER_PORT;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PeerError;

/// Where a peer lives and which client identity to present to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerConfig {
    pub host: String,
    pub port: u16,
    /// PEM client certificate.
    pub cert_path: PathBuf,
    /// PEM private key matching `cert_path`.
    pub key_path: PathBuf,
    /// Whole-request timeout; `None` lets a stalled request wait forever.
    pub request_timeout_secs: Option<u64>,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: DEFAULT_PEER_PORT,
            cert_path: PathBuf::from("client.crt"),
            key_path: PathBuf::from("client.key"),
            request_timeout_secs: None,
        }
    }
}

impl PeerConfig {
    /// `host:port` as shown to operators.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// A reusable TLS client presenting a client certificate.
///
/// Server certificates are not verified: peers use self-signed
/// certificates. Cloning is cheap and clones share one connection pool.
#[derive(Debug, Clone)]
pub struct SecureChannel {
    http: reqwest::Client,
}

impl SecureChannel {
    /// Builds the channel from PEM certificate and key material.
    pub fn from_pem(
        cert_pem: &[u8],
        key_pem: &[u8],
        request_timeout: Option<Duration>,
    ) -> Result<Self, PeerError> {
        let mut pem = Vec::with_capacity(cert_pem.len() + key_pem.len() + 1);
        pem.extend_from_slice(cert_pem);
        if !pem.ends_with(b"\n") {
            pem.push(b'\n');
        }
        pem.extend_from_slice(key_pem);

        let identity =
            reqwest::Identity::from_pem(&pem).map_err(|e| PeerError::Tls(e.to_string()))?;

        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .identity(identity)
            .danger_accept_invalid_certs(true);
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| PeerError::Tls(e.to_string()))?;

        Ok(Self { http })
    }

    /// Loads certificate and key from disk.
    pub async fn load(
        cert_path: &Path,
        key_path: &Path,
        request_timeout: Option<Duration>,
    ) -> Result<Self, PeerError> {
        let cert = tokio::fs::read(cert_path).await.map_err(|e| {
            PeerError::Tls(format!("reading {}: {e}", cert_path.display()))
        })?;
        let key = tokio::fs::read(key_path)
            .await
            .map_err(|e| PeerError::Tls(format!("reading {}: {e}", key_path.display())))?;
        debug!(cert = %cert_path.display(), "loaded client identity");
        Self::from_pem(&cert, &key, request_timeout)
    }

    /// Builds the channel described by `config`.
    pub async fn from_config(config: &PeerConfig) -> Result<Self, PeerError> {
        Self::load(&config.cert_path, &config.key_path, config.request_timeout()).await
    }

    /// Wraps an existing client (plain HTTP test servers, custom stacks).
    pub fn from_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.http
    }
}

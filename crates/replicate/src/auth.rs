//! Key ownership proofs and credential acquisition.

use std::future::Future;
use std::pin::Pin;

use datasync_peer::Credentials;

/// Failure reported by an [`AuthSigner`].
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct SignerError(pub String);

/// Proves ownership of the key that uploads are bound to.
///
/// Sessions hex-encode both values before putting them on the wire.
pub trait AuthSigner: Send + Sync {
    /// Raw public key bytes.
    fn public_key(&self) -> Vec<u8>;

    /// Signs one peer-issued nonce.
    fn sign(&self, nonce: &str) -> Result<Vec<u8>, SignerError>;
}

/// Source of Basic-auth credentials for creating a new store on a peer.
///
/// Only consulted when the peer reports the store does not exist, and
/// at most once per upload session.
pub trait CredentialPrompt: Send + Sync {
    fn ask<'a>(
        &'a self,
        peer_address: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Credentials, String>> + Send + 'a>>;
}

/// Hands out credentials known ahead of time (flags, config, tests).
#[derive(Debug, Clone)]
pub struct StaticCredentials(pub Option<Credentials>);

impl CredentialPrompt for StaticCredentials {
    fn ask<'a>(
        &'a self,
        peer_address: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Credentials, String>> + Send + 'a>> {
        Box::pin(async move {
            self.0
                .clone()
                .ok_or_else(|| format!("store is unknown to {peer_address} and no credentials were given"))
        })
    }
}

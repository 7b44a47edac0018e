//! Ed25519 key ownership proofs.

use std::path::Path;

use anyhow::{Context, anyhow};
use datasync_replicate::{AuthSigner, SignerError};
use ed25519_dalek::{Signer, SigningKey};

/// Signs upload nonces with a key loaded from a hex seed.
pub struct Ed25519Signer {
    key: SigningKey,
}

impl Ed25519Signer {
    /// Parses a 32-byte seed written as 64 hex characters.
    pub fn from_hex_seed(text: &str) -> anyhow::Result<Self> {
        let bytes = hex::decode(text.trim()).context("signing key is not valid hex")?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| anyhow!("signing key must be 32 bytes, got {}", b.len()))?;
        Ok(Self {
            key: SigningKey::from_bytes(&seed),
        })
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading signing key {}", path.display()))?;
        Self::from_hex_seed(&text)
    }
}

impl AuthSigner for Ed25519Signer {
    fn public_key(&self) -> Vec<u8> {
        self.key.verifying_key().to_bytes().to_vec()
    }

    fn sign(&self, nonce: &str) -> Result<Vec<u8>, SignerError> {
        Ok(self.key.sign(nonce.as_bytes()).to_bytes().to_vec())
    }
}

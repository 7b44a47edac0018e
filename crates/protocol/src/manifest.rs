//! Snapshot manifest: file key -> content digest and size.
//!
//! The manifest is the unit that names a snapshot. It is serialized as
//! JSON into `<rootHash>.dat`, sent on session start and fetched first on
//! download.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;
use crate::constants::MANIFEST_EXTENSION;

/// A content-addressed file referenced by a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Lowercase hex SHA-256 of the file content.
    pub sha256: String,
    /// Size in bytes.
    pub size: u64,
}

/// Mapping from opaque file key to [`FileRecord`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    files: BTreeMap<String, FileRecord>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and validates a serialized manifest.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let manifest: Manifest = serde_json::from_slice(bytes)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Serializes the manifest as compact JSON.
    pub fn to_vec(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(serde_json::to_vec(&self.files)?)
    }

    /// Checks that every key is non-empty and every digest is well formed.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        for (key, record) in &self.files {
            if key.is_empty() {
                return Err(ProtocolError::InvalidManifest("empty file key".into()));
            }
            if !is_sha256_hex(&record.sha256) {
                return Err(ProtocolError::InvalidManifest(format!(
                    "file {key}: malformed sha256 {:?}",
                    record.sha256
                )));
            }
        }
        Ok(())
    }

    pub fn insert(&mut self, key: impl Into<String>, record: FileRecord) {
        self.files.insert(key.into(), record);
    }

    pub fn get(&self, key: &str) -> Option<&FileRecord> {
        self.files.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FileRecord)> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Sum of all file sizes.
    pub fn total_size(&self) -> u64 {
        self.files.values().map(|r| r.size).sum()
    }

    /// Transfer name of the manifest for `root_hash` (`<rootHash>.dat`).
    pub fn file_name(root_hash: &str) -> String {
        format!("{root_hash}.{MANIFEST_EXTENSION}")
    }
}

/// Decodes a file key into a display label.
///
/// Keys are hex-encoded names. Anything that is not valid hex of UTF-8
/// text is shown as-is.
pub fn label_for_key(key: &str) -> String {
    hex::decode(key)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .filter(|label| !label.is_empty() && !label.chars().any(char::is_control))
        .unwrap_or_else(|| key.to_string())
}

/// Returns true for a 64-character lowercase hex string.
pub fn is_sha256_hex(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

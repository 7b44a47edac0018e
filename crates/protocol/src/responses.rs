//! Typed responses, one per protocol call, validated at the boundary.
//!
//! HEAD calls answer through headers; those parsers take a lookup
//! closure so this crate stays independent of any HTTP client.

use serde::{Deserialize, Serialize};

use crate::ProtocolError;
use crate::constants::{
    HEADER_FILE_EXISTS, HEADER_FILE_SIZE, HEADER_HAS_ROOT_HASH, HEADER_NONCE, HEADER_STORE_EXISTS,
};

/// Answer to `HEAD /{storeId}[?hasRootHash=]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreProbe {
    pub store_exists: bool,
    /// False when the peer omits the header (no root hash was asked about).
    pub root_hash_exists: bool,
}

impl StoreProbe {
    pub fn from_headers<'h>(header: impl Fn(&str) -> Option<&'h str>) -> Result<Self, ProtocolError> {
        let store_exists = required_bool(&header, HEADER_STORE_EXISTS)?;
        let root_hash_exists = optional_bool(&header, HEADER_HAS_ROOT_HASH)?.unwrap_or(false);
        Ok(Self {
            store_exists,
            root_hash_exists,
        })
    }
}

/// Answer to `HEAD /store/{storeId}/{rootHash}/{dataPath}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileProbe {
    pub exists: bool,
    pub size: u64,
}

impl FileProbe {
    pub fn from_headers<'h>(header: impl Fn(&str) -> Option<&'h str>) -> Result<Self, ProtocolError> {
        let exists = required_bool(&header, HEADER_FILE_EXISTS)?;
        let size = match header(HEADER_FILE_SIZE) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|_| invalid(HEADER_FILE_SIZE, raw))?,
            None if exists => return Err(ProtocolError::MissingHeader(HEADER_FILE_SIZE)),
            None => 0,
        };
        Ok(Self { exists, size })
    }
}

/// Answer to `HEAD /upload/{storeId}/{sessionId}/{dataPath}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonceProbe {
    /// The peer already holds this file for the session.
    pub file_exists: bool,
    /// Challenge to sign; always present when the file is absent.
    pub nonce: Option<String>,
}

impl NonceProbe {
    pub fn from_headers<'h>(header: impl Fn(&str) -> Option<&'h str>) -> Result<Self, ProtocolError> {
        let file_exists = required_bool(&header, HEADER_FILE_EXISTS)?;
        let nonce = header(HEADER_NONCE)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        if !file_exists && nonce.is_none() {
            return Err(ProtocolError::MissingHeader(HEADER_NONCE));
        }
        Ok(Self { file_exists, nonce })
    }
}

/// JSON body of `POST /upload/{storeId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStartResponse {
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

impl SessionStartResponse {
    pub fn from_slice(body: &[u8]) -> Result<Self, ProtocolError> {
        let resp: SessionStartResponse = serde_json::from_slice(body)?;
        if resp.session_id.trim().is_empty() {
            return Err(ProtocolError::InvalidResponse("empty sessionId".into()));
        }
        Ok(resp)
    }
}

/// JSON body of `POST /commit/{storeId}/{sessionId}`.
///
/// Peers report a free-form result object; only an explicit
/// `"committed": false` is read as a rejection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CommitResponse {
    /// Parses a commit body; an empty body counts as an empty result.
    pub fn from_slice(body: &[u8]) -> Result<Self, ProtocolError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        Ok(serde_json::from_slice(body)?)
    }

    pub fn is_rejected(&self) -> bool {
        self.committed == Some(false)
    }
}

fn required_bool<'h>(
    header: &impl Fn(&str) -> Option<&'h str>,
    name: &'static str,
) -> Result<bool, ProtocolError> {
    optional_bool(header, name)?.ok_or(ProtocolError::MissingHeader(name))
}

fn optional_bool<'h>(
    header: &impl Fn(&str) -> Option<&'h str>,
    name: &'static str,
) -> Result<Option<bool>, ProtocolError> {
    match header(name) {
        None => Ok(None),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Some(true)),
            "false" => Ok(Some(false)),
            _ => Err(invalid(name, raw)),
        },
    }
}

fn invalid(name: &'static str, value: &str) -> ProtocolError {
    ProtocolError::InvalidHeader {
        name,
        value: value.to_string(),
    }
}

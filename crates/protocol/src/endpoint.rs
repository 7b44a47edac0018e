//! Request paths for every call of the propagation protocol.

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use crate::constants::{QUERY_HAS_ROOT_HASH, QUERY_ROOT_HASH};

/// Characters escaped inside a single path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// One protocol call, addressed against a peer base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint<'a> {
    /// `HEAD /{storeId}[?hasRootHash=]`
    ProbeStore {
        store_id: &'a str,
        root_hash: Option<&'a str>,
    },
    /// `HEAD /store/{storeId}/{rootHash}/{dataPath}`
    ProbeFile {
        store_id: &'a str,
        root_hash: &'a str,
        data_path: &'a str,
    },
    /// `POST /upload/{storeId}?roothash=`
    StartSession {
        store_id: &'a str,
        root_hash: &'a str,
    },
    /// `HEAD /upload/{storeId}/{sessionId}/{dataPath}`
    FileNonce {
        store_id: &'a str,
        session_id: &'a str,
        data_path: &'a str,
    },
    /// `PUT /upload/{storeId}/{sessionId}/{dataPath}`
    UploadFile {
        store_id: &'a str,
        session_id: &'a str,
        data_path: &'a str,
    },
    /// `POST /commit/{storeId}/{sessionId}`
    Commit {
        store_id: &'a str,
        session_id: &'a str,
    },
    /// `GET /fetch/{storeId}/{dataPath}`
    Fetch {
        store_id: &'a str,
        data_path: &'a str,
    },
}

impl Endpoint<'_> {
    /// HTTP method of the call.
    pub fn method(&self) -> &'static str {
        match self {
            Endpoint::ProbeStore { .. } | Endpoint::ProbeFile { .. } | Endpoint::FileNonce { .. } => {
                "HEAD"
            }
            Endpoint::StartSession { .. } | Endpoint::Commit { .. } => "POST",
            Endpoint::UploadFile { .. } => "PUT",
            Endpoint::Fetch { .. } => "GET",
        }
    }

    /// Percent-encoded path, starting with `/`.
    pub fn path(&self) -> String {
        match *self {
            Endpoint::ProbeStore { store_id, .. } => format!("/{}", segment(store_id)),
            Endpoint::ProbeFile {
                store_id,
                root_hash,
                data_path,
            } => format!(
                "/store/{}/{}/{}",
                segment(store_id),
                segment(root_hash),
                nested(data_path)
            ),
            Endpoint::StartSession { store_id, .. } => format!("/upload/{}", segment(store_id)),
            Endpoint::FileNonce {
                store_id,
                session_id,
                data_path,
            }
            | Endpoint::UploadFile {
                store_id,
                session_id,
                data_path,
            } => format!(
                "/upload/{}/{}/{}",
                segment(store_id),
                segment(session_id),
                nested(data_path)
            ),
            Endpoint::Commit {
                store_id,
                session_id,
            } => format!("/commit/{}/{}", segment(store_id), segment(session_id)),
            Endpoint::Fetch {
                store_id,
                data_path,
            } => format!("/fetch/{}/{}", segment(store_id), nested(data_path)),
        }
    }

    /// Query parameters of the call (empty for most calls).
    pub fn query(&self) -> Vec<(&'static str, String)> {
        match *self {
            Endpoint::ProbeStore {
                root_hash: Some(hash),
                ..
            } => vec![(QUERY_HAS_ROOT_HASH, hash.to_string())],
            Endpoint::StartSession { root_hash, .. } => {
                vec![(QUERY_ROOT_HASH, root_hash.to_string())]
            }
            _ => Vec::new(),
        }
    }
}

fn segment(value: &str) -> String {
    utf8_percent_encode(value, SEGMENT).to_string()
}

/// Encodes a relative path segment by segment, keeping its `/` separators.
fn nested(path: &str) -> String {
    path.trim_start_matches('/')
        .split('/')
        .map(segment)
        .collect::<Vec<_>>()
        .join("/")
}

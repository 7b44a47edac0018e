//! Header and query parameter names used by the peer protocol.

/// `HEAD /{storeId}`: whether the store is known to the peer.
pub const HEADER_STORE_EXISTS: &str = "x-store-exists";

/// `HEAD /{storeId}?hasRootHash=`: whether the snapshot is committed.
pub const HEADER_HAS_ROOT_HASH: &str = "x-has-root-hash";

/// Per-file existence flag (committed store probe and upload nonce probe).
pub const HEADER_FILE_EXISTS: &str = "x-file-exists";

/// Size in bytes of a committed file.
pub const HEADER_FILE_SIZE: &str = "x-file-size";

/// Per-file, per-session challenge issued by the peer.
pub const HEADER_NONCE: &str = "x-nonce";

/// Hex-encoded public key of the uploader.
pub const HEADER_PUBLIC_KEY: &str = "x-public-key";

/// Hex-encoded signature over the nonce.
pub const HEADER_KEY_OWNERSHIP_SIG: &str = "x-key-ownership-sig";

/// Query parameter qualifying a store probe with a root hash.
pub const QUERY_HAS_ROOT_HASH: &str = "hasRootHash";

/// Query parameter naming the snapshot of a new upload session.
pub const QUERY_ROOT_HASH: &str = "roothash";

/// Multipart field carrying the manifest on session start.
pub const MANIFEST_FIELD: &str = "file";

/// Extension of a serialized manifest.
pub const MANIFEST_EXTENSION: &str = "dat";

/// Default HTTPS port of a propagation peer.
pub const DEFAULT_PEER_PORT: u16 = 8575;

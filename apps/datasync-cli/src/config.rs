//! CLI configuration.
//!
//! Stored as JSON at `$XDG_CONFIG_HOME/datasync/config.json`
//! (`~/.config/datasync/config.json` when unset). A missing file means
//! defaults; command-line flags override individual fields.

use std::path::{Path, PathBuf};

use anyhow::Context;
use datasync_peer::PeerConfig;
use datasync_replicate::SyncConfig;
use serde::{Deserialize, Serialize};

/// Everything the CLI needs to reach a peer and the local store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub peer: PeerConfig,
    pub sync: SyncConfig,
    /// Root directory of the local content store.
    pub store_root: PathBuf,
    /// File holding the hex-encoded ed25519 seed used to sign uploads.
    pub signing_key: PathBuf,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            peer: PeerConfig::default(),
            sync: SyncConfig::default(),
            store_root: data_dir(),
            signing_key: config_dir().join("signing.key"),
        }
    }
}

impl CliConfig {
    /// Loads `path`, or the default location when `None`.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_dir().join("config.json"),
        };
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: CliConfig = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        config.sync.validate()?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }
}

fn home() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

fn config_dir() -> PathBuf {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| home().join(".config"))
        .join("datasync")
}

fn data_dir() -> PathBuf {
    std::env::var_os("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| home().join(".local").join("share"))
        .join("datasync")
}

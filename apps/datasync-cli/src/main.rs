//! `datasync` entry point: push, pull and probe DataStore snapshots.

mod config;
mod prompt;
mod signer;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use datasync_peer::{Credentials, PeerClient, SecureChannel};
use datasync_replicate::{
    CredentialPrompt, DownloadSession, StaticCredentials, SyncConfig, UploadOutcome, UploadSession,
};
use datasync_transfer::{FailurePolicy, FsContentStore, LogProgress};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::CliConfig;
use prompt::StdinPrompt;
use signer::Ed25519Signer;

/// Replicate content-addressed DataStore snapshots with one peer.
#[derive(Parser, Debug)]
#[command(name = "datasync", version, about, long_about = None)]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Peer host name or address.
    #[arg(long, global = true)]
    host: Option<String>,

    /// Peer HTTPS port.
    #[arg(long, global = true)]
    port: Option<u16>,

    /// PEM client certificate.
    #[arg(long, global = true)]
    cert: Option<PathBuf>,

    /// PEM client private key.
    #[arg(long, global = true)]
    key: Option<PathBuf>,

    /// Root of the local content store.
    #[arg(long, global = true)]
    store_root: Option<PathBuf>,

    /// Whole-request timeout in seconds.
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a local snapshot to the peer and commit it.
    Push {
        store_id: String,
        root_hash: String,
        /// Hex ed25519 seed file used to sign upload nonces.
        #[arg(long)]
        signing_key: Option<PathBuf>,
        /// Concurrent file uploads.
        #[arg(long)]
        concurrency: Option<usize>,
        /// Stop outstanding transfers as soon as one fails.
        #[arg(long)]
        cancel_siblings: bool,
        /// Basic-auth user for creating the store on the peer; prompts when absent.
        #[arg(long, requires = "password")]
        username: Option<String>,
        /// Basic-auth password paired with `--username`.
        #[arg(long, requires = "username")]
        password: Option<String>,
    },

    /// Download a snapshot from the peer into the local store.
    Pull {
        store_id: String,
        root_hash: String,
        /// Concurrent file downloads.
        #[arg(long)]
        concurrency: Option<usize>,
        /// Stop outstanding transfers as soon as one fails.
        #[arg(long)]
        cancel_siblings: bool,
        /// Skip sha256 verification of downloaded files.
        #[arg(long)]
        no_verify: bool,
    },

    /// Ask the peer whether it has a store, snapshot or file.
    Probe {
        store_id: String,
        /// Snapshot root hash to look for.
        #[arg(long)]
        root: Option<String>,
        /// Data path to look for within `--root`.
        #[arg(long, requires = "root")]
        path: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,datasync=debug")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = CliConfig::load(cli.config.as_deref())?;
    apply_overrides(&mut config, &cli);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(cli.command, config))
}

fn apply_overrides(config: &mut CliConfig, cli: &Cli) {
    if let Some(host) = &cli.host {
        config.peer.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.peer.port = port;
    }
    if let Some(cert) = &cli.cert {
        config.peer.cert_path = cert.clone();
    }
    if let Some(key) = &cli.key {
        config.peer.key_path = key.clone();
    }
    if let Some(root) = &cli.store_root {
        config.store_root = root.clone();
    }
    if let Some(secs) = cli.timeout {
        config.peer.request_timeout_secs = Some(secs);
    }
    if config.peer.request_timeout_secs.is_none() {
        config.peer.request_timeout_secs = config.sync.request_timeout_secs;
    }
}

fn tune(sync: &mut SyncConfig, concurrency: Option<usize>, cancel_siblings: bool, upload: bool) {
    if let Some(n) = concurrency {
        if upload {
            sync.upload_concurrency = n;
        } else {
            sync.download_concurrency = n;
        }
    }
    if cancel_siblings {
        sync.failure_policy = FailurePolicy::CancelSiblings;
    }
}

/// Credentials given on the command line, or an interactive prompt.
fn credential_source(
    username: Option<String>,
    password: Option<String>,
) -> Box<dyn CredentialPrompt> {
    match (username, password) {
        (Some(user), Some(pass)) => {
            Box::new(StaticCredentials(Some(Credentials::new(user, pass))))
        }
        _ => Box::new(StdinPrompt),
    }
}

async fn run(command: Command, mut config: CliConfig) -> anyhow::Result<()> {
    let channel = SecureChannel::from_config(&config.peer)
        .await
        .context("loading client certificate")?;
    let peer = PeerClient::new(&channel, &config.peer.host, config.peer.port);
    let store = FsContentStore::new(&config.store_root);
    let progress = LogProgress::new(None);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling transfers");
                cancel.cancel();
            }
        }
    });

    match command {
        Command::Push {
            store_id,
            root_hash,
            signing_key,
            concurrency,
            cancel_siblings,
            username,
            password,
        } => {
            tune(&mut config.sync, concurrency, cancel_siblings, true);
            let prompt = credential_source(username, password);
            let key_path = signing_key.unwrap_or_else(|| config.signing_key.clone());
            let signer = Ed25519Signer::load(&key_path)?;

            let outcome = UploadSession::new(&peer, &store, &signer, prompt.as_ref(), &config.sync)
                .with_progress(&progress)
                .with_cancel(cancel)
                .run(&store_id, &root_hash)
                .await?;
            match outcome {
                UploadOutcome::AlreadyReplicated => {
                    println!("{root_hash}: already on {}", peer.address());
                }
                UploadOutcome::Committed {
                    session_id,
                    uploaded,
                    skipped,
                    bytes,
                } => {
                    println!(
                        "{root_hash}: committed on {} (session {session_id}, {uploaded} uploaded, {skipped} already present, {bytes} bytes)",
                        peer.address()
                    );
                }
            }
        }

        Command::Pull {
            store_id,
            root_hash,
            concurrency,
            cancel_siblings,
            no_verify,
        } => {
            tune(&mut config.sync, concurrency, cancel_siblings, false);
            if no_verify {
                config.sync.verify_downloads = false;
            }

            let outcome = DownloadSession::new(&peer, &store, &config.sync)
                .with_progress(&progress)
                .with_cancel(cancel)
                .run(&store_id, &root_hash)
                .await?;
            println!(
                "{root_hash}: {} files, {} bytes -> {}",
                outcome.files,
                outcome.bytes,
                outcome.manifest_path.display()
            );
        }

        Command::Probe {
            store_id,
            root,
            path,
        } => {
            let probe = peer.probe_store(&store_id, root.as_deref()).await?;
            println!("store {store_id}: exists={}", probe.store_exists);
            if let Some(root) = &root {
                println!("snapshot {root}: exists={}", probe.root_hash_exists);
                if let Some(path) = &path {
                    let file = peer.probe_file(&store_id, root, path).await?;
                    println!("file {path}: exists={} size={}", file.exists, file.size);
                }
            }
        }
    }

    info!("done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "datasync",
            "--host",
            "peer.example",
            "--port",
            "9443",
            "--timeout",
            "30",
            "pull",
            "s1",
            "r1",
        ]);
        let mut config = CliConfig::default();
        apply_overrides(&mut config, &cli);
        assert_eq!(config.peer.address(), "peer.example:9443");
        assert_eq!(config.peer.request_timeout_secs, Some(30));
    }

    #[test]
    fn sync_timeout_is_the_fallback() {
        let cli = Cli::parse_from(["datasync", "probe", "s1"]);
        let mut config = CliConfig::default();
        config.sync.request_timeout_secs = Some(12);
        apply_overrides(&mut config, &cli);
        assert_eq!(config.peer.request_timeout_secs, Some(12));
    }

    #[test]
    fn tune_targets_one_direction() {
        let mut sync = SyncConfig::default();
        tune(&mut sync, Some(8), true, true);
        assert_eq!(sync.upload_concurrency, 8);
        assert_eq!(sync.download_concurrency, 5);
        assert_eq!(sync.failure_policy, FailurePolicy::CancelSiblings);
    }

    #[tokio::test]
    async fn push_credentials_come_from_flags() {
        let cli = Cli::parse_from([
            "datasync", "push", "s1", "r1", "--username", "alice", "--password", "pw",
        ]);
        let Command::Push {
            username, password, ..
        } = cli.command
        else {
            panic!("expected push");
        };
        let prompt = credential_source(username, password);
        assert_eq!(
            prompt.ask("peer:443").await.unwrap(),
            Credentials::new("alice", "pw")
        );
    }

    #[test]
    fn username_and_password_go_together() {
        assert!(Cli::try_parse_from(["datasync", "push", "s1", "r1", "--username", "u"]).is_err());
        assert!(Cli::try_parse_from(["datasync", "push", "s1", "r1", "--password", "p"]).is_err());
    }

    #[test]
    fn probe_path_requires_root() {
        assert!(Cli::try_parse_from(["datasync", "probe", "s1", "--path", "data/x"]).is_err());
        assert!(
            Cli::try_parse_from(["datasync", "probe", "s1", "--root", "r", "--path", "data/x"])
                .is_ok()
        );
    }
}

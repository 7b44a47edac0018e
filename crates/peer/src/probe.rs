//! Existence checks answered through response headers.

use datasync_protocol::constants::{HEADER_FILE_EXISTS, HEADER_STORE_EXISTS};
use datasync_protocol::{Endpoint, FileProbe, StoreProbe};
use tracing::debug;

use crate::client::{PeerClient, ensure_success, header_lookup};
use crate::error::PeerError;

impl PeerClient {
    /// Asks whether the peer knows `store_id`, and optionally whether it
    /// already holds the snapshot `root_hash`.
    ///
    /// Peers answer an unknown store with a non-2xx status that still
    /// carries the existence header, so the header wins over the status.
    pub async fn probe_store(
        &self,
        store_id: &str,
        root_hash: Option<&str>,
    ) -> Result<StoreProbe, PeerError> {
        let resp = self
            .request(Endpoint::ProbeStore {
                store_id,
                root_hash,
            })
            .send()
            .await?;
        let resp = if resp.headers().contains_key(HEADER_STORE_EXISTS) {
            resp
        } else {
            ensure_success(resp).await?
        };

        let probe = StoreProbe::from_headers(header_lookup(resp.headers()))?;
        debug!(
            peer = %self.address(),
            store = %store_id,
            store_exists = probe.store_exists,
            root_hash_exists = probe.root_hash_exists,
            "store probed"
        );
        Ok(probe)
    }

    /// Asks whether the peer already holds one file of a snapshot.
    pub async fn probe_file(
        &self,
        store_id: &str,
        root_hash: &str,
        data_path: &str,
    ) -> Result<FileProbe, PeerError> {
        let resp = self
            .request(Endpoint::ProbeFile {
                store_id,
                root_hash,
                data_path,
            })
            .send()
            .await?;
        let resp = if resp.headers().contains_key(HEADER_FILE_EXISTS) {
            resp
        } else {
            ensure_success(resp).await?
        };
        Ok(FileProbe::from_headers(header_lookup(resp.headers()))?)
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{MockResponse, MockServer};
    use crate::{PeerClient, PeerError, SecureChannel};

    fn client_for(server: &MockServer) -> PeerClient {
        PeerClient::with_base_url(
            &SecureChannel::from_client(reqwest::Client::new()),
            server.base_url(),
        )
    }

    #[tokio::test]
    async fn probe_store_with_root_hash() {
        let server = MockServer::start(vec![
            MockResponse::empty(200)
                .with_header("x-store-exists", "true")
                .with_header("x-has-root-hash", "true"),
        ])
        .await;
        let probe = client_for(&server)
            .probe_store("store1", Some("root1"))
            .await
            .unwrap();
        assert!(probe.store_exists);
        assert!(probe.root_hash_exists);

        let req = server.request(0);
        assert_eq!(req.method, "HEAD");
        assert_eq!(req.target, "/store1?hasRootHash=root1");
    }

    #[tokio::test]
    async fn probe_store_without_root_hash_has_no_query() {
        let server = MockServer::start(vec![
            MockResponse::empty(200).with_header("x-store-exists", "true"),
        ])
        .await;
        let probe = client_for(&server).probe_store("store1", None).await.unwrap();
        assert!(probe.store_exists);
        assert!(!probe.root_hash_exists);
        assert_eq!(server.request(0).target, "/store1");
    }

    #[tokio::test]
    async fn unknown_store_reported_on_404() {
        let server = MockServer::start(vec![
            MockResponse::empty(404).with_header("x-store-exists", "false"),
        ])
        .await;
        let probe = client_for(&server)
            .probe_store("fresh", Some("root"))
            .await
            .unwrap();
        assert!(!probe.store_exists);
        assert!(!probe.root_hash_exists);
    }

    #[tokio::test]
    async fn probe_failure_without_headers_is_an_error() {
        let server = MockServer::start(vec![MockResponse::empty(500)]).await;
        let err = client_for(&server)
            .probe_store("s", None)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn missing_header_on_success_is_malformed() {
        let server = MockServer::start(vec![MockResponse::empty(200)]).await;
        let err = client_for(&server)
            .probe_store("s", None)
            .await
            .unwrap_err();
        assert!(matches!(err, PeerError::Protocol(_)));
    }

    #[tokio::test]
    async fn probe_file_reports_size() {
        let server = MockServer::start(vec![
            MockResponse::empty(200)
                .with_header("x-file-exists", "true")
                .with_header("x-file-size", "1024"),
        ])
        .await;
        let probe = client_for(&server)
            .probe_file("s", "r", "data/ab/cd/abcd")
            .await
            .unwrap();
        assert!(probe.exists);
        assert_eq!(probe.size, 1024);
        assert_eq!(server.request(0).target, "/store/s/r/data/ab/cd/abcd");
    }
}

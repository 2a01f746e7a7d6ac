//! Axum-based HTTP server.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::handlers;
use crate::{RpcError, RpcState};

/// All routes, bound to `state`.
pub fn router(state: RpcState) -> Router {
    Router::new()
        .route("/status", get(handlers::status))
        .route("/metrics", get(handlers::metrics))
        .route("/resync", post(handlers::resync))
        .route("/v1/identity", get(handlers::list_identities))
        .route(
            "/v1/identity/address/:address",
            get(handlers::identities_by_address),
        )
        .route("/v1/identity/:id_key", get(handlers::get_identity))
        .route("/v1/attestation/:hash", get(handlers::get_attestation))
        .route("/v1/profile/:id_key", get(handlers::get_profile))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub struct RpcServer {
    pub port: u16,
    state: RpcState,
}

impl RpcServer {
    pub fn new(port: u16, state: RpcState) -> Self {
        Self { port, state }
    }

    /// Serve until the task is dropped.
    pub async fn start(&self) -> Result<(), RpcError> {
        let app = router(self.state.clone());
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| RpcError::Server(format!("bind {addr}: {e}")))?;
        info!("RPC server listening on {}", addr);
        axum::serve(listener, app)
            .await
            .map_err(|e| RpcError::Server(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IndexerControl, IndexerStatus};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use bap_nullables::NullStore;
    use bap_store::{AttestationStore, IdentityStore, ProfileStore};
    use bap_types::{
        Attestation, BitcoinAddress, BlockContext, BlockHeight, ClaimHash, IdKey, Identity,
        Profile, Signer, Timestamp, TxHash,
    };
    use serde_json::Value;
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    const ALICE_ADDR: &str = "1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2";

    #[derive(Default)]
    struct FakeControl {
        resyncs: Mutex<Vec<BlockHeight>>,
        refuse: bool,
    }

    impl IndexerControl for FakeControl {
        fn status(&self) -> IndexerStatus {
            IndexerStatus {
                state: "streaming".into(),
                subscribed_from: 574_287,
                block_transactions: 3,
                checkpoint: Some(600_000),
            }
        }

        fn request_resync(&self, height: BlockHeight) -> Result<(), String> {
            if self.refuse {
                return Err("a resync is already pending".into());
            }
            self.resyncs.lock().unwrap().push(height);
            Ok(())
        }

        fn metrics_text(&self) -> String {
            "bap_transactions_total 7\n".into()
        }
    }

    fn ctx(height: BlockHeight) -> BlockContext {
        BlockContext::new(height, Timestamp::new(1_600_000_000), TxHash::new([height as u8; 32]))
    }

    fn seeded_store() -> Arc<NullStore> {
        let store = Arc::new(NullStore::new());
        for (n, key) in ["alice", "bob", "carol"].iter().enumerate() {
            let address = if *key == "alice" {
                BitcoinAddress::new(ALICE_ADDR)
            } else {
                BitcoinAddress::new(format!("1{key}Address{n}xxxxxxxxxxxxxx"))
            };
            let identity = Identity::create(IdKey::new(*key), address, &ctx(100 + n as u32));
            store.put_identity(&identity).unwrap();
        }
        let signer = Signer::new(
            IdKey::new("alice"),
            BitcoinAddress::new(ALICE_ADDR),
            1,
            &ctx(101),
        );
        store
            .put_attestation(&Attestation::new(ClaimHash::new([0xab; 32]), signer))
            .unwrap();
        let mut data = serde_json::Map::new();
        data.insert("name".into(), Value::from("Alice"));
        store
            .put_profile(&Profile::new(IdKey::new("alice"), data, &ctx(102)))
            .unwrap();
        store
    }

    fn app_with(control: Arc<FakeControl>) -> Router {
        router(RpcState::new(seeded_store(), control))
    }

    fn app() -> Router {
        app_with(Arc::new(FakeControl::default()))
    }

    async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
        call(app, Request::get(uri).body(Body::empty()).unwrap()).await
    }

    #[tokio::test]
    async fn status_reports_indexer_and_counts() {
        let (status, body) = get(app(), "/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "OK");
        assert_eq!(body["result"]["indexer"]["checkpoint"], 600_000);
        assert_eq!(body["result"]["identities"], 3);
        assert_eq!(body["result"]["attestations"], 1);
        assert_eq!(body["result"]["profiles"], 1);
        assert!(body.get("message").is_none());
    }

    #[tokio::test]
    async fn metrics_are_plain_text() {
        let response = app()
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"bap_transactions_total 7\n");
    }

    #[tokio::test]
    async fn resync_reaches_the_control() {
        let control = Arc::new(FakeControl::default());
        let request = Request::post("/resync")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"height":580000}"#))
            .unwrap();
        let (status, body) = call(app_with(control.clone()), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "OK");
        assert_eq!(*control.resyncs.lock().unwrap(), vec![580_000]);
    }

    #[tokio::test]
    async fn refused_resync_is_a_conflict() {
        let control = Arc::new(FakeControl {
            refuse: true,
            ..Default::default()
        });
        let request = Request::post("/resync")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"height":1}"#))
            .unwrap();
        let (status, body) = call(app_with(control), request).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["status"], "ERROR");
        assert_eq!(body["message"], "a resync is already pending");
    }

    #[tokio::test]
    async fn identity_lookups() {
        let (status, body) = get(app(), "/v1/identity/alice").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["idKey"], "alice");
        assert_eq!(body["result"]["currentAddress"], ALICE_ADDR);

        let (status, body) = get(app(), &format!("/v1/identity/address/{ALICE_ADDR}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"][0]["idKey"], "alice");

        let (status, body) = get(app(), "/v1/identity/nobody").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "ERROR");

        let (status, _) = get(app(), "/v1/identity/address/not-an-address").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn identity_listing_is_newest_first() {
        let (status, body) = get(app(), "/v1/identity?limit=2").await;
        assert_eq!(status, StatusCode::OK);
        let keys: Vec<&str> = body["result"]["identities"]
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["idKey"].as_str().unwrap())
            .collect();
        assert_eq!(keys, vec!["carol", "bob"]);
        assert_eq!(body["result"]["pagination"]["total"], 3);
        assert_eq!(body["result"]["pagination"]["nextOffset"], 2);

        let (_, body) = get(app(), "/v1/identity?offset=2&limit=2").await;
        assert_eq!(body["result"]["identities"][0]["idKey"], "alice");
        assert!(body["result"]["pagination"].get("nextOffset").is_none());
    }

    #[tokio::test]
    async fn attestation_and_profile_lookups() {
        let hash = "ab".repeat(32);
        let (status, body) = get(app(), &format!("/v1/attestation/{hash}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["signers"][0]["idKey"], "alice");

        let (status, _) = get(app(), "/v1/attestation/zz").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get(app(), &format!("/v1/attestation/{}", "00".repeat(32))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = get(app(), "/v1/profile/alice").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["data"]["name"], "Alice");
    }
}

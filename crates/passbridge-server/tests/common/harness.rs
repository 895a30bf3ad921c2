//! Test harness for HTTP integration tests.
//!
//! Provides a `TestServer` that owns a temporary password store, a reloader
//! wired to the deterministic fake crypto engine, and a running HTTP server
//! on an ephemeral port, along with request convenience methods.

use std::sync::{Arc, Once};

use passbridge_core::testing::{FakeEngine, TempStore, unwrap_response};
use passbridge_core::{CryptoEngine, ReloadReport, Reloader, SnapshotError};
use passbridge_server::{HttpServer, SecretRouter, ServerConfig};
use reqwest::{Response, StatusCode, header};
use serde_json::{Value, json};

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A live server over a temporary store, stopped on drop.
pub struct TestServer {
    pub store: TempStore,
    pub reloader: Arc<Reloader>,
    server: HttpServer,
    client: reqwest::Client,
}

impl TestServer {
    /// Serve `store` through the fake engine.
    pub async fn start(store: TempStore) -> Self {
        Self::start_with_engine(store, Arc::new(FakeEngine)).await
    }

    pub async fn start_with_engine(store: TempStore, engine: Arc<dyn CryptoEngine>) -> Self {
        init_tracing();
        let reloader = Arc::new(
            Reloader::bootstrap(store.path(), engine).expect("Initial snapshot build failed"),
        );
        let router = SecretRouter::new(Arc::clone(reloader.registry()));
        let server = HttpServer::start(router, ServerConfig::ephemeral())
            .await
            .expect("Failed to start server");
        Self {
            store,
            reloader,
            server,
            client: reqwest::Client::new(),
        }
    }

    /// The single-secret store used by the reference scenario.
    pub async fn with_scenario_store() -> Self {
        let store = TempStore::with_recipients(&["A"]);
        store.add_secret("social/example.com", "alice", b"alice-ciphertext");
        Self::start(store).await
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.server.url())
    }

    /// Rebuild from disk on a blocking thread, as the signal handler does.
    pub async fn reload(&self) -> Result<ReloadReport, SnapshotError> {
        let reloader = Arc::clone(&self.reloader);
        tokio::task::spawn_blocking(move || reloader.reload())
            .await
            .expect("Reload task panicked")
    }

    /// POST `body` as JSON.
    pub async fn post_json(&self, path: &str, body: &Value) -> Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Request failed")
    }

    /// POST raw bytes with an arbitrary (or no) content type.
    pub async fn post_raw(&self, path: &str, content_type: Option<&str>, body: &str) -> Response {
        let mut request = self.client.post(self.url(path)).body(body.to_owned());
        if let Some(content_type) = content_type {
            request = request.header(header::CONTENT_TYPE, content_type);
        }
        request.send().await.expect("Request failed")
    }

    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("Request failed")
    }

    /// Fetch the catalog and return its raw response body.
    pub async fn catalog(&self) -> Response {
        self.post_json("/secrets/", &json!({})).await
    }

    pub async fn secret(&self, path: &str, username: Value) -> Response {
        self.post_json("/secret/", &json!({ "path": path, "username": username }))
            .await
    }

    /// Fetch the catalog and decrypt it with the fake engine.
    pub async fn catalog_entries(&self) -> (Vec<String>, Value) {
        let response = self.catalog().await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.bytes().await.expect("Failed to read body");
        let (recipients, plaintext) =
            FakeEngine::decrypt(&unwrap_response(&body)).expect("Catalog is not fake-encrypted");
        let entries = serde_json::from_slice(&plaintext).expect("Catalog is not JSON");
        (recipients, entries)
    }
}

/// Read an armored secret response and return the bytes inside the armor.
pub async fn secret_body(response: Response) -> Vec<u8> {
    assert_eq!(response.status(), StatusCode::OK, "secret fetch failed");
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    let body = response.bytes().await.expect("Failed to read body");
    let (_, data) = passbridge_core::crypto::armor::decode(&unwrap_response(&body))
        .expect("Secret is not armored");
    data
}

/// Assert a JSON error envelope with the given status and message.
pub async fn assert_json_error(response: Response, status: StatusCode, message: &str) {
    assert_eq!(response.status(), status);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    let text = response.text().await.expect("Failed to read body");
    assert!(text.ends_with('\n'), "error body should end with a newline");
    let value: Value = serde_json::from_str(&text).expect("Error body is not JSON");
    assert_eq!(value["error"], message);
}

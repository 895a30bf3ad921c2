//! Request routing and lookups against the live snapshot.

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{self, HeaderMap};
use hyper::{Method, Request, Response, StatusCode};
use passbridge_core::SnapshotRegistry;
use serde::de::IgnoredAny;
use tracing::{debug, trace, warn};

use crate::error::{RequestError, ValidationError, json_response};
use crate::request::SecretRequest;

/// Largest request body accepted, in bytes.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

const CATALOG_PREFIX: &str = "/secrets/";
const SECRET_PREFIX: &str = "/secret/";
const JSON_MEDIA_TYPE: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Catalog,
    Secret,
}

impl Route {
    fn for_path(path: &str) -> Option<Self> {
        if path.starts_with(CATALOG_PREFIX) {
            Some(Route::Catalog)
        } else if path.starts_with(SECRET_PREFIX) {
            Some(Route::Secret)
        } else {
            None
        }
    }
}

/// Answers requests from whatever snapshot the registry holds.
///
/// Cloning is cheap; every connection gets its own clone.
#[derive(Debug, Clone)]
pub struct SecretRouter {
    registry: Arc<SnapshotRegistry>,
    body_limit: usize,
}

impl SecretRouter {
    pub fn new(registry: Arc<SnapshotRegistry>) -> Self {
        Self {
            registry,
            body_limit: MAX_BODY_BYTES,
        }
    }

    /// Override the request body cap.
    #[must_use]
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn registry(&self) -> &Arc<SnapshotRegistry> {
        &self.registry
    }

    /// Answer one HTTP request. Never fails: errors become error responses.
    pub async fn handle<B>(&self, request: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let method = request.method().clone();
        let path = request.uri().path().to_owned();

        match self.dispatch(request).await {
            Ok(body) => {
                trace!(%method, %path, bytes = body.len(), "Request served");
                json_response(StatusCode::OK, body)
            }
            Err(e) => {
                let status = e.status();
                if status.is_server_error() {
                    warn!(%method, %path, status = status.as_u16(), error = %e, "Request failed");
                } else {
                    debug!(%method, %path, status = status.as_u16(), error = %e, "Request rejected");
                }
                e.into_response()
            }
        }
    }

    async fn dispatch<B>(&self, request: Request<B>) -> Result<Bytes, RequestError>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let route = Route::for_path(request.uri().path()).ok_or(RequestError::NoRoute)?;
        if request.method() != Method::POST {
            return Err(ValidationError::MethodNotAllowed.into());
        }
        if !is_json(request.headers()) {
            return Err(ValidationError::UnsupportedMediaType.into());
        }

        let body = read_body(request.into_body(), self.body_limit).await?;
        match route {
            Route::Catalog => self.catalog_fetch(&body),
            Route::Secret => self.secret_fetch(&body),
        }
    }

    /// Catalog fetch: the body must be JSON but its content is ignored.
    pub fn catalog_fetch(&self, body: &[u8]) -> Result<Bytes, RequestError> {
        serde_json::from_slice::<IgnoredAny>(body).map_err(ValidationError::Malformed)?;
        Ok(self.registry.current().catalog_body().clone())
    }

    /// Secret fetch: look one identity up in the current snapshot.
    pub fn secret_fetch(&self, body: &[u8]) -> Result<Bytes, RequestError> {
        let identity = SecretRequest::from_slice(body)?.identity()?;
        self.registry
            .current()
            .secret_body(&identity)
            .cloned()
            .ok_or(RequestError::UnknownSecret)
    }
}

/// Whether the request declares a JSON body.
///
/// Only the media type is compared, case-insensitively; parameters such as
/// `charset` are allowed.
fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|media_type| media_type.trim().eq_ignore_ascii_case(JSON_MEDIA_TYPE))
}

async fn read_body<B>(body: B, limit: usize) -> Result<Bytes, RequestError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => Err(ValidationError::PayloadTooLarge.into()),
        Err(e) => Err(RequestError::Body(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use passbridge_core::testing::{FakeEngine, TempStore, unwrap_response};
    use passbridge_core::{SecretIdentity, crypto::armor};

    fn router_for(store: &TempStore) -> SecretRouter {
        let snapshot = passbridge_core::assemble(store.path(), &FakeEngine).unwrap();
        SecretRouter::new(Arc::new(SnapshotRegistry::new(snapshot)))
    }

    fn scenario() -> (TempStore, SecretRouter) {
        let store = TempStore::with_recipients(&["A"]);
        store.add_secret("social/example.com", "alice", b"alice-ciphertext");
        store.add_secret("bank", "7", b"seven");
        let router = router_for(&store);
        (store, router)
    }

    fn request(method: Method, path: &str, content_type: Option<&str>, body: &str) -> Request<Full<Bytes>> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        builder.body(Full::new(Bytes::from(body.to_owned()))).unwrap()
    }

    fn post(path: &str, body: &str) -> Request<Full<Bytes>> {
        request(Method::POST, path, Some("application/json"), body)
    }

    async fn body_bytes(response: Response<Full<Bytes>>) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[test]
    fn test_route_matching() {
        assert_eq!(Route::for_path("/secrets/"), Some(Route::Catalog));
        assert_eq!(Route::for_path("/secrets/anything"), Some(Route::Catalog));
        assert_eq!(Route::for_path("/secret/"), Some(Route::Secret));
        assert_eq!(Route::for_path("/secret/x/y"), Some(Route::Secret));
        assert_eq!(Route::for_path("/secret"), None);
        assert_eq!(Route::for_path("/"), None);
        assert_eq!(Route::for_path("/other/"), None);
    }

    #[test]
    fn test_is_json() {
        let mut headers = HeaderMap::new();
        assert!(!is_json(&headers));
        for (value, expected) in [
            ("application/json", true),
            ("Application/JSON", true),
            ("application/json; charset=utf-8", true),
            ("text/plain", false),
            ("application/json-patch+json", false),
            ("", false),
        ] {
            headers.insert(header::CONTENT_TYPE, value.parse().unwrap());
            assert_eq!(is_json(&headers), expected, "{value:?}");
        }
    }

    #[tokio::test]
    async fn test_secret_hit_returns_precomputed_body() {
        let (_store, router) = scenario();
        let response = router
            .handle(post("/secret/", r#"{"path":"social/example.com","username":"alice"}"#))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

        let expected = router
            .registry()
            .current()
            .secret_body(&SecretIdentity::new("social/example.com", "alice"))
            .cloned()
            .unwrap();
        let body = body_bytes(response).await;
        assert_eq!(body, expected);
        let (_, data) = armor::decode(&unwrap_response(&body)).unwrap();
        assert_eq!(data, b"alice-ciphertext");
    }

    #[tokio::test]
    async fn test_secret_miss_is_unknown_secret() {
        let (_store, router) = scenario();
        let response = router
            .handle(post("/secret/", r#"{"path":"social/example.com","username":"bob"}"#))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(&body_bytes(response).await[..], b"{\"error\":\"unknown secret\"}\n");
    }

    #[tokio::test]
    async fn test_numeric_username_hits() {
        let (_store, router) = scenario();
        let numeric = router.secret_fetch(br#"{"path":"bank","username":7}"#).unwrap();
        let text = router.secret_fetch(br#"{"path":"bank","username":"7"}"#).unwrap();
        assert_eq!(numeric, text);
    }

    #[tokio::test]
    async fn test_catalog_fetch_ignores_body_content() {
        let (_store, router) = scenario();
        let expected = router.registry().current().catalog_body().clone();
        for body in ["{}", "[]", "null", r#"{"anything": [1, 2, 3]}"#] {
            let response = router.handle(post("/secrets/", body)).await;
            assert_eq!(response.status(), StatusCode::OK, "{body}");
            assert_eq!(body_bytes(response).await, expected);
        }
    }

    #[tokio::test]
    async fn test_catalog_fetch_rejects_malformed_json() {
        let (_store, router) = scenario();
        let response = router.handle(post("/secrets/", "{not json")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_non_post_is_405() {
        let (_store, router) = scenario();
        for method in [Method::GET, Method::PUT, Method::DELETE] {
            let response = router
                .handle(request(method.clone(), "/secret/", Some("application/json"), "{}"))
                .await;
            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{method}");
            assert_eq!(response.headers()[header::ALLOW], "POST");
        }
    }

    #[tokio::test]
    async fn test_wrong_content_type_is_415() {
        let (_store, router) = scenario();
        let response = router
            .handle(request(Method::POST, "/secrets/", Some("text/plain"), "{}"))
            .await;
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let response = router.handle(request(Method::POST, "/secrets/", None, "{}")).await;
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let (_store, router) = scenario();
        let response = router.handle(post("/catalog", "{}")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_oversized_body_is_413() {
        let (_store, router) = scenario();
        let router = router.with_body_limit(16);
        let body = format!(r#"{{"path":"{}","username":"alice"}}"#, "x".repeat(64));
        let response = router.handle(post("/secret/", &body)).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_lookup_follows_registry_replacement() {
        let (store, router) = scenario();
        store.add_secret("social/example.com", "bob", b"bob-ciphertext");
        let next = passbridge_core::assemble(store.path(), &FakeEngine).unwrap();
        router.registry().replace(next);

        let body = router
            .secret_fetch(br#"{"path":"social/example.com","username":"bob"}"#)
            .unwrap();
        let (_, data) = armor::decode(&unwrap_response(&body)).unwrap();
        assert_eq!(data, b"bob-ciphertext");
    }
}

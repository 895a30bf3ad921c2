//! Request-time errors and their HTTP rendering.
//!
//! Gate failures (wrong method, wrong media type, unknown route) are answered
//! with a plain-text reason phrase. Everything past the gate is answered with
//! the JSON error envelope `{"error": "<message>"}` followed by a newline.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{self, HeaderValue};
use hyper::{Response, StatusCode};
use thiserror::Error;

/// The request itself is unacceptable.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("unsupported media type")]
    UnsupportedMediaType,

    #[error("request body too large")]
    PayloadTooLarge,

    /// The body is not valid JSON of the expected shape.
    #[error("{0}")]
    Malformed(#[source] serde_json::Error),

    /// `username` is missing or neither a string nor a number.
    #[error("bad username")]
    BadUsername,
}

/// Any failure while answering a request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Well-formed lookup for an identity the snapshot does not contain.
    #[error("unknown secret")]
    UnknownSecret,

    #[error("404 page not found")]
    NoRoute,

    /// Reading the request body failed.
    #[error("{0}")]
    Body(String),
}

impl RequestError {
    pub fn status(&self) -> StatusCode {
        match self {
            RequestError::Validation(ValidationError::MethodNotAllowed) => {
                StatusCode::METHOD_NOT_ALLOWED
            }
            RequestError::Validation(ValidationError::UnsupportedMediaType) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            RequestError::Validation(ValidationError::PayloadTooLarge) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            RequestError::Validation(
                ValidationError::Malformed(_) | ValidationError::BadUsername,
            )
            | RequestError::UnknownSecret => StatusCode::BAD_REQUEST,
            RequestError::NoRoute => StatusCode::NOT_FOUND,
            RequestError::Body(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Render this error as an HTTP response.
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let status = self.status();
        let message = self.to_string();
        match self {
            RequestError::Validation(ValidationError::MethodNotAllowed) => {
                let mut response = plain_text(status, reason(status));
                response
                    .headers_mut()
                    .insert(header::ALLOW, HeaderValue::from_static("POST"));
                response
            }
            RequestError::Validation(ValidationError::UnsupportedMediaType) => {
                plain_text(status, reason(status))
            }
            RequestError::NoRoute => plain_text(status, &message),
            _ => json_error(status, &message),
        }
    }
}

fn reason(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("")
}

/// A `text/plain` response whose body is `text` and a newline.
fn plain_text(status: StatusCode, text: &str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(format!("{text}\n"))));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    response
}

/// An `application/json` response carrying `body` verbatim.
pub(crate) fn json_response(status: StatusCode, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

fn json_error(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let mut body = serde_json::json!({ "error": message }).to_string();
    body.push('\n');
    json_response(status, Bytes::from(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_text(response: Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            RequestError::from(ValidationError::MethodNotAllowed).status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            RequestError::from(ValidationError::UnsupportedMediaType).status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            RequestError::from(ValidationError::PayloadTooLarge).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            RequestError::from(ValidationError::BadUsername).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(RequestError::UnknownSecret.status(), StatusCode::BAD_REQUEST);
        assert_eq!(RequestError::NoRoute.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            RequestError::Body("reset".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_method_not_allowed_is_plain_text_with_allow() {
        let response = RequestError::from(ValidationError::MethodNotAllowed).into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "POST");
        assert!(
            response.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/plain")
        );
        assert_eq!(body_text(response).await, "Method Not Allowed\n");
    }

    #[tokio::test]
    async fn test_unknown_secret_is_json_envelope() {
        let response = RequestError::UnknownSecret.into_response();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(body_text(response).await, "{\"error\":\"unknown secret\"}\n");
    }

    #[tokio::test]
    async fn test_malformed_message_is_escaped() {
        let err = serde_json::from_str::<serde_json::Value>("{\"a\"").unwrap_err();
        let response = RequestError::from(ValidationError::Malformed(err)).into_response();
        let body = body_text(response).await;
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert!(parsed["error"].as_str().unwrap().contains("EOF"));
    }
}

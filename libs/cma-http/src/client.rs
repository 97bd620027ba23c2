use crate::builder::HttpClientBuilder;
use crate::config::TransportSecurity;
use crate::error::HttpError;
use crate::request::RequestBuilder;
use crate::response::ResponseBody;
use bytes::Bytes;
use http::{HeaderValue, Request, Response};
use http_body_util::Full;
use std::future::Future;
use std::pin::Pin;
use tower::Service;
use tower::buffer::Buffer;

/// Future type of the boxed inner service
pub type ServiceFuture =
    Pin<Box<dyn Future<Output = Result<Response<ResponseBody>, HttpError>> + Send>>;

/// Buffered service handle shared by all clones of an [`HttpClient`]
pub type BufferedService = Buffer<Request<Full<Bytes>>, ServiceFuture>;

/// HTTP client over a pooled tower service stack
///
/// `HttpClient` is `Clone + Send + Sync`; clones share one connection pool,
/// one admission budget and one bearer token source. Callers do not need
/// to wrap it in a `Mutex`.
///
/// ```ignore
/// let resp = client.get("https://api.example.com/products/1").send().await?;
/// let product: serde_json::Value = resp.json().await?;
/// ```
#[derive(Clone)]
pub struct HttpClient {
    pub(crate) service: BufferedService,
    pub(crate) max_body_size: usize,
    pub(crate) transport_security: TransportSecurity,
    pub(crate) user_agent: HeaderValue,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("max_body_size", &self.max_body_size)
            .field("transport_security", &self.transport_security)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Create a new HTTP client with default configuration
    ///
    /// # Errors
    /// Returns an error if TLS initialization fails
    pub fn new() -> Result<Self, HttpError> {
        HttpClientBuilder::new().build()
    }

    /// Create a builder for configuring the HTTP client
    #[must_use]
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    /// Create a request builder for an arbitrary method
    ///
    /// The URL must be absolute (scheme and host); relative URLs are
    /// rejected with [`HttpError::InvalidUri`] on send.
    pub fn request(&self, method: http::Method, url: &str) -> RequestBuilder {
        RequestBuilder::new(
            self.service.clone(),
            self.max_body_size,
            method,
            url.to_owned(),
            self.transport_security,
            self.user_agent.clone(),
        )
    }

    /// Create a GET request builder
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(http::Method::GET, url)
    }

    /// Create a POST request builder
    pub fn post(&self, url: &str) -> RequestBuilder {
        self.request(http::Method::POST, url)
    }

    /// Create a PUT request builder
    pub fn put(&self, url: &str) -> RequestBuilder {
        self.request(http::Method::PUT, url)
    }
}

/// Map buffer errors to `HttpError`
///
/// Errors from the inner stack arrive boxed; anything else means the
/// buffer worker is gone.
pub fn map_buffer_error(err: tower::BoxError) -> HttpError {
    match err.downcast::<HttpError>() {
        Ok(http_err) => *http_err,
        Err(err) => {
            tracing::error!(
                error = %err,
                "buffer worker closed unexpectedly; service unavailable"
            );
            HttpError::ServiceClosed
        }
    }
}

/// Reserve a buffer slot, failing fast with `Overloaded` when the buffer is full.
pub async fn try_acquire_buffer_slot(service: &mut BufferedService) -> Result<(), HttpError> {
    use std::task::Poll;

    let poll_result = std::future::poll_fn(|cx| match service.poll_ready(cx) {
        Poll::Ready(result) => Poll::Ready(Some(result)),
        Poll::Pending => Poll::Ready(None),
    })
    .await;

    match poll_result {
        Some(Ok(())) => Ok(()),
        Some(Err(e)) => Err(map_buffer_error(e)),
        None => Err(HttpError::Overloaded),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::layers::BearerTokenSource;
    use async_trait::async_trait;
    use httpmock::prelude::*;
    use secrecy::SecretString;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn test_client() -> HttpClient {
        HttpClientBuilder::with_config(crate::HttpClientConfig::for_testing())
            .build()
            .unwrap()
    }

    struct StaticToken;

    #[async_trait]
    impl BearerTokenSource for StaticToken {
        async fn bearer_token(
            &self,
        ) -> Result<SecretString, Box<dyn std::error::Error + Send + Sync>> {
            Ok(SecretString::from("abc123".to_owned()))
        }
    }

    #[tokio::test]
    async fn test_get_json() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(GET).path("/products/1");
            then.status(200).json_body(json!({"id": "1"}));
        });

        let client = test_client();
        let value: serde_json::Value = client
            .get(&server.url("/products/1"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(value["id"], "1");
    }

    #[tokio::test]
    async fn test_put_json_body() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(PUT)
                .path("/preferences/7")
                .header("content-type", "application/json")
                .json_body(json!({"lang": "en"}));
            then.status(204);
        });

        let client = test_client();
        let resp = client
            .put(&server.url("/preferences/7"))
            .json(&json!({"lang": "en"}))
            .unwrap()
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), http::StatusCode::NO_CONTENT);
        m.assert();
    }

    #[tokio::test]
    async fn test_default_user_agent_sent() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(GET)
                .path("/ua")
                .header("user-agent", crate::DEFAULT_USER_AGENT);
            then.status(200);
        });

        test_client().get(&server.url("/ua")).send().await.unwrap();
        m.assert();
    }

    #[tokio::test]
    async fn test_bearer_token_injected_on_every_request() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(GET)
                .path("/profiles/1")
                .header("authorization", "Bearer abc123");
            then.status(200).body("{}");
        });

        let client = HttpClientBuilder::with_config(crate::HttpClientConfig::for_testing())
            .bearer_auth(Arc::new(StaticToken))
            .build()
            .unwrap();
        for _ in 0..3 {
            client.get(&server.url("/profiles/1")).send().await.unwrap();
        }
        m.assert_calls(3);
    }

    #[tokio::test]
    async fn test_server_error_is_marked_retryable() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(GET).path("/eservices/1");
            then.status(502).body("bad gateway");
        });

        let err = test_client()
            .get(&server.url("/eservices/1"))
            .send()
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        match err {
            HttpError::ServerError {
                status,
                body_preview,
            } => {
                assert_eq!(status, http::StatusCode::BAD_GATEWAY);
                assert_eq!(body_preview, "bad gateway");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_client_error_passes_through_send() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(GET).path("/missing");
            then.status(404).body("nope");
        });

        let resp = test_client()
            .get(&server.url("/missing"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_read_timeout() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(GET).path("/slow");
            then.status(200).delay(Duration::from_millis(500));
        });

        let client = HttpClientBuilder::with_config(crate::HttpClientConfig::for_testing())
            .timeout(Duration::from_millis(50))
            .build()
            .unwrap();
        let err = client.get(&server.url("/slow")).send().await.unwrap_err();
        assert!(matches!(err, HttpError::Timeout(d) if d == Duration::from_millis(50)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_https_required_by_default() {
        let client = HttpClient::new().unwrap();
        let err = client
            .get("http://localhost:1/anything")
            .send()
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::InvalidScheme { .. }));
    }

    #[tokio::test]
    async fn test_body_cap_applies() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(GET).path("/big");
            then.status(200).body("x".repeat(2048));
        });

        let client = HttpClientBuilder::with_config(crate::HttpClientConfig::for_testing())
            .max_body_size(1024)
            .build()
            .unwrap();
        let err = client
            .get(&server.url("/big"))
            .send()
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::BodyTooLarge { limit: 1024, .. }));
    }
}

use crate::config::{HttpClientConfig, TlsRootConfig, TransportSecurity};
use crate::error::HttpError;
use crate::layers::{
    AdmissionLayer, BearerAuthLayer, BearerTokenSource, RequestLogLayer, ServerErrorLayer,
};
use crate::response::ResponseBody;
use crate::tls;
use bytes::Bytes;
use http::Response;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::sync::Arc;
use std::time::Duration;
use tower::buffer::Buffer;
use tower::timeout::TimeoutLayer;
use tower::{ServiceBuilder, ServiceExt};

/// Builder for constructing an [`HttpClient`](crate::HttpClient) with a layered tower stack.
pub struct HttpClientBuilder {
    config: HttpClientConfig,
    bearer: Option<Arc<dyn BearerTokenSource>>,
}

impl HttpClientBuilder {
    /// Create a new builder with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a builder with a specific configuration
    #[must_use]
    pub fn with_config(config: HttpClientConfig) -> Self {
        Self {
            config,
            bearer: None,
        }
    }

    /// Set the per-request response timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the TCP connect timeout
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the user agent string
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the maximum buffered response body size
    #[must_use]
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    /// Set transport security mode
    #[must_use]
    pub fn transport(mut self, transport: TransportSecurity) -> Self {
        self.config.transport = transport;
        self
    }

    /// Allow plain HTTP connections
    ///
    /// Equivalent to `.transport(TransportSecurity::AllowInsecureHttp)`.
    #[must_use]
    pub fn allow_insecure_http(self) -> Self {
        self.transport(TransportSecurity::AllowInsecureHttp)
    }

    /// Set the TLS root certificate strategy
    #[must_use]
    pub fn tls_roots(mut self, roots: TlsRootConfig) -> Self {
        self.config.tls_roots = roots;
        self
    }

    /// Bound in-flight requests; `None` disables admission control
    #[must_use]
    pub fn max_connections(mut self, max: Option<usize>) -> Self {
        self.config.max_connections = max;
        self
    }

    /// Set how long a request may wait for an in-flight slot
    #[must_use]
    pub fn pending_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.config.pending_acquire_timeout = timeout;
        self
    }

    /// Set the idle connection timeout for the connection pool
    ///
    /// Set to `None` to use hyper-util's default.
    #[must_use]
    pub fn pool_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.pool_idle_timeout = timeout;
        self
    }

    /// Set the maximum number of idle connections per host
    #[must_use]
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.config.pool_max_idle_per_host = max;
        self
    }

    /// Set the buffer capacity for concurrent request handling
    ///
    /// A capacity of 0 is clamped to 1 (tower's `Buffer` panics on 0).
    #[must_use]
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_capacity = capacity.max(1);
        self
    }

    /// Inject a bearer token from `source` into every request
    ///
    /// The token is requested per request, before admission, so waiting
    /// for a token never holds an in-flight slot.
    #[must_use]
    pub fn bearer_auth(mut self, source: Arc<dyn BearerTokenSource>) -> Self {
        self.bearer = Some(source);
        self
    }

    /// Build the HTTP client with all configured layers
    ///
    /// # Errors
    /// Returns an error if TLS initialization fails
    pub fn build(self) -> Result<crate::HttpClient, HttpError> {
        let timeout = self.config.request_timeout;
        let connect_timeout = self.config.connect_timeout;

        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_connect_timeout(Some(connect_timeout));
        http.set_nodelay(true);
        let https = tls::build_https_connector(http, self.config.tls_roots, self.config.transport)?;

        // pool_timer is required for pool_idle_timeout to take effect
        let mut client_builder = Client::builder(TokioExecutor::new());
        client_builder
            .pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(self.config.pool_max_idle_per_host);
        if let Some(idle_timeout) = self.config.pool_idle_timeout {
            client_builder.pool_idle_timeout(idle_timeout);
        }
        let hyper_client = client_builder.build::<_, Full<Bytes>>(https);

        // Request flow (outer -> inner):
        //   Buffer -> RequestLog -> [BearerAuth] -> [Admission] -> ServerError ->
        //   ErrorMapping -> Timeout -> hyper_client
        //
        // send() returns Ok for 1xx-4xx; 5xx surfaces as HttpError::ServerError.
        let service = ServiceBuilder::new()
            .layer(TimeoutLayer::new(timeout))
            .service(hyper_client)
            .map_response(box_incoming)
            .map_err(move |e: tower::BoxError| map_tower_error(e, timeout, connect_timeout));

        let mut boxed_service = ServiceBuilder::new()
            .layer(ServerErrorLayer::new(self.config.max_body_size))
            .service(service)
            .boxed_clone();

        if let Some(max) = self.config.max_connections {
            boxed_service = ServiceBuilder::new()
                .layer(AdmissionLayer::new(max, self.config.pending_acquire_timeout))
                .service(boxed_service)
                .boxed_clone();
        }

        if let Some(source) = self.bearer {
            boxed_service = ServiceBuilder::new()
                .layer(BearerAuthLayer::new(source))
                .service(boxed_service)
                .boxed_clone();
        }

        let boxed_service = ServiceBuilder::new()
            .layer(RequestLogLayer)
            .service(boxed_service)
            .boxed_clone();

        // Buffer provides Clone + Send + Sync without mutex serialization.
        let buffered_service: crate::client::BufferedService =
            Buffer::new(boxed_service, self.config.buffer_capacity.max(1));

        Ok(crate::HttpClient {
            service: buffered_service,
            max_body_size: self.config.max_body_size,
            transport_security: self.config.transport,
            user_agent: http::HeaderValue::from_str(&self.config.user_agent)?,
        })
    }
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn box_incoming(response: Response<Incoming>) -> Response<ResponseBody> {
    response.map(|body| body.map_err(Into::into).boxed())
}

/// Map tower errors to `HttpError`
///
/// `Elapsed` is the response timeout. A hyper-util connect error whose
/// cause is a timeout maps to the connect timeout; anything else is a
/// transport failure.
fn map_tower_error(err: tower::BoxError, timeout: Duration, connect_timeout: Duration) -> HttpError {
    if err.is::<tower::timeout::error::Elapsed>() {
        return HttpError::Timeout(timeout);
    }

    match err.downcast::<hyper_util::client::legacy::Error>() {
        Ok(legacy) => {
            if legacy.is_connect() && is_timeout_cause(&*legacy) {
                HttpError::Timeout(connect_timeout)
            } else {
                HttpError::Transport(legacy)
            }
        }
        Err(other) => match other.downcast::<HttpError>() {
            Ok(http_err) => *http_err,
            Err(other) => HttpError::Transport(other),
        },
    }
}

fn is_timeout_cause(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>()
            && io.kind() == std::io::ErrorKind::TimedOut
        {
            return true;
        }
        current = e.source();
    }
    false
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_builder_default() {
        let builder = HttpClientBuilder::new();
        assert_eq!(builder.config.request_timeout, Duration::from_secs(60));
        assert_eq!(builder.config.max_connections, Some(100));
        assert!(builder.bearer.is_none());
    }

    #[test]
    fn test_builder_setters() {
        let builder = HttpClientBuilder::new()
            .timeout(Duration::from_secs(5))
            .connect_timeout(Duration::from_secs(2))
            .max_connections(Some(7))
            .pending_acquire_timeout(Duration::from_millis(250))
            .pool_max_idle_per_host(3)
            .pool_idle_timeout(None)
            .buffer_capacity(0);
        assert_eq!(builder.config.request_timeout, Duration::from_secs(5));
        assert_eq!(builder.config.connect_timeout, Duration::from_secs(2));
        assert_eq!(builder.config.max_connections, Some(7));
        assert_eq!(
            builder.config.pending_acquire_timeout,
            Duration::from_millis(250)
        );
        assert_eq!(builder.config.pool_max_idle_per_host, 3);
        assert!(builder.config.pool_idle_timeout.is_none());
        assert_eq!(builder.config.buffer_capacity, 1);
    }

    #[tokio::test]
    async fn test_builder_build() {
        assert!(HttpClientBuilder::new().build().is_ok());
        assert!(HttpClientBuilder::new().allow_insecure_http().build().is_ok());
    }

    #[tokio::test]
    async fn test_builder_invalid_user_agent() {
        let result = HttpClientBuilder::new().user_agent("bad\x00agent").build();
        assert!(matches!(result, Err(HttpError::InvalidHeaderValue(_))));
    }

    #[test]
    fn test_map_tower_error_elapsed_is_response_timeout() {
        let err: tower::BoxError = Box::new(tower::timeout::error::Elapsed::new());
        let mapped = map_tower_error(err, Duration::from_secs(60), Duration::from_secs(30));
        assert!(matches!(mapped, HttpError::Timeout(d) if d == Duration::from_secs(60)));
    }

    #[test]
    fn test_map_tower_error_preserves_http_error() {
        let err: tower::BoxError = Box::new(HttpError::ServiceClosed);
        let mapped = map_tower_error(err, Duration::from_secs(1), Duration::from_secs(1));
        assert!(matches!(mapped, HttpError::ServiceClosed));
    }

    #[test]
    fn test_map_tower_error_wraps_unknown_as_transport() {
        let err: tower::BoxError = "boom".into();
        let mapped = map_tower_error(err, Duration::from_secs(1), Duration::from_secs(1));
        assert!(matches!(mapped, HttpError::Transport(_)));
    }

    #[test]
    fn test_timeout_cause_detected_in_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out");
        assert!(is_timeout_cause(&io));
        let other = std::io::Error::other("refused");
        assert!(!is_timeout_cause(&other));
    }
}

use crate::security::DEFAULT_MAX_BODY_SIZE;
use std::time::Duration;

/// Default User-Agent string for HTTP requests
pub const DEFAULT_USER_AGENT: &str = concat!("cma-http/", env!("CARGO_PKG_VERSION"));

/// TLS root certificate configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TlsRootConfig {
    /// Use Mozilla's root certificates (webpki-roots, no OS dependency)
    #[default]
    WebPki,
    /// Use OS native root certificate store
    Native,
}

/// Transport security configuration
///
/// Controls whether the client enforces TLS or allows plain HTTP.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportSecurity {
    /// Require TLS for all connections (HTTPS only)
    #[default]
    TlsOnly,
    /// Allow plain HTTP connections (internal networks, mock servers)
    AllowInsecureHttp,
}

/// Overall HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Per-request response timeout (default: 60 seconds)
    ///
    /// Covers the time from dispatching the request until response headers
    /// arrive. Admission wait and token acquisition are not included.
    pub request_timeout: Duration,

    /// TCP connect timeout (default: 30 seconds)
    pub connect_timeout: Duration,

    /// Maximum buffered response body size in bytes (default: 1 MiB)
    pub max_body_size: usize,

    /// User-Agent header value
    pub user_agent: String,

    /// Transport security mode (default: `TlsOnly`)
    pub transport: TransportSecurity,

    /// TLS root certificate strategy (default: `WebPki`)
    pub tls_roots: TlsRootConfig,

    /// Buffer capacity for concurrent request handling (default: 1024)
    pub buffer_capacity: usize,

    /// Timeout for idle connections in the pool (default: 60 seconds)
    ///
    /// Set to `None` to use hyper-util's default idle timeout.
    pub pool_idle_timeout: Option<Duration>,

    /// Maximum number of idle connections kept per host (default: 20)
    ///
    /// Setting this to `0` disables connection reuse entirely.
    pub pool_max_idle_per_host: usize,

    /// Maximum number of in-flight requests (default: 100)
    ///
    /// A request holds its slot until the response body is fully read or
    /// dropped. `None` disables admission control.
    pub max_connections: Option<usize>,

    /// How long a request waits for an in-flight slot (default: 30 seconds)
    ///
    /// When the wait elapses the request fails with
    /// [`HttpError::PoolExhausted`](crate::HttpError::PoolExhausted).
    pub pending_acquire_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(30),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            transport: TransportSecurity::TlsOnly,
            tls_roots: TlsRootConfig::default(),
            buffer_capacity: 1024,
            pool_idle_timeout: Some(Duration::from_secs(60)),
            pool_max_idle_per_host: 20,
            max_connections: Some(100),
            pending_acquire_timeout: Duration::from_secs(30),
        }
    }
}

impl HttpClientConfig {
    /// Create configuration for `OAuth2` token endpoints
    ///
    /// Token traffic is low-volume: a small idle pool and no admission limit.
    #[must_use]
    pub fn token_endpoint() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            buffer_capacity: 256,
            pool_max_idle_per_host: 4,
            max_connections: None,
            ..Self::default()
        }
    }

    /// Create configuration for testing with mock servers (allows plain HTTP)
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            transport: TransportSecurity::AllowInsecureHttp,
            buffer_capacity: 256,
            pool_idle_timeout: Some(Duration::from_secs(10)),
            pool_max_idle_per_host: 4,
            ..Self::default()
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_pool_defaults() {
        let config = HttpClientConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.max_body_size, 1024 * 1024);
        assert_eq!(config.max_connections, Some(100));
        assert_eq!(config.pool_max_idle_per_host, 20);
        assert_eq!(config.pool_idle_timeout, Some(Duration::from_secs(60)));
        assert_eq!(config.pending_acquire_timeout, Duration::from_secs(30));
        assert_eq!(config.transport, TransportSecurity::TlsOnly);
    }

    #[test]
    fn test_token_endpoint_has_no_admission_limit() {
        let config = HttpClientConfig::token_endpoint();
        assert!(config.max_connections.is_none());
        assert_eq!(config.max_body_size, 1024 * 1024);
    }

    #[test]
    fn test_for_testing_allows_http() {
        let config = HttpClientConfig::for_testing();
        assert_eq!(config.transport, TransportSecurity::AllowInsecureHttp);
    }
}

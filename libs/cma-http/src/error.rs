use std::time::Duration;
use thiserror::Error;

/// Classification of URL validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvalidUriKind {
    /// URL could not be parsed (malformed syntax)
    ParseError,
    /// URL is missing required host/authority component
    MissingAuthority,
    /// URL is missing required scheme (http/https)
    MissingScheme,
}

/// HTTP client error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpError {
    /// Request building failed
    #[error("Failed to build request: {0}")]
    RequestBuild(#[from] http::Error),

    /// Invalid header name
    #[error("Invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    /// Invalid header value
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// Connect or response timeout elapsed
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Transport error (network, connection, etc)
    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// TLS error
    #[error("TLS error: {0}")]
    Tls(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The bearer token source failed to produce a token
    #[error("Bearer token unavailable: {0}")]
    Auth(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Response body exceeded size limit
    #[error("Response body too large: limit {limit} bytes, got {actual} bytes")]
    BodyTooLarge { limit: usize, actual: usize },

    /// HTTP non-2xx status below 500, surfaced by the status-checking readers
    #[error("HTTP {status}: {body_preview}")]
    HttpStatus {
        status: http::StatusCode,
        body_preview: String,
        content_type: Option<String>,
    },

    /// HTTP 5xx status, raised by the server-error layer for every request
    ///
    /// Always retryable; the client itself never retries.
    #[error("HTTP {status}: {body_preview}")]
    ServerError {
        status: http::StatusCode,
        body_preview: String,
    },

    /// JSON parsing error
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Form URL encoding error
    #[error("Form encoding failed: {0}")]
    FormEncode(#[from] serde_urlencoded::ser::Error),

    /// No in-flight slot became free within the pending-acquire timeout
    #[error("Connection pool exhausted: no slot within {waited:?}")]
    PoolExhausted { waited: Duration },

    /// Request buffer is full (fail-fast)
    #[error("Service overloaded: request buffer full")]
    Overloaded,

    /// Internal service failure (buffer worker died, channel closed)
    #[error("Service unavailable: internal failure")]
    ServiceClosed,

    /// Invalid URL (failed to parse)
    ///
    /// Match on `kind`; `reason` is a diagnostic string only.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUri {
        url: String,
        kind: InvalidUriKind,
        reason: String,
    },

    /// Invalid URL scheme for transport security configuration
    #[error("URL scheme '{scheme}' not allowed: {reason}")]
    InvalidScheme { scheme: String, reason: String },
}

impl HttpError {
    /// Whether repeating the same request may succeed.
    ///
    /// True for timeouts, transport failures, pool exhaustion, overload and
    /// 5xx responses.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_)
                | Self::Transport(_)
                | Self::ServerError { .. }
                | Self::PoolExhausted { .. }
                | Self::Overloaded
        )
    }

    /// HTTP status carried by the error, if any.
    #[must_use]
    pub fn status(&self) -> Option<http::StatusCode> {
        match self {
            Self::HttpStatus { status, .. } | Self::ServerError { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<hyper::Error> for HttpError {
    fn from(err: hyper::Error) -> Self {
        HttpError::Transport(Box::new(err))
    }
}

impl From<hyper_util::client::legacy::Error> for HttpError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        HttpError::Transport(Box::new(err))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::error::Error;
    use std::fmt;

    #[derive(Debug)]
    struct TestError(&'static str);

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    impl Error for TestError {}

    #[test]
    fn test_transport_error_preserves_source() {
        let err = HttpError::Transport(Box::new(TestError("connection refused")));

        let source = err.source().unwrap();
        let downcast = source.downcast_ref::<TestError>().unwrap();
        assert_eq!(downcast.0, "connection refused");
    }

    #[test]
    fn test_auth_error_preserves_source() {
        let err = HttpError::Auth(Box::new(TestError("token endpoint down")));
        assert!(err.to_string().contains("token endpoint down"));
        assert!(err.source().is_some());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_server_error_is_retryable() {
        let err = HttpError::ServerError {
            status: http::StatusCode::BAD_GATEWAY,
            body_preview: "upstream down".into(),
        };
        assert!(err.is_retryable());
        assert_eq!(err.status(), Some(http::StatusCode::BAD_GATEWAY));
        assert_eq!(err.to_string(), "HTTP 502 Bad Gateway: upstream down");
    }

    #[test]
    fn test_client_status_is_not_retryable() {
        let err = HttpError::HttpStatus {
            status: http::StatusCode::NOT_FOUND,
            body_preview: String::new(),
            content_type: None,
        };
        assert!(!err.is_retryable());
        assert_eq!(err.status(), Some(http::StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_timeout_and_pool_exhaustion_are_retryable() {
        assert!(HttpError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(
            HttpError::PoolExhausted {
                waited: Duration::from_millis(10)
            }
            .is_retryable()
        );
        assert!(!HttpError::ServiceClosed.is_retryable());
    }
}

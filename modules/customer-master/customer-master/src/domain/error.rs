use cma_http::HttpError;
use customer_master_sdk::CustomerMasterError;
use thiserror::Error;

use super::credentials::TokenError;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("configuration not found: {0}")]
    ConfigNotFound(String),

    #[error("authentication failed: {0}")]
    Auth(#[from] TokenError),

    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

impl DomainError {
    #[must_use]
    pub fn config_not_found(message: impl Into<String>) -> Self {
        Self::ConfigNotFound(message.into())
    }

    #[must_use]
    pub fn upstream(status: u16, body: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            body: body.into(),
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Upstream { status, .. } => *status >= 500,
            Self::Timeout(_) | Self::Transport(_) => true,
            Self::ConfigNotFound(_) | Self::Auth(_) | Self::InvalidPayload(_) => false,
        }
    }
}

impl From<HttpError> for DomainError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Auth(source) => match source.downcast::<TokenError>() {
                Ok(token) => Self::Auth(*token),
                Err(other) => Self::Auth(TokenError::Http(other.to_string())),
            },
            HttpError::ServerError {
                status,
                body_preview,
            }
            | HttpError::HttpStatus {
                status,
                body_preview,
                ..
            } => Self::upstream(status.as_u16(), body_preview),
            HttpError::Timeout(_) => Self::Timeout(err.to_string()),
            HttpError::PoolExhausted { waited } => {
                Self::Transport(format!("pool saturated: no connection within {waited:?}"))
            }
            HttpError::Json(_) | HttpError::BodyTooLarge { .. } | HttpError::FormEncode(_) => {
                Self::InvalidPayload(err.to_string())
            }
            HttpError::InvalidUri { .. } | HttpError::InvalidScheme { .. } => {
                Self::ConfigNotFound(err.to_string())
            }
            other => Self::Transport(other.to_string()),
        }
    }
}

impl From<DomainError> for CustomerMasterError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::ConfigNotFound(message) => Self::config_not_found(message),
            DomainError::Auth(token) => Self::auth(token.to_string()),
            DomainError::Upstream { status, body } => Self::upstream(status, body),
            DomainError::Timeout(message) => Self::timeout(message),
            DomainError::Transport(message) => Self::transport(message),
            DomainError::InvalidPayload(message) => Self::invalid_payload(message),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn server_error_becomes_retryable_upstream() {
        let err: DomainError = HttpError::ServerError {
            status: http::StatusCode::SERVICE_UNAVAILABLE,
            body_preview: "maintenance".to_owned(),
        }
        .into();
        assert!(matches!(&err, DomainError::Upstream { status: 503, body } if body == "maintenance"));
        assert!(err.is_retryable());
    }

    #[test]
    fn client_status_is_not_retryable() {
        let err: DomainError = HttpError::HttpStatus {
            status: http::StatusCode::NOT_FOUND,
            body_preview: "no such profile".to_owned(),
            content_type: None,
        }
        .into();
        assert!(matches!(err, DomainError::Upstream { status: 404, .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn token_error_survives_auth_layer() {
        let source: Box<dyn std::error::Error + Send + Sync> = Box::new(TokenError::Rejected {
            status: 401,
            body: "invalid_client".to_owned(),
        });
        let err: DomainError = HttpError::Auth(source).into();
        assert!(matches!(
            err,
            DomainError::Auth(TokenError::Rejected { status: 401, .. })
        ));
    }

    #[test]
    fn pool_exhaustion_is_transport() {
        let err: DomainError = HttpError::PoolExhausted {
            waited: Duration::from_millis(10),
        }
        .into();
        assert!(matches!(&err, DomainError::Transport(msg) if msg.contains("pool saturated")));
        assert!(err.is_retryable());
    }

    #[test]
    fn timeout_maps_to_timeout() {
        let err: DomainError = HttpError::Timeout(Duration::from_secs(1)).into();
        assert!(matches!(err, DomainError::Timeout(_)));
    }

    #[test]
    fn sdk_mapping_preserves_variant() {
        let sdk: CustomerMasterError = DomainError::upstream(502, "bad gateway").into();
        assert_eq!(sdk, CustomerMasterError::upstream(502, "bad gateway"));

        let sdk: CustomerMasterError = DomainError::config_not_found("unknown country 'FR'").into();
        assert!(matches!(sdk, CustomerMasterError::ConfigNotFound { .. }));

        let sdk: CustomerMasterError = DomainError::Auth(TokenError::UnsupportedTokenType(
            "mac".to_owned(),
        ))
        .into();
        assert!(matches!(sdk, CustomerMasterError::Auth { message } if message.contains("mac")));
    }
}

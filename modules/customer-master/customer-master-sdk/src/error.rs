//! Error types for the customer-master adapter.

use thiserror::Error;

/// Errors returned to consumers of [`CustomerMasterClientV1`](crate::CustomerMasterClientV1).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CustomerMasterError {
    /// No configuration for the requested country or subsystem.
    #[error("configuration not found: {message}")]
    ConfigNotFound { message: String },

    /// The OAuth2 token could not be obtained.
    #[error("authentication failed: {message}")]
    Auth { message: String },

    /// The subsystem answered with a non-2xx status.
    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    /// Connect or read timeout elapsed.
    #[error("request timed out: {message}")]
    Timeout { message: String },

    /// Network failure or pool saturation.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// The request or response body could not be (de)serialized.
    #[error("invalid payload: {message}")]
    InvalidPayload { message: String },
}

impl CustomerMasterError {
    #[must_use]
    pub fn config_not_found(message: impl Into<String>) -> Self {
        Self::ConfigNotFound {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn upstream(status: u16, body: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            body: body.into(),
        }
    }

    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            message: message.into(),
        }
    }

    /// Whether a caller-side retry may succeed.
    ///
    /// 5xx upstream answers, timeouts and transport failures are retryable.
    /// The adapter itself never retries.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Upstream { status, .. } => *status >= 500,
            Self::Timeout { .. } | Self::Transport { .. } => true,
            Self::ConfigNotFound { .. } | Self::Auth { .. } | Self::InvalidPayload { .. } => false,
        }
    }

    /// Upstream HTTP status, if the error carries one.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}

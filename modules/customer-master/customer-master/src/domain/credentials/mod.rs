//! OAuth2 client-credentials tokens: fetch, cache and single-flight refresh.

mod fetcher;
mod manager;
mod token;

use thiserror::Error;

pub use fetcher::{HttpTokenFetcher, TokenFetcher};
pub use manager::CredentialManager;
pub use token::{CachedToken, EXPIRY_BUFFER};

/// Token acquisition failure.
///
/// `Clone` so one failed fetch can be handed to every caller that waited on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("token request failed: {0}")]
    Http(String),

    #[error("invalid token response: {0}")]
    InvalidResponse(String),

    #[error("unsupported token type '{0}', expected Bearer")]
    UnsupportedTokenType(String),

    #[error("OAuth2 configuration error: {0}")]
    Config(String),
}

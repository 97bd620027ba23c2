use std::time::Duration;

use async_trait::async_trait;
use cma_http::{HttpClient, HttpClientBuilder, HttpClientConfig, HttpError, TransportSecurity};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use time::OffsetDateTime;
use zeroize::Zeroizing;

use super::TokenError;
use super::token::CachedToken;
use crate::domain::resolver::OAuthConfig;

/// Obtains a fresh token for one OAuth identity.
///
/// The credential manager owns caching and single-flight; implementations
/// only talk to the token endpoint.
#[async_trait]
pub trait TokenFetcher: Send + Sync {
    /// # Errors
    /// Returns `TokenError` if the endpoint is unreachable, rejects the
    /// credentials or returns a malformed payload.
    async fn fetch(&self, oauth: &OAuthConfig) -> Result<CachedToken, TokenError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    scope: Option<String>,
}

/// Client-credentials grant over a shared, body-capped HTTP client.
#[derive(Debug, Clone)]
pub struct HttpTokenFetcher {
    client: HttpClient,
}

impl HttpTokenFetcher {
    /// # Errors
    /// Returns `TokenError::Http` if the HTTP client fails to build.
    pub fn new(transport: TransportSecurity) -> Result<Self, TokenError> {
        let config = HttpClientConfig {
            transport,
            ..HttpClientConfig::token_endpoint()
        };
        let client = HttpClientBuilder::with_config(config)
            .build()
            .map_err(|e| TokenError::Http(format!("failed to build token client: {e}")))?;
        Ok(Self { client })
    }

    #[must_use]
    pub fn with_client(client: HttpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TokenFetcher for HttpTokenFetcher {
    #[tracing::instrument(skip_all, fields(token_uri = %oauth.token_uri, client_id = %oauth.client_id))]
    async fn fetch(&self, oauth: &OAuthConfig) -> Result<CachedToken, TokenError> {
        if oauth.token_uri.is_empty() {
            return Err(TokenError::Config("token_uri is not configured".to_owned()));
        }

        let secret = Zeroizing::new(oauth.client_secret.expose_secret().to_owned());
        let mut fields: Vec<(&str, &str)> = vec![("grant_type", "client_credentials")];
        fields.push(("client_id", &oauth.client_id));
        fields.push(("client_secret", &secret));
        if !oauth.scope.is_empty() {
            fields.push(("scope", &oauth.scope));
        }

        let body = self
            .client
            .post(&oauth.token_uri)
            .form(&fields)
            .map_err(request_error)?
            .send()
            .await
            .map_err(request_error)?
            .checked_bytes()
            .await
            .map_err(request_error)?;

        let response: TokenResponse = serde_json::from_slice(&body)
            .map_err(|e| TokenError::InvalidResponse(e.to_string()))?;

        let token = into_cached_token(response, oauth, OffsetDateTime::now_utc())?;
        tracing::debug!(
            expires_at = ?token.expires_at,
            scopes = token.scopes.len(),
            "Token obtained"
        );
        Ok(token)
    }
}

fn request_error(err: HttpError) -> TokenError {
    match err {
        HttpError::HttpStatus {
            status,
            body_preview,
            ..
        }
        | HttpError::ServerError {
            status,
            body_preview,
        } => TokenError::Rejected {
            status: status.as_u16(),
            body: body_preview,
        },
        other => TokenError::Http(other.to_string()),
    }
}

fn into_cached_token(
    response: TokenResponse,
    oauth: &OAuthConfig,
    now: OffsetDateTime,
) -> Result<CachedToken, TokenError> {
    if response.access_token.is_empty() {
        return Err(TokenError::InvalidResponse("empty access_token".to_owned()));
    }

    let token_type = response.token_type.unwrap_or_else(|| "Bearer".to_owned());
    if !token_type.eq_ignore_ascii_case("bearer") {
        return Err(TokenError::UnsupportedTokenType(token_type));
    }

    let lifetime = match response.expires_in {
        Some(secs) => Some(Duration::from_secs(secs)),
        None if oauth.token_cache_duration.is_zero() => None,
        None => Some(oauth.token_cache_duration),
    };
    let expires_at = lifetime
        .map(|d| {
            time::Duration::try_from(d)
                .ok()
                .and_then(|d| now.checked_add(d))
                .ok_or_else(|| TokenError::InvalidResponse("token lifetime out of range".to_owned()))
        })
        .transpose()?;

    let scopes = response
        .scope
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(&oauth.scope)
        .split_whitespace()
        .map(str::to_owned)
        .collect();

    Ok(CachedToken {
        token_type,
        value: SecretString::from(response.access_token),
        issued_at: now,
        expires_at,
        scopes,
    })
}

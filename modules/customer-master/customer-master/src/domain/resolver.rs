//! Effective configuration for one (country, subsystem, environment) target.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Serialize, Serializer};
use xxhash_rust::xxh3::Xxh3;

use crate::config::{ConfigStore, ConnectionSettings, OAuthSettings};

use super::error::DomainError;

/// Key shared by the token cache and the client cache.
///
/// Rendered as `{country}_{subsystem}_{hash}` where the hash covers the
/// OAuth identity (client id and token endpoint).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    #[must_use]
    pub fn new(country: &str, subsystem: &str, client_id: &str, token_uri: &str) -> Self {
        let mut hasher = Xxh3::new();
        for part in [country, subsystem, client_id, token_uri] {
            hasher.update(part.as_bytes());
            hasher.update(&[0]);
        }
        Self(format!("{country}_{subsystem}_{:016x}", hasher.digest()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fully merged OAuth2 client-credentials settings.
#[derive(Debug, Clone, Serialize)]
pub struct OAuthConfig {
    pub client_id: String,
    #[serde(serialize_with = "redact")]
    pub client_secret: SecretString,
    pub token_uri: String,
    pub scope: String,
    #[serde(serialize_with = "humantime_text")]
    pub token_cache_duration: Duration,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: SecretString::from(String::new()),
            token_uri: String::new(),
            scope: "read write".to_owned(),
            token_cache_duration: Duration::from_secs(55 * 60),
        }
    }
}

impl PartialEq for OAuthConfig {
    fn eq(&self, other: &Self) -> bool {
        self.client_id == other.client_id
            && self.client_secret.expose_secret() == other.client_secret.expose_secret()
            && self.token_uri == other.token_uri
            && self.scope == other.scope
            && self.token_cache_duration == other.token_cache_duration
    }
}

impl OAuthConfig {
    /// Overlay the fields `tier` sets explicitly. Empty strings are ignored.
    fn apply(&mut self, tier: &OAuthSettings) {
        if let Some(v) = non_empty(tier.client_id.as_deref()) {
            v.clone_into(&mut self.client_id);
        }
        if let Some(secret) = &tier.client_secret
            && !secret.expose_secret().is_empty()
        {
            self.client_secret = secret.clone();
        }
        if let Some(v) = non_empty(tier.token_uri.as_deref()) {
            v.clone_into(&mut self.token_uri);
        }
        if let Some(v) = non_empty(tier.scope.as_deref()) {
            v.clone_into(&mut self.scope);
        }
        if let Some(v) = tier.token_cache_duration {
            self.token_cache_duration = v;
        }
    }
}

/// Fully merged connection settings, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionConfig {
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub max_connections: usize,
    pub max_connections_per_route: usize,
    pub pending_acquire_timeout_ms: u64,
    pub idle_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 30_000,
            read_timeout_ms: 60_000,
            max_connections: 100,
            max_connections_per_route: 20,
            pending_acquire_timeout_ms: 30_000,
            idle_timeout_ms: 60_000,
        }
    }
}

impl ConnectionConfig {
    fn apply(&mut self, tier: &ConnectionSettings) {
        if let Some(v) = tier.connect_timeout_ms {
            self.connect_timeout_ms = v;
        }
        if let Some(v) = tier.read_timeout_ms {
            self.read_timeout_ms = v;
        }
        if let Some(v) = tier.max_connections {
            self.max_connections = v;
        }
        if let Some(v) = tier.max_connections_per_route {
            self.max_connections_per_route = v;
        }
        if let Some(v) = tier.pending_acquire_timeout_ms {
            self.pending_acquire_timeout_ms = v;
        }
        if let Some(v) = tier.idle_timeout_ms {
            self.idle_timeout_ms = v;
        }
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    #[must_use]
    pub fn pending_acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.pending_acquire_timeout_ms)
    }

    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

/// Effective configuration for one target. Recomputed on every call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedConfig {
    pub country: String,
    /// Canonical name of the matched subsystem configuration.
    pub subsystem: String,
    pub base_url: String,
    /// Suffix inserted before the request path when resolved through an alias.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_mapping: Option<String>,
    pub oauth: OAuthConfig,
    pub connection: ConnectionConfig,
    pub cache_key: CacheKey,
}

impl ResolvedConfig {
    /// `base_url + path_mapping + path`, with exactly one `/` at each joint.
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        let mut url = self.base_url.trim_end_matches('/').to_owned();
        if let Some(mapping) = non_empty(self.path_mapping.as_deref()) {
            push_segment(&mut url, mapping);
        }
        if !path.is_empty() {
            push_segment(&mut url, path);
        }
        url
    }
}

fn push_segment(url: &mut String, segment: &str) {
    let trimmed = segment.trim_matches('/');
    if trimmed.is_empty() {
        return;
    }
    url.push('/');
    url.push_str(trimmed);
    if segment.ends_with('/') {
        url.push('/');
    }
}

/// Pure resolver over a shared [`ConfigStore`].
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    store: Arc<ConfigStore>,
}

impl ConfigResolver {
    #[must_use]
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Merge defaults, environment and subsystem settings for one target.
    ///
    /// Precedence, lowest first: built-in defaults, `default_oauth` /
    /// `default_connection`, `environments[environment]`, the subsystem's own
    /// settings. An unknown environment contributes nothing.
    ///
    /// # Errors
    ///
    /// `DomainError::ConfigNotFound` if the country is not configured or no
    /// subsystem matches `subsystem` directly or as an alias.
    pub fn resolve(
        &self,
        country: &str,
        subsystem: &str,
        environment: &str,
    ) -> Result<ResolvedConfig, DomainError> {
        let country_config = self
            .store
            .country(country)
            .ok_or_else(|| DomainError::config_not_found(format!("unknown country '{country}'")))?;

        let (canonical, sub) = country_config.find_subsystem(subsystem).ok_or_else(|| {
            DomainError::config_not_found(format!(
                "no subsystem '{subsystem}' configured for country '{country}'"
            ))
        })?;

        let env = self.store.environment(environment);

        let mut oauth = OAuthConfig::default();
        oauth.apply(&self.store.default_oauth);
        if let Some(tier) = env.and_then(|e| e.oauth.as_ref()) {
            oauth.apply(tier);
        }
        if let Some(tier) = &sub.oauth {
            oauth.apply(tier);
        }

        let mut connection = ConnectionConfig::default();
        connection.apply(&self.store.default_connection);
        if let Some(tier) = env.and_then(|e| e.connection.as_ref()) {
            connection.apply(tier);
        }
        if let Some(tier) = &sub.connection {
            connection.apply(tier);
        }

        let path_mapping = sub.subsystem_mappings.get(subsystem).cloned();
        let cache_key = CacheKey::new(country, canonical, &oauth.client_id, &oauth.token_uri);

        Ok(ResolvedConfig {
            country: country.to_owned(),
            subsystem: canonical.to_owned(),
            base_url: sub.base_url.clone(),
            path_mapping,
            oauth,
            connection,
            cache_key,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn redact<S: Serializer>(secret: &SecretString, s: S) -> Result<S::Ok, S::Error> {
    if secret.expose_secret().is_empty() {
        s.serialize_str("")
    } else {
        s.serialize_str("***")
    }
}

fn humantime_text<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&humantime::format_duration(*d).to_string())
}

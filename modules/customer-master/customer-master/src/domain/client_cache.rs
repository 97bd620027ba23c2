//! One pooled, authenticated HTTP client per cache key.

use std::sync::Arc;

use async_trait::async_trait;
use cma_http::{BearerTokenSource, HttpClient, HttpClientBuilder, TransportSecurity};
use dashmap::DashMap;
use secrecy::SecretString;
use tokio::sync::OnceCell;

use super::credentials::CredentialManager;
use super::error::DomainError;
use super::resolver::{CacheKey, ConnectionConfig, OAuthConfig, ResolvedConfig};

/// Supplies the bearer token of one OAuth identity to its client.
struct CredentialBearer {
    credentials: Arc<CredentialManager>,
    oauth: OAuthConfig,
    key: CacheKey,
}

#[async_trait]
impl BearerTokenSource for CredentialBearer {
    async fn bearer_token(&self) -> Result<SecretString, Box<dyn std::error::Error + Send + Sync>> {
        let token = self.credentials.get_token(&self.oauth, &self.key).await?;
        Ok(token.value.clone())
    }
}

/// A pooled client bound to one resolved target. Never rebuilt.
#[derive(Debug)]
pub struct CachedClient {
    cache_key: CacheKey,
    base_url: String,
    connection: ConnectionConfig,
    http: HttpClient,
}

impl CachedClient {
    #[must_use]
    pub fn cache_key(&self) -> &CacheKey {
        &self.cache_key
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn connection(&self) -> &ConnectionConfig {
        &self.connection
    }

    #[must_use]
    pub fn http(&self) -> &HttpClient {
        &self.http
    }
}

/// Lazily built clients keyed by [`CacheKey`].
///
/// Creation is atomic per key: concurrent first callers await one build.
/// A failed build leaves the key empty so the next caller tries again.
pub struct ClientCache {
    credentials: Arc<CredentialManager>,
    transport: TransportSecurity,
    clients: DashMap<CacheKey, Arc<OnceCell<Arc<CachedClient>>>>,
}

impl std::fmt::Debug for ClientCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCache")
            .field("transport", &self.transport)
            .field("clients", &self.clients.len())
            .finish_non_exhaustive()
    }
}

impl ClientCache {
    #[must_use]
    pub fn new(credentials: Arc<CredentialManager>, transport: TransportSecurity) -> Self {
        Self {
            credentials,
            transport,
            clients: DashMap::new(),
        }
    }

    /// Return the client for `resolved.cache_key`, building it on first use.
    ///
    /// # Errors
    ///
    /// `DomainError::ConfigNotFound` if the client cannot be built from the
    /// resolved settings. Nothing is cached in that case.
    pub async fn get_client(&self, resolved: &ResolvedConfig) -> Result<Arc<CachedClient>, DomainError> {
        let cell = self.cell(&resolved.cache_key);
        let client = cell
            .get_or_try_init(|| async { self.build(resolved).map(Arc::new) })
            .await?;
        Ok(Arc::clone(client))
    }

    fn cell(&self, key: &CacheKey) -> Arc<OnceCell<Arc<CachedClient>>> {
        if let Some(cell) = self.clients.get(key) {
            return Arc::clone(&cell);
        }
        Arc::clone(&self.clients.entry(key.clone()).or_default())
    }

    /// Number of clients built so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.iter().filter(|cell| cell.initialized()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[tracing::instrument(skip_all, fields(cache_key = %resolved.cache_key))]
    fn build(&self, resolved: &ResolvedConfig) -> Result<CachedClient, DomainError> {
        self.check_base_url(resolved)?;
        let connection = &resolved.connection;
        let bearer = CredentialBearer {
            credentials: Arc::clone(&self.credentials),
            oauth: resolved.oauth.clone(),
            key: resolved.cache_key.clone(),
        };

        let http = HttpClientBuilder::new()
            .transport(self.transport)
            .connect_timeout(connection.connect_timeout())
            .timeout(connection.read_timeout())
            .max_connections(Some(connection.max_connections))
            .pending_acquire_timeout(connection.pending_acquire_timeout())
            .pool_max_idle_per_host(connection.max_connections_per_route)
            .pool_idle_timeout(Some(connection.idle_timeout()))
            .bearer_auth(Arc::new(bearer))
            .build()
            .map_err(|e| {
                DomainError::config_not_found(format!(
                    "cannot build client for {}: {e}",
                    resolved.cache_key
                ))
            })?;

        tracing::info!(
            base_url = %resolved.base_url,
            max_connections = connection.max_connections,
            connect_timeout_ms = connection.connect_timeout_ms,
            read_timeout_ms = connection.read_timeout_ms,
            "Client created"
        );

        Ok(CachedClient {
            cache_key: resolved.cache_key.clone(),
            base_url: resolved.base_url.clone(),
            connection: connection.clone(),
            http,
        })
    }

    fn check_base_url(&self, resolved: &ResolvedConfig) -> Result<(), DomainError> {
        let invalid = |reason: String| {
            DomainError::config_not_found(format!(
                "invalid base_url '{}' for {}: {reason}",
                resolved.base_url, resolved.cache_key
            ))
        };
        let url = url::Url::parse(&resolved.base_url).map_err(|e| invalid(e.to_string()))?;
        if !url.has_host() {
            return Err(invalid("missing host".to_owned()));
        }
        match (url.scheme(), self.transport) {
            ("https", _) | ("http", TransportSecurity::AllowInsecureHttp) => Ok(()),
            ("http", TransportSecurity::TlsOnly) => {
                Err(invalid("plain http is not allowed".to_owned()))
            }
            (other, _) => Err(invalid(format!("unsupported scheme '{other}'"))),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::domain::credentials::{CachedToken, TokenError, TokenFetcher};
    use crate::domain::resolver::ConfigResolver;

    struct NeverFetch;

    #[async_trait]
    impl TokenFetcher for NeverFetch {
        async fn fetch(&self, _oauth: &OAuthConfig) -> Result<CachedToken, TokenError> {
            Err(TokenError::Http("not expected".to_owned()))
        }
    }

    fn resolver() -> ConfigResolver {
        let store = serde_json::from_value(serde_json::json!({
            "default_oauth": {"client_id": "c", "token_uri": "http://auth/token"},
            "environments": {"prod": {"connection": {"timeout": 15000}}},
            "countries": {"US": {"subsystems": {
                "profile": {"base_url": "http://profile", "subsystem_mappings": {"contact": "/contact"}},
                "product": {"base_url": "http://product"}
            }}}
        }))
        .unwrap();
        ConfigResolver::new(Arc::new(store))
    }

    fn cache() -> ClientCache {
        ClientCache::new(
            Arc::new(CredentialManager::new(Arc::new(NeverFetch))),
            TransportSecurity::AllowInsecureHttp,
        )
    }

    #[tokio::test]
    async fn same_key_same_client() {
        let cache = cache();
        let r = resolver();
        let a = cache.get_client(&r.resolve("US", "profile", "prod").unwrap()).await.unwrap();
        let b = cache.get_client(&r.resolve("US", "contact", "prod").unwrap()).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.connection().connect_timeout_ms, 15000);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn different_key_different_client() {
        let cache = cache();
        let r = resolver();
        let a = cache.get_client(&r.resolve("US", "profile", "dev").unwrap()).await.unwrap();
        let b = cache.get_client(&r.resolve("US", "product", "dev").unwrap()).await.unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(b.base_url(), "http://product");
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn failed_build_caches_nothing() {
        let cache = cache();
        let mut resolved = resolver().resolve("US", "product", "dev").unwrap();
        let good_url = std::mem::replace(&mut resolved.base_url, "not a url".to_owned());

        let err = cache.get_client(&resolved).await.unwrap_err();
        assert!(matches!(err, DomainError::ConfigNotFound(msg) if msg.contains("not a url")));
        assert!(cache.is_empty());

        resolved.base_url = good_url;
        let client = cache.get_client(&resolved).await.unwrap();
        assert_eq!(client.base_url(), "http://product");
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn plain_http_rejected_when_tls_required() {
        let cache = ClientCache::new(
            Arc::new(CredentialManager::new(Arc::new(NeverFetch))),
            TransportSecurity::TlsOnly,
        );
        let resolved = resolver().resolve("US", "product", "dev").unwrap();
        let err = cache.get_client(&resolved).await.unwrap_err();
        assert!(matches!(err, DomainError::ConfigNotFound(msg) if msg.contains("plain http")));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn concurrent_first_callers_share_one_build() {
        let cache = cache();
        let resolved = resolver().resolve("US", "profile", "dev").unwrap();
        let clients =
            futures::future::join_all((0..8).map(|_| cache.get_client(&resolved))).await;
        let first = clients[0].as_ref().unwrap();
        assert!(clients.iter().all(|c| Arc::ptr_eq(first, c.as_ref().unwrap())));
        assert_eq!(cache.len(), 1);
    }
}

//! Request execution, health probing and token cache administration.

use std::sync::Arc;

use cma_http::TransportSecurity;
use customer_master_sdk::{CustomerMasterRequest, HealthReport, HttpMethod};
use serde_json::Value;

use super::client_cache::ClientCache;
use super::credentials::{CredentialManager, HttpTokenFetcher, TokenFetcher};
use super::error::DomainError;
use super::resolver::{ConfigResolver, ResolvedConfig};
use crate::config::CustomerMasterConfig;

/// Customer master adapter service.
///
/// Owns the resolver and both caches. Cheap to share behind an `Arc`.
pub struct Service {
    config: Arc<CustomerMasterConfig>,
    resolver: ConfigResolver,
    credentials: Arc<CredentialManager>,
    clients: ClientCache,
}

impl Service {
    /// Create a service that fetches tokens over HTTP.
    ///
    /// # Errors
    ///
    /// `DomainError::Auth` if the token endpoint client cannot be built.
    pub fn new(config: CustomerMasterConfig) -> Result<Self, DomainError> {
        let fetcher = HttpTokenFetcher::new(transport_for(&config))?;
        Ok(Self::with_fetcher(config, Arc::new(fetcher)))
    }

    #[must_use]
    pub fn with_fetcher(config: CustomerMasterConfig, fetcher: Arc<dyn TokenFetcher>) -> Self {
        let transport = transport_for(&config);
        let config = Arc::new(config);
        let resolver = ConfigResolver::new(Arc::new(config.webclients.clone()));
        let credentials = Arc::new(CredentialManager::new(fetcher));
        let clients = ClientCache::new(Arc::clone(&credentials), transport);
        Self {
            config,
            resolver,
            credentials,
            clients,
        }
    }

    #[must_use]
    pub fn config(&self) -> &CustomerMasterConfig {
        &self.config
    }

    #[must_use]
    pub fn credentials(&self) -> &Arc<CredentialManager> {
        &self.credentials
    }

    #[must_use]
    pub fn clients(&self) -> &ClientCache {
        &self.clients
    }

    /// Resolve a target, defaulting country and environment from the config.
    ///
    /// # Errors
    ///
    /// `DomainError::ConfigNotFound` if the target does not resolve.
    pub fn resolve(
        &self,
        subsystem: &str,
        country: Option<&str>,
        environment: Option<&str>,
    ) -> Result<ResolvedConfig, DomainError> {
        let country = country.unwrap_or(&self.config.default_country);
        let environment = environment.unwrap_or(&self.config.environment);
        self.resolver.resolve(country, subsystem, environment)
    }

    /// Issue one call and decode its JSON body.
    ///
    /// An empty 2xx body decodes to `Value::Null`.
    ///
    /// # Errors
    ///
    /// - `ConfigNotFound` if the target does not resolve
    /// - `Auth` if no token could be obtained
    /// - `Upstream` for a non-2xx answer
    /// - `Timeout`, `Transport` or `InvalidPayload` otherwise
    #[tracing::instrument(
        skip_all,
        fields(method = %request.method, subsystem = %request.subsystem, country = ?request.country)
    )]
    pub async fn execute(&self, request: &CustomerMasterRequest) -> Result<Value, DomainError> {
        let resolved = self.resolve(
            &request.subsystem,
            request.country.as_deref(),
            request.environment.as_deref(),
        )?;
        let client = self.clients.get_client(&resolved).await?;
        let url = resolved.url_for(&request.path);

        let mut builder = client.http().request(to_http_method(request.method), &url);
        if let Some(body) = &request.body {
            builder = builder.json(body)?;
        }
        let bytes = builder.send().await?.checked_bytes().await?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| DomainError::InvalidPayload(e.to_string()))
    }

    /// Probe one subsystem with a GET on the configured health path.
    ///
    /// A 2xx answer is healthy, provided its trimmed body equals
    /// `health.expected_body` when one is configured. Every error, including
    /// an unresolvable target, is reported as unhealthy.
    pub async fn is_subsystem_healthy(&self, subsystem: &str, country: Option<&str>) -> bool {
        match self.probe(subsystem, country).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(subsystem, country = ?country, error = %e, "Health probe failed");
                false
            }
        }
    }

    async fn probe(&self, subsystem: &str, country: Option<&str>) -> Result<(), DomainError> {
        let resolved = self.resolve(subsystem, country, None)?;
        let client = self.clients.get_client(&resolved).await?;
        let url = resolved.url_for(&self.config.health.path);
        let body = client.http().get(&url).send().await?.checked_bytes().await?;
        match &self.config.health.expected_body {
            Some(expected) if String::from_utf8_lossy(&body).trim() != expected.as_str() => {
                Err(DomainError::InvalidPayload(format!(
                    "health answer does not match '{expected}'"
                )))
            }
            _ => Ok(()),
        }
    }

    /// Probe every configured health subsystem concurrently.
    #[tracing::instrument(skip_all, fields(country = ?country))]
    pub async fn check_all_health(&self, country: Option<&str>) -> HealthReport {
        let probes = self.config.health.subsystems.iter().map(|subsystem| async move {
            let healthy = self.is_subsystem_healthy(subsystem, country).await;
            (subsystem.clone(), healthy)
        });
        let report: HealthReport = futures::future::join_all(probes).await.into_iter().collect();
        tracing::debug!(
            healthy = report.values().filter(|ok| **ok).count(),
            total = report.len(),
            "Health check finished"
        );
        report
    }

    /// Drop every cached token. Clients are kept.
    pub fn clear_token_cache(&self) {
        self.credentials.clear_all();
    }

    /// Drop the cached token of one (subsystem, country) target.
    ///
    /// # Errors
    ///
    /// `DomainError::ConfigNotFound` if the target does not resolve.
    pub fn clear_token_cache_for(
        &self,
        subsystem: &str,
        country: Option<&str>,
    ) -> Result<(), DomainError> {
        let resolved = self.resolve(subsystem, country, None)?;
        self.credentials.clear(&resolved.cache_key);
        Ok(())
    }
}

fn transport_for(config: &CustomerMasterConfig) -> TransportSecurity {
    if config.allow_insecure_http {
        TransportSecurity::AllowInsecureHttp
    } else {
        TransportSecurity::TlsOnly
    }
}

fn to_http_method(method: HttpMethod) -> http::Method {
    match method {
        HttpMethod::Get => http::Method::GET,
        HttpMethod::Put => http::Method::PUT,
        HttpMethod::Post => http::Method::POST,
    }
}

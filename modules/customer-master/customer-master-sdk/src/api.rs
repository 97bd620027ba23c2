//! Public API trait for the customer-master adapter.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::CustomerMasterError;
use crate::models::{CustomerMasterRequest, HealthReport, HttpMethod};

/// Client for per-country customer master subsystems.
///
/// Implementations resolve configuration, attach an OAuth2 bearer token and
/// reuse one pooled client per target.
///
/// ```ignore
/// let profile = client.get_json("profile", Some("DE"), "/profiles/7").await?;
/// client.clear_token_cache_for("profile", Some("DE"))?;
/// ```
#[async_trait]
pub trait CustomerMasterClientV1: Send + Sync {
    /// Execute one request and return the decoded JSON body.
    ///
    /// An empty 2xx body decodes to `Value::Null`.
    ///
    /// # Errors
    ///
    /// - `ConfigNotFound` if the country or subsystem is not configured
    /// - `Auth` if no token could be obtained
    /// - `Upstream` for non-2xx answers
    /// - `Timeout` / `Transport` for network failures
    async fn execute(&self, request: CustomerMasterRequest) -> Result<Value, CustomerMasterError>;

    /// # Errors
    /// See [`execute`](Self::execute).
    async fn get_json(
        &self,
        subsystem: &str,
        country: Option<&str>,
        path: &str,
    ) -> Result<Value, CustomerMasterError> {
        self.execute(build(HttpMethod::Get, subsystem, country, path, None))
            .await
    }

    /// # Errors
    /// See [`execute`](Self::execute).
    async fn put_json(
        &self,
        subsystem: &str,
        country: Option<&str>,
        path: &str,
        body: Value,
    ) -> Result<Value, CustomerMasterError> {
        self.execute(build(HttpMethod::Put, subsystem, country, path, Some(body)))
            .await
    }

    /// # Errors
    /// See [`execute`](Self::execute).
    async fn post_json(
        &self,
        subsystem: &str,
        country: Option<&str>,
        path: &str,
        body: Value,
    ) -> Result<Value, CustomerMasterError> {
        self.execute(build(HttpMethod::Post, subsystem, country, path, Some(body)))
            .await
    }

    /// Probe one subsystem. Never fails; any error counts as unhealthy.
    async fn is_subsystem_healthy(&self, subsystem: &str, country: Option<&str>) -> bool;

    /// Probe every known subsystem concurrently.
    async fn check_all_health(&self, country: Option<&str>) -> HealthReport;

    /// Drop every cached OAuth2 token. Pooled clients are kept.
    fn clear_token_cache(&self);

    /// Drop the cached token for one (subsystem, country) target.
    ///
    /// # Errors
    ///
    /// `ConfigNotFound` if the target does not resolve.
    fn clear_token_cache_for(
        &self,
        subsystem: &str,
        country: Option<&str>,
    ) -> Result<(), CustomerMasterError>;
}

fn build(
    method: HttpMethod,
    subsystem: &str,
    country: Option<&str>,
    path: &str,
    body: Option<Value>,
) -> CustomerMasterRequest {
    CustomerMasterRequest {
        method,
        subsystem: subsystem.to_owned(),
        country: country.map(str::to_owned),
        environment: None,
        path: path.to_owned(),
        body,
    }
}

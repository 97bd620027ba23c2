//! Customer Master Adapter
//!
//! Resolves per-country, per-environment endpoint configuration for the
//! customer master subsystems, keeps one OAuth2 client-credentials token and
//! one pooled HTTP client per target, and exposes them through
//! [`CustomerMasterLocalClient`], the in-process implementation of
//! [`customer_master_sdk::CustomerMasterClientV1`].
//!
//! ```ignore
//! let config = customer_master::config::load(Some(Path::new("cma.yaml")))?;
//! let svc = Arc::new(customer_master::Service::new(config)?);
//! let client = customer_master::CustomerMasterLocalClient::new(svc);
//! let product = client.get_json("product", Some("US"), "/products/42").await?;
//! ```

pub mod config;
pub mod domain;

pub use config::CustomerMasterConfig;
pub use domain::{
    CacheKey, ClientCache, ConfigResolver, CredentialManager, CustomerMasterLocalClient,
    DomainError, ResolvedConfig, Service,
};

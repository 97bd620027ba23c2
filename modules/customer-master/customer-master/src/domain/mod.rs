//! Domain layer: resolution, credentials, clients and the service on top.

pub mod client_cache;
pub mod credentials;
pub mod error;
pub mod local_client;
pub mod resolver;
pub mod service;

pub use client_cache::{CachedClient, ClientCache};
pub use credentials::{CachedToken, CredentialManager, HttpTokenFetcher, TokenError, TokenFetcher};
pub use error::DomainError;
pub use local_client::CustomerMasterLocalClient;
pub use resolver::{CacheKey, ConfigResolver, ConnectionConfig, OAuthConfig, ResolvedConfig};
pub use service::Service;

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Pooled outbound HTTP client
//!
//! This crate provides a hyper-based HTTP client with:
//! - TLS via rustls (HTTPS only by default)
//! - Connection pooling with idle eviction
//! - Connect and per-request read timeouts
//! - Admission control over in-flight requests with a bounded wait
//! - Per-request bearer token injection from an async token source
//! - Debug logging of every outbound request
//! - 5xx responses surfaced as a retryable [`HttpError::ServerError`]
//!
//! # Example
//!
//! ```ignore
//! use cma_http::HttpClient;
//! use std::time::Duration;
//!
//! let client = HttpClient::builder()
//!     .timeout(Duration::from_secs(10))
//!     .connect_timeout(Duration::from_secs(5))
//!     .build()?;
//!
//! let data: MyData = client
//!     .get("https://example.com/api")
//!     .send()
//!     .await?
//!     .json()
//!     .await?;
//! ```

mod builder;
mod client;
mod config;
mod error;
mod layers;
mod request;
mod response;
pub mod security;
mod tls;

pub use builder::HttpClientBuilder;
pub use client::HttpClient;
pub use config::{DEFAULT_USER_AGENT, HttpClientConfig, TlsRootConfig, TransportSecurity};
pub use error::{HttpError, InvalidUriKind};
pub use layers::{
    AdmissionLayer, BearerAuthLayer, BearerTokenSource, RequestLogLayer, ServerErrorLayer,
};
pub use request::RequestBuilder;
pub use response::{HttpResponse, ResponseBody};

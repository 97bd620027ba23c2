//! Tower layers composed by [`HttpClientBuilder`](crate::HttpClientBuilder).

mod admission;
mod auth;
mod request_log;
mod server_error;

pub use admission::{AdmissionLayer, AdmissionService};
pub use auth::{BearerAuthLayer, BearerAuthService, BearerTokenSource};
pub use request_log::{RequestLogLayer, RequestLogService};
pub use server_error::{ServerErrorLayer, ServerErrorService};

/// Boxed future shared by the layers in this module.
pub type LayerFuture<T> =
    std::pin::Pin<Box<dyn std::future::Future<Output = Result<T, crate::HttpError>> + Send>>;

use super::LayerFuture;
use crate::error::HttpError;
use async_trait::async_trait;
use http::header::{AUTHORIZATION, HeaderName};
use http::{HeaderValue, Request, Response};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use zeroize::Zeroizing;

/// Supplies the bearer token for an outbound request.
///
/// Called once per request, so implementations are expected to cache.
#[async_trait]
pub trait BearerTokenSource: Send + Sync {
    /// # Errors
    /// Returns an error if no valid token can be obtained.
    async fn bearer_token(&self) -> Result<SecretString, Box<dyn std::error::Error + Send + Sync>>;
}

/// Tower layer that injects `Authorization: Bearer <token>` into every request.
///
/// The token is requested from the [`BearerTokenSource`] right before the
/// request is forwarded. A source failure fails the request with
/// [`HttpError::Auth`] and nothing is sent.
#[derive(Clone)]
pub struct BearerAuthLayer {
    source: Arc<dyn BearerTokenSource>,
    header_name: HeaderName,
}

impl BearerAuthLayer {
    #[must_use]
    pub fn new(source: Arc<dyn BearerTokenSource>) -> Self {
        Self {
            source,
            header_name: AUTHORIZATION,
        }
    }

    /// Inject `<header_name>: Bearer <token>` instead of `Authorization`.
    #[must_use]
    pub fn with_header_name(source: Arc<dyn BearerTokenSource>, header_name: HeaderName) -> Self {
        Self {
            source,
            header_name,
        }
    }
}

impl std::fmt::Debug for BearerAuthLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerAuthLayer")
            .field("header_name", &self.header_name)
            .finish_non_exhaustive()
    }
}

impl<S> Layer<S> for BearerAuthLayer {
    type Service = BearerAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BearerAuthService {
            inner,
            source: Arc::clone(&self.source),
            header_name: self.header_name.clone(),
        }
    }
}

#[derive(Clone)]
pub struct BearerAuthService<S> {
    inner: S,
    source: Arc<dyn BearerTokenSource>,
    header_name: HeaderName,
}

impl<S, B, ResBody> Service<Request<B>> for BearerAuthService<S>
where
    S: Service<Request<B>, Response = Response<ResBody>, Error = HttpError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
    B: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = HttpError;
    type Future = LayerFuture<Response<ResBody>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let source = Arc::clone(&self.source);
        let header_name = self.header_name.clone();

        Box::pin(async move {
            let token = source.bearer_token().await.map_err(HttpError::Auth)?;
            let raw = Zeroizing::new(format!("Bearer {}", token.expose_secret()));
            let mut value = HeaderValue::from_str(&raw)?;
            value.set_sensitive(true);
            req.headers_mut().insert(header_name, value);

            inner.call(req).await
        })
    }
}

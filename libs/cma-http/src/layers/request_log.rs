use super::LayerFuture;
use crate::error::HttpError;
use http::{Request, Response};
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};

/// Tower layer that logs each outbound request and its outcome at debug level.
///
/// Only method, URI, status and latency are recorded; headers are never
/// logged since they carry the bearer token.
#[derive(Clone, Debug, Default)]
pub struct RequestLogLayer;

impl<S> Layer<S> for RequestLogLayer {
    type Service = RequestLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLogService { inner }
    }
}

#[derive(Clone, Debug)]
pub struct RequestLogService<S> {
    inner: S,
}

impl<S, B, ResBody> Service<Request<B>> for RequestLogService<S>
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

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let method = req.method().clone();
        let uri = req.uri().clone();
        tracing::debug!(%method, %uri, "Request");

        Box::pin(async move {
            let started = Instant::now();
            let result = inner.call(req).await;
            let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            match &result {
                Ok(response) => tracing::debug!(
                    %method,
                    %uri,
                    status = response.status().as_u16(),
                    elapsed_ms,
                    "Response"
                ),
                Err(e) => tracing::debug!(%method, %uri, error = %e, elapsed_ms, "Request failed"),
            }
            result
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use tower::ServiceExt;
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn test_request_line_logged() {
        let svc = RequestLogLayer.layer(tower::service_fn(|_req: Request<()>| {
            std::future::ready(Ok::<_, HttpError>(Response::new(())))
        }));

        let req = Request::builder()
            .method(http::Method::PUT)
            .uri("http://profile.internal/profiles/42")
            .header(http::header::AUTHORIZATION, "Bearer do-not-log")
            .body(())
            .unwrap();
        svc.oneshot(req).await.unwrap();

        assert!(logs_contain("Request"));
        assert!(logs_contain("http://profile.internal/profiles/42"));
        assert!(!logs_contain("do-not-log"));
    }
}

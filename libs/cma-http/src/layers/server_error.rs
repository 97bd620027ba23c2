use super::LayerFuture;
use crate::error::HttpError;
use crate::response::{ResponseBody, read_error_preview};
use http::{Request, Response};
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Tower layer that turns every 5xx response into [`HttpError::ServerError`].
///
/// The error carries the status and a bounded body preview and reports
/// itself as retryable. Nothing is retried here.
#[derive(Clone, Debug)]
pub struct ServerErrorLayer {
    max_body_size: usize,
}

impl ServerErrorLayer {
    #[must_use]
    pub fn new(max_body_size: usize) -> Self {
        Self { max_body_size }
    }
}

impl<S> Layer<S> for ServerErrorLayer {
    type Service = ServerErrorService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ServerErrorService {
            inner,
            max_body_size: self.max_body_size,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServerErrorService<S> {
    inner: S,
    max_body_size: usize,
}

impl<S, B> Service<Request<B>> for ServerErrorService<S>
where
    S: Service<Request<B>, Response = Response<ResponseBody>, Error = HttpError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
    B: Send + 'static,
{
    type Response = Response<ResponseBody>;
    type Error = HttpError;
    type Future = LayerFuture<Response<ResponseBody>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let max_body_size = self.max_body_size;

        Box::pin(async move {
            let response = inner.call(req).await?;
            let status = response.status();
            if !status.is_server_error() {
                return Ok(response);
            }

            let body_preview = read_error_preview(response, max_body_size)
                .await
                .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
            tracing::debug!(status = status.as_u16(), "server error response");
            Err(HttpError::ServerError {
                status,
                body_preview,
            })
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::StatusCode;
    use http_body_util::{BodyExt, Full};
    use tower::ServiceExt;

    fn fixed(status: u16, body: &'static str) -> impl Service<
        Request<()>,
        Response = Response<ResponseBody>,
        Error = HttpError,
        Future = std::future::Ready<Result<Response<ResponseBody>, HttpError>>,
    > + Clone
           + Send
           + 'static {
        tower::service_fn(move |_req: Request<()>| {
            std::future::ready(Ok::<_, HttpError>(
                Response::builder()
                    .status(status)
                    .body(
                        Full::new(Bytes::from_static(body.as_bytes()))
                            .map_err(Into::into)
                            .boxed(),
                    )
                    .unwrap(),
            ))
        })
    }

    #[tokio::test]
    async fn test_5xx_becomes_retryable_error() {
        let svc = ServerErrorLayer::new(1024).layer(fixed(503, "maintenance"));
        let err = svc.oneshot(Request::new(())).await.unwrap_err();

        match &err {
            HttpError::ServerError {
                status,
                body_preview,
            } => {
                assert_eq!(*status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(body_preview, "maintenance");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_4xx_passes_through() {
        let svc = ServerErrorLayer::new(1024).layer(fixed(404, "missing"));
        let resp = svc.oneshot(Request::new(())).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_2xx_passes_through() {
        let svc = ServerErrorLayer::new(1024).layer(fixed(200, "ok"));
        let resp = svc.oneshot(Request::new(())).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}

use super::LayerFuture;
use crate::error::HttpError;
use crate::response::ResponseBody;
use bytes::Bytes;
use http::{Request, Response};
use http_body::{Body, Frame, SizeHint};
use http_body_util::BodyExt;
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tower::{Layer, Service};

/// Tower layer bounding the number of in-flight requests.
///
/// A request waits up to `acquire_timeout` for a slot and then fails with
/// [`HttpError::PoolExhausted`]. The slot stays taken until the response
/// body is fully read or dropped.
#[derive(Clone, Debug)]
pub struct AdmissionLayer {
    slots: Arc<Semaphore>,
    acquire_timeout: Duration,
}

impl AdmissionLayer {
    #[must_use]
    pub fn new(max_in_flight: usize, acquire_timeout: Duration) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(max_in_flight.max(1))),
            acquire_timeout,
        }
    }

    /// Currently free slots.
    #[must_use]
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }
}

impl<S> Layer<S> for AdmissionLayer {
    type Service = AdmissionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AdmissionService {
            inner,
            slots: Arc::clone(&self.slots),
            acquire_timeout: self.acquire_timeout,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AdmissionService<S> {
    inner: S,
    slots: Arc<Semaphore>,
    acquire_timeout: Duration,
}

impl<S, B> Service<Request<B>> for AdmissionService<S>
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
        let slots = Arc::clone(&self.slots);
        let acquire_timeout = self.acquire_timeout;

        Box::pin(async move {
            let permit = tokio::time::timeout(acquire_timeout, slots.acquire_owned())
                .await
                .map_err(|_| {
                    tracing::warn!(?acquire_timeout, "no free connection slot");
                    HttpError::PoolExhausted {
                        waited: acquire_timeout,
                    }
                })?
                .map_err(|_| HttpError::ServiceClosed)?;

            let response = inner.call(req).await?;
            Ok(response.map(|body| PermitBody::new(body, permit).boxed()))
        })
    }
}

pin_project! {
    /// Response body that returns its admission slot when dropped.
    struct PermitBody {
        #[pin]
        inner: ResponseBody,
        _permit: OwnedSemaphorePermit,
    }
}

impl PermitBody {
    fn new(inner: ResponseBody, permit: OwnedSemaphorePermit) -> Self {
        Self {
            inner,
            _permit: permit,
        }
    }
}

impl Body for PermitBody {
    type Data = Bytes;
    type Error = Box<dyn std::error::Error + Send + Sync>;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        self.project().inner.poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

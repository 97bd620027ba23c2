use crate::error::HttpError;
use crate::security::ERROR_BODY_PREVIEW_LIMIT;
use bytes::{Bytes, BytesMut};
use http::{HeaderMap, Response, StatusCode};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;

/// Type-erased response body produced by the client's service stack.
pub type ResponseBody =
    http_body_util::combinators::BoxBody<Bytes, Box<dyn std::error::Error + Send + Sync>>;

/// Response of a request that reached the server and was answered below 500.
///
/// Body reads are capped at the client's `max_body_size`. 5xx answers never
/// reach this type; the client reports them as [`HttpError::ServerError`].
#[derive(Debug)]
pub struct HttpResponse {
    pub(crate) inner: Response<ResponseBody>,
    pub(crate) max_body_size: usize,
}

impl HttpResponse {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Read the body regardless of status.
    ///
    /// # Errors
    /// `BodyTooLarge` past the cap, `Transport` if the stream fails.
    pub async fn bytes(self) -> Result<Bytes, HttpError> {
        read_body_limited(self.inner, self.max_body_size).await
    }

    /// Read the body of a 2xx response.
    ///
    /// Any other status fails with `HttpStatus`, carrying a preview of the
    /// error body and its content type.
    ///
    /// # Errors
    /// `HttpStatus` for non-2xx, plus the errors of [`bytes`](Self::bytes).
    pub async fn checked_bytes(self) -> Result<Bytes, HttpError> {
        let status = self.inner.status();
        if status.is_success() {
            return self.bytes().await;
        }

        let content_type = self
            .inner
            .headers()
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body_preview = read_error_preview(self.inner, self.max_body_size).await?;
        Err(HttpError::HttpStatus {
            status,
            body_preview,
            content_type,
        })
    }

    /// Decode the body of a 2xx response as JSON.
    ///
    /// # Errors
    /// `Json` if decoding fails, plus the errors of
    /// [`checked_bytes`](Self::checked_bytes).
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, HttpError> {
        let body = self.checked_bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Error body as lossy UTF-8, cut off at [`ERROR_BODY_PREVIEW_LIMIT`].
///
/// An oversized body becomes a placeholder so the status still surfaces.
pub(crate) async fn read_error_preview(
    response: Response<ResponseBody>,
    max_body_size: usize,
) -> Result<String, HttpError> {
    let limit = max_body_size.min(ERROR_BODY_PREVIEW_LIMIT);
    match read_body_limited(response, limit).await {
        Ok(body) => Ok(String::from_utf8_lossy(&body).into_owned()),
        Err(HttpError::BodyTooLarge { .. }) => Ok(format!("<error body exceeds {limit} bytes>")),
        Err(e) => Err(e),
    }
}

pub(crate) async fn read_body_limited(
    response: Response<ResponseBody>,
    limit: usize,
) -> Result<Bytes, HttpError> {
    let mut body = response.into_body();
    let mut buf = BytesMut::new();

    while let Some(frame) = body.frame().await {
        let Ok(data) = frame.map_err(HttpError::Transport)?.into_data() else {
            continue;
        };
        let actual = buf.len() + data.len();
        if actual > limit {
            return Err(HttpError::BodyTooLarge { limit, actual });
        }
        buf.extend_from_slice(&data);
    }

    Ok(buf.freeze())
}

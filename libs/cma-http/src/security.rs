//! HTTP security utilities.

/// Maximum body preview size carried in error values (8KB).
///
/// Error responses may be large; only this prefix is read into
/// [`HttpError::HttpStatus`](crate::HttpError::HttpStatus) and
/// [`HttpError::ServerError`](crate::HttpError::ServerError).
pub const ERROR_BODY_PREVIEW_LIMIT: usize = 8 * 1024;

/// Default cap for buffered response bodies (1 MiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

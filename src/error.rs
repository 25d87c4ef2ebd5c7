use std::fmt;

use thiserror::Error;

/// A `Result` typedef to use with the [`HttpCacheError`] type.
pub type Result<T> = std::result::Result<T, HttpCacheError>;

/// A header value could not be parsed into the shape the engine expected.
#[derive(Debug, Default, Copy, Clone)]
pub struct BadHeader;

impl fmt::Display for BadHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad("error parsing header value")
    }
}

impl std::error::Error for BadHeader {}

/// The top-level error type for the caching engine.
///
/// Every fallible operation the engine exposes returns this type (or the
/// [`Result`] alias over it). Variants map to the taxonomy in the crate's
/// error-handling design: failures converting HTTP types, codec failures
/// on a stored entry, and a catch-all for the underlying request executor.
#[derive(Error, Debug)]
pub enum HttpCacheError {
    /// A header value failed to parse.
    #[error(transparent)]
    BadHeader(#[from] BadHeader),

    /// Error building or inspecting an `http` crate type.
    #[error(transparent)]
    Http(#[from] http::Error),

    /// Error parsing an HTTP status code.
    #[error(transparent)]
    InvalidStatusCode(#[from] http::status::InvalidStatusCode),

    /// Error converting a header value to a UTF-8 string.
    #[error(transparent)]
    HeaderToStr(#[from] http::header::ToStrError),

    /// Error parsing an HTTP header name.
    #[error(transparent)]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    /// Error parsing an HTTP header value.
    #[error(transparent)]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// Error parsing the request URI as a URL for key derivation.
    #[error(transparent)]
    InvalidUrl(#[from] url::ParseError),

    /// A stored entry could not be decoded; the entry is corrupt and
    /// should be treated as a miss (and deleted).
    #[error("failed to decode cached entry: {0}")]
    Codec(String),

    /// The underlying request executor failed. This is the only variant
    /// that can trigger the stale-if-error fallback path.
    #[error("request executor failed: {0}")]
    Executor(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl HttpCacheError {
    /// Wraps an arbitrary executor error, erasing its concrete type.
    pub fn executor<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Executor(Box::new(err))
    }

    /// True for errors that should be treated as a transport failure for
    /// the purposes of the stale-if-error fallback (see engine module).
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, Self::Executor(_))
    }
}

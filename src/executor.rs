//! The request-executor collaborator contract.
//!
//! The engine never performs network I/O itself; it delegates the
//! actual round trip to a [`RequestExecutor`], which is free to be a
//! thin wrapper over `hyper`, `reqwest`, or an in-process fake for
//! tests. Request bodies are always fully materialized `Bytes` because
//! a conditional retry (installing `If-None-Match`/`If-Modified-Since`)
//! needs to replay the same request. Response bodies are boxed to a
//! single concrete type so the engine can tee a streaming body without
//! juggling a generic body parameter throughout.

use bytes::Bytes;
use http::{Request, Response};
use http_body_util::combinators::BoxBody;

use crate::error::Result;

/// A type-erased error for a boxed response body.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The response body type every [`RequestExecutor`] implementation
/// returns: a boxed, type-erased [`http_body::Body`].
pub type ExecutorBody = BoxBody<Bytes, BoxError>;

/// Performs a single HTTP round trip.
///
/// Implementations should surface transport failures (connection
/// refused, timeout, TLS error, ...) as an `Err` via
/// [`crate::error::HttpCacheError::executor`]; a non-2xx HTTP response
/// is a successful round trip as far as this trait is concerned — the
/// engine itself interprets the status code.
#[async_trait::async_trait]
pub trait RequestExecutor: Send + Sync {
    /// Sends `request` and returns the origin's response.
    async fn round_trip(&self, request: Request<Bytes>) -> Result<Response<ExecutorBody>>;
}

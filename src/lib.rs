#![forbid(unsafe_code, future_incompatible)]
#![deny(
    missing_docs,
    missing_debug_implementations,
    nonstandard_style,
    unused_qualifications,
    unused_import_braces,
    unused_extern_crates,
    trivial_casts,
    trivial_numeric_casts
)]
#![cfg_attr(docsrs, feature(doc_cfg))]
//! A client-side HTTP caching layer implementing RFC 7234 semantics.
//!
//! This crate is a private cache: it sits between a caller and an
//! underlying [`RequestExecutor`], deciding when a response may be
//! stored, when a stored response may be served without contacting the
//! origin, and how to revalidate a stale one. Storage is delegated to a
//! [`CacheStore`] implementation — [`InMemoryStore`] is provided as a
//! simple, process-local reference, but any backend (disk, Redis, ...)
//! can be plugged in.
//!
//! ## Basic usage
//!
//! ```
//! use bytes::Bytes;
//! use http::{Request, Response};
//! use http_body_util::{BodyExt, Full};
//! use http_cache::{ExecutorBody, HttpCache, InMemoryStore, RequestExecutor};
//!
//! struct Echo;
//!
//! #[async_trait::async_trait]
//! impl RequestExecutor for Echo {
//!     async fn round_trip(&self, _request: Request<Bytes>) -> http_cache::Result<Response<ExecutorBody>> {
//!         let body = BodyExt::boxed(BodyExt::map_err(
//!             Full::new(Bytes::from_static(b"hello")),
//!             |never| match never {},
//!         ));
//!         Ok(Response::builder().status(200).body(body).unwrap())
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> http_cache::Result<()> {
//! let cache = HttpCache::new(InMemoryStore::new(), Echo);
//! let request = Request::builder().uri("https://example.com/").body(Bytes::new()).unwrap();
//! let _response = cache.round_trip(request).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Customizing behavior
//!
//! [`HttpCacheOptions`] exposes a handful of hooks — a custom cache-key
//! derivation, a predicate gating what gets stored, an override to
//! always serve from cache, an around-the-call observer, and switches
//! for the `X-From-Cache` marker and the ETag-pair diagnostic headers —
//! without changing the core RFC 7234 algorithm.
//!
//! ## Non-goals
//!
//! This crate does not implement shared/proxy caching semantics,
//! HTTP/2 or HTTP/3 frame-level concerns, content negotiation beyond
//! Vary-based key extension, or eviction policy (that's the store's
//! job).

mod body;
mod clock;
mod codec;
mod directives;
mod engine;
mod error;
mod etag;
mod executor;
mod freshness;
mod headers;
mod options;
mod store;
mod vary;

#[cfg(test)]
mod engine_tests;

pub use body::{TeeBody, TeeFinisher};
pub use clock::{Clock, FixedClock, ManualClock, SystemClock};
pub use codec::CachedResponse;
pub use engine::HttpCache;
pub use error::{BadHeader, HttpCacheError, Result};
pub use executor::{BoxError, ExecutorBody, RequestExecutor};
pub use freshness::Freshness;
pub use options::{
    AlwaysUseCachedResponseFn, AroundFn, CacheKeyFn, HttpCacheOptions, ModifyResponseFn, ShouldCacheFn,
};
pub use store::{CacheStore, InMemoryStore};

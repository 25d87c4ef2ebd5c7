//! The engine's configuration surface.
//!
//! There is no external file or environment-variable configuration
//! layer: this is a library, and [`HttpCacheOptions`] built with
//! [`Default`] and overridden field-by-field is the entire "config
//! loader", matching how the reference codebase exposes its own
//! options struct.

use std::{fmt, sync::Arc, time::Duration};

use http::{request, response};

use crate::codec::CachedResponse;

/// Overrides the default cache-key derivation.
pub type CacheKeyFn = Arc<dyn Fn(&request::Parts) -> String + Send + Sync>;

/// Gates whether a response that HTTP rules otherwise allow to be
/// stored is actually stored.
pub type ShouldCacheFn = Arc<dyn Fn(&request::Parts, &response::Parts, &str) -> bool + Send + Sync>;

/// If this returns true and the store holds an entry for the request's
/// key, that entry is served without revalidation or a freshness check.
pub type AlwaysUseCachedResponseFn = Arc<dyn Fn(&request::Parts, &str) -> bool + Send + Sync>;

/// Called before origin-facing work; the returned finisher runs exactly
/// once, after the response body closes or the round trip errors.
pub type AroundFn = Arc<dyn Fn(&request::Parts, &str) -> Box<dyn FnOnce() + Send> + Send + Sync>;

/// Rewrites a response in place before it is serialized for storage.
pub type ModifyResponseFn = Arc<dyn Fn(&mut CachedResponse) + Send + Sync>;

/// Configuration for a single [`crate::engine::HttpCache`] instance.
///
/// Every field is optional; the default configuration implements plain
/// RFC 7234 semantics with no hooks engaged.
#[derive(Clone, Default)]
pub struct HttpCacheOptions {
    /// Overrides the default cache-key derivation.
    pub cache_key: Option<CacheKeyFn>,
    /// Gates storing a response that HTTP rules would otherwise allow.
    pub should_cache: Option<ShouldCacheFn>,
    /// Serves a stored entry unconditionally, bypassing freshness checks.
    pub always_use_cached_response: Option<AlwaysUseCachedResponseFn>,
    /// Observer invoked before origin-facing work and again on body close.
    pub around: Option<AroundFn>,
    /// Rewrites a response before it's serialized for storage.
    pub modify_response: Option<ModifyResponseFn>,
    /// Attaches `X-ETag-1`/`X-ETag-2` to every returned response.
    pub enable_etag_pair: bool,
    /// Attaches `X-From-Cache: 1` to cache-served responses.
    pub mark_cached_responses: bool,
    /// Clamps how long a stored entry may be treated as fresh,
    /// regardless of a longer duration the origin specifies. Useful for
    /// capping unexpectedly long `max-age`/`Expires` values from
    /// third-party origins.
    pub max_ttl: Option<Duration>,
}

impl fmt::Debug for HttpCacheOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpCacheOptions")
            .field("cache_key", &self.cache_key.as_ref().map(|_| "Fn(&request::Parts) -> String"))
            .field("should_cache", &self.should_cache.as_ref().map(|_| "Fn(..) -> bool"))
            .field("always_use_cached_response", &self.always_use_cached_response.as_ref().map(|_| "Fn(..) -> bool"))
            .field("around", &self.around.as_ref().map(|_| "Fn(..) -> finisher"))
            .field("modify_response", &self.modify_response.as_ref().map(|_| "Fn(&mut CachedResponse)"))
            .field("enable_etag_pair", &self.enable_etag_pair)
            .field("mark_cached_responses", &self.mark_cached_responses)
            .field("max_ttl", &self.max_ttl)
            .finish()
    }
}

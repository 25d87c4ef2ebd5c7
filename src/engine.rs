//! The caching transport engine.
//!
//! [`HttpCache::round_trip`] implements the RoundTrip algorithm: compute
//! a cache key, decide whether a stored entry can serve the request
//! unconditionally, revalidate it against the origin, or fall through to
//! a plain origin fetch that stores its response if the rules allow.

use std::{fmt, sync::Arc};

use bytes::Bytes;
use http::{header, request, response, HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use log::{debug, trace, warn};
use url::Url;

use crate::{
    body::{TeeBody, TeeFinisher},
    clock::{Clock, SystemClock},
    codec::CachedResponse,
    directives::Directives,
    error::{BadHeader, HttpCacheError, Result},
    etag,
    executor::{ExecutorBody, RequestExecutor},
    freshness::{self, Freshness},
    headers as header_filter,
    options::HttpCacheOptions,
    store::CacheStore,
    vary,
};

/// Status codes that RFC 7234 allows a cache to store by default.
///
/// Notably excludes 206 (Partial Content): the data model never stores
/// partial bodies.
fn is_cacheable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 200 | 203 | 204 | 300 | 301 | 404 | 405 | 410 | 414 | 501)
}

fn is_cacheable_method(method: &Method) -> bool {
    *method == Method::GET
}

fn determine_scheme(host: &str, headers: &HeaderMap) -> &'static str {
    if let Some(forwarded) = headers.get("x-forwarded-proto").and_then(|v| v.to_str().ok()) {
        if forwarded == "http" {
            return "http";
        }
        return "https";
    }
    if host.starts_with("localhost") || host.starts_with("127.0.0.1") {
        "http"
    } else {
        "https"
    }
}

/// Reconstructs an absolute [`Url`] from request parts, filling in a
/// scheme and authority from the `Host` header when the URI is in
/// origin-form, as is typical for server-side requests.
fn extract_url(parts: &request::Parts) -> Result<Url> {
    if parts.uri.scheme().is_some() {
        return Ok(Url::parse(&parts.uri.to_string())?);
    }
    let host = parts.headers.get(header::HOST).ok_or(BadHeader)?.to_str().map_err(|_| BadHeader)?;
    let scheme = determine_scheme(host, &parts.headers);
    let mut url = Url::parse(&format!("{scheme}://{host}/"))?;
    if let Some(path_and_query) = parts.uri.path_and_query() {
        url.set_path(path_and_query.path());
        url.set_query(path_and_query.query());
    }
    Ok(url)
}

/// The default cache-key derivation: the request-target (scheme,
/// authority, path, query) of a GET request.
fn default_cache_key(parts: &request::Parts) -> Result<String> {
    Ok(extract_url(parts)?.to_string())
}

/// Parses the `stale-if-error` budget from either side's directives.
/// `Some(None)` means a bare (unbounded) grant; `Some(Some(n))` means an
/// `n`-second grant beyond the entry's normal lifetime; `None` means the
/// directive is absent from both sides.
fn stale_if_error_budget(request_cc: &Directives, response_cc: &Directives) -> Option<Option<u64>> {
    if request_cc.contains("stale-if-error") {
        return Some(request_cc.get_secs("stale-if-error"));
    }
    if response_cc.contains("stale-if-error") {
        return Some(response_cc.get_secs("stale-if-error"));
    }
    None
}

fn clamp_headers_to_max_ttl(headers: &mut HeaderMap, max_ttl: std::time::Duration) {
    let cc = Directives::parse(headers);
    if freshness::lifetime(headers, &cc) > max_ttl {
        let value = HeaderValue::from_str(&format!("max-age={}", max_ttl.as_secs()))
            .unwrap_or_else(|_| HeaderValue::from_static("max-age=0"));
        headers.insert(header::CACHE_CONTROL, value);
    }
}

fn build_entry(
    options: &HttpCacheOptions,
    status: StatusCode,
    response_headers: &HeaderMap,
    request_headers: &HeaderMap,
    body: Bytes,
) -> Result<CachedResponse> {
    let mut stored_headers = response_headers.clone();
    if let Some(max_ttl) = options.max_ttl {
        clamp_headers_to_max_ttl(&mut stored_headers, max_ttl);
    }
    vary::project(&mut stored_headers, response_headers, request_headers);
    let mut entry = CachedResponse::new(status, &stored_headers, body);
    if let Some(modify) = &options.modify_response {
        modify(&mut entry);
    }
    Ok(entry)
}

/// A cache-wrapped HTTP transport.
///
/// Generic over the [`CacheStore`] and [`RequestExecutor`] collaborators
/// so callers can plug in their own storage backend and network layer;
/// [`crate::store::InMemoryStore`] and a fake executor are provided for
/// tests and simple in-process use.
pub struct HttpCache<S, E> {
    /// The storage collaborator, shared so a deferred store write can
    /// outlive a single `round_trip` call.
    pub store: Arc<S>,
    /// The request-executor collaborator.
    pub executor: E,
    /// The time source used for all freshness arithmetic.
    pub clock: Arc<dyn Clock>,
    /// Hooks and feature switches.
    pub options: HttpCacheOptions,
}

impl<S, E> fmt::Debug for HttpCache<S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpCache").field("options", &self.options).finish_non_exhaustive()
    }
}

impl<S, E> HttpCache<S, E>
where
    S: CacheStore,
    E: RequestExecutor,
{
    /// Builds an engine with the real wall clock and default options.
    pub fn new(store: S, executor: E) -> Self {
        Self { store: Arc::new(store), executor, clock: Arc::new(SystemClock), options: HttpCacheOptions::default() }
    }

    /// Builds an engine with an explicit clock, e.g. for deterministic
    /// tests against [`crate::clock::ManualClock`].
    pub fn with_clock(store: S, executor: E, clock: Arc<dyn Clock>) -> Self {
        Self { store: Arc::new(store), executor, clock, options: HttpCacheOptions::default() }
    }

    fn cache_key(&self, parts: &request::Parts) -> Result<String> {
        if let Some(cache_key) = &self.options.cache_key {
            return Ok(cache_key(parts));
        }
        default_cache_key(parts)
    }

    /// Loads the stored entry at `key`, if any. A corrupt blob is treated
    /// as a miss per §7: the bad entry is deleted and logged rather than
    /// failing the whole round trip.
    async fn load_entry(&self, key: &str) -> Result<Option<CachedResponse>> {
        let Some(bytes) = self.store.get(key).await? else { return Ok(None) };
        match CachedResponse::from_bytes(&bytes) {
            Ok(entry) => Ok(Some(entry)),
            Err(err) => {
                warn!("corrupt cache entry for key {key}, treating as a miss: {err}");
                self.store.delete(key).await?;
                Ok(None)
            }
        }
    }

    fn annotate(&self, headers: &mut HeaderMap, served_body: &[u8], stored_etag: Option<&str>, cache_served: bool) {
        if cache_served && self.options.mark_cached_responses {
            headers.insert("x-from-cache", HeaderValue::from_static("1"));
        }
        if self.options.enable_etag_pair {
            let original = stored_etag.map(str::to_string).unwrap_or_else(|| etag::synthesize_etag(served_body));
            let current = etag::synthesize_etag(served_body);
            if let Ok(v) = HeaderValue::from_str(&original) {
                headers.insert("x-etag-1", v);
            }
            if let Ok(v) = HeaderValue::from_str(&current) {
                headers.insert("x-etag-2", v);
            }
        }
        vary::strip(headers);
    }

    fn response_from_entry(&self, entry: &CachedResponse, cache_served: bool) -> Result<Response<ExecutorBody>> {
        let status = entry.status()?;
        let mut headers = entry.headers()?;
        let body = entry.body();
        let stored_etag = headers.get(header::ETAG).and_then(|v| v.to_str().ok()).map(str::to_string);
        self.annotate(&mut headers, &body, stored_etag.as_deref(), cache_served);

        let mut builder = Response::builder().status(status);
        *builder.headers_mut().expect("status was just set successfully") = headers;
        let response = builder
            .body(BodyExt::boxed(BodyExt::map_err(Full::new(body), |never| match never {})))
            .map_err(HttpCacheError::from)?;
        Ok(response)
    }

    fn synthetic_gateway_timeout(&self) -> Response<ExecutorBody> {
        Response::builder()
            .status(StatusCode::GATEWAY_TIMEOUT)
            .body(BodyExt::boxed(BodyExt::map_err(Full::new(Bytes::new()), |never| match never {})))
            .expect("building a static synthetic response never fails")
    }

    /// Whether `entry` is still within a `stale-if-error` grace window
    /// relative to the current clock, per §4.4.2.
    fn within_stale_if_error_window(&self, entry_headers: &HeaderMap, request_cc: &Directives) -> bool {
        let response_cc = Directives::parse(entry_headers);
        let Some(budget) = stale_if_error_budget(request_cc, &response_cc) else { return false };
        let age = freshness::age(entry_headers, self.clock.now());
        let window = match budget {
            Some(extra_secs) => freshness::lifetime(entry_headers, &response_cc) + std::time::Duration::from_secs(extra_secs),
            None => std::time::Duration::MAX,
        };
        age <= window
    }

    fn install_conditional_headers(&self, headers: &mut HeaderMap, entry: &CachedResponse) -> Result<()> {
        let stored_headers = entry.headers()?;
        if let Some(etag) = stored_headers.get(header::ETAG) {
            headers.insert(header::IF_NONE_MATCH, etag.clone());
        }
        if let Some(last_modified) = stored_headers.get(header::LAST_MODIFIED) {
            headers.insert(header::IF_MODIFIED_SINCE, last_modified.clone());
        }
        Ok(())
    }

    /// Performs a single cached round trip.
    pub async fn round_trip(&self, request: Request<Bytes>) -> Result<Response<ExecutorBody>> {
        let (parts, body) = request.into_parts();
        let key = self.cache_key(&parts)?;
        let finisher = self.options.around.as_ref().map(|around| around(&parts, &key));
        let result = self.round_trip_inner(parts, body, &key).await;
        if let Some(finisher) = finisher {
            finisher();
        }
        result
    }

    async fn round_trip_inner(&self, parts: request::Parts, body: Bytes, key: &str) -> Result<Response<ExecutorBody>> {
        if !is_cacheable_method(&parts.method) {
            trace!("method {} is not cacheable, bypassing store for key {key}", parts.method);
            let request = Request::from_parts(parts, body);
            return self.executor.round_trip(request).await;
        }

        let entry = self.load_entry(key).await?;
        let request_cc = Directives::parse(&parts.headers);

        if let Some(entry) = &entry {
            if let Some(always_use) = &self.options.always_use_cached_response {
                if always_use(&parts, key) {
                    debug!("serving key {key} unconditionally via always-use-cached-response hook");
                    let response = self.response_from_entry(entry, true)?;
                    if let Some(should_cache) = &self.options.should_cache {
                        let response_parts = Response::new(()).into_parts().0;
                        if !should_cache(&parts, &response_parts, key) {
                            self.store.delete(key).await?;
                        }
                    }
                    return Ok(response);
                }
            }

            let entry_headers = entry.headers()?;
            let vary_matches = !vary::is_never_serveable(&entry_headers) && vary::matches(&entry_headers, &parts.headers);

            if vary_matches {
                match freshness::evaluate(&entry_headers, &parts.headers, self.clock.as_ref()) {
                    Freshness::Fresh => {
                        debug!("cache hit (fresh) for key {key}");
                        return self.response_from_entry(entry, true);
                    }
                    Freshness::Stale if request_cc.contains("only-if-cached") => {
                        debug!("serving stale entry for key {key} under only-if-cached");
                        return self.response_from_entry(entry, true);
                    }
                    _ => {}
                }
            }
        } else if request_cc.contains("only-if-cached") {
            debug!("only-if-cached miss for key {key}, synthesizing 504");
            return Ok(self.synthetic_gateway_timeout());
        }

        let mut origin_headers = parts.headers.clone();
        if let Some(entry) = &entry {
            self.install_conditional_headers(&mut origin_headers, entry)?;
        }
        let mut origin_parts = parts.clone();
        origin_parts.headers = origin_headers;
        let origin_request = Request::from_parts(origin_parts, body);

        match self.executor.round_trip(origin_request).await {
            Ok(response) => self.handle_origin_response(&parts, key, entry, response).await,
            Err(err) => {
                warn!("origin request failed for key {key}: {err}");
                if err.is_transport_failure() {
                    if let Some(entry) = &entry {
                        let entry_headers = entry.headers()?;
                        if self.within_stale_if_error_window(&entry_headers, &request_cc) {
                            debug!("serving stale entry for key {key} under stale-if-error after transport failure");
                            return self.response_from_entry(entry, true);
                        }
                    }
                }
                Err(err)
            }
        }
    }

    async fn handle_origin_response(
        &self,
        request_parts: &request::Parts,
        key: &str,
        entry: Option<CachedResponse>,
        response: Response<ExecutorBody>,
    ) -> Result<Response<ExecutorBody>> {
        let (response_parts, origin_body) = response.into_parts();

        if response_parts.status == StatusCode::NOT_MODIFIED {
            let Some(mut entry) = entry else {
                return Ok(Response::from_parts(response_parts, origin_body));
            };
            let mut stored_headers = entry.headers()?;
            header_filter::merge_end_to_end(&mut stored_headers, &response_parts.headers);
            entry.set_headers(&stored_headers);
            self.store.set(key.to_string(), entry.to_bytes()?).await?;
            debug!("revalidated key {key} via 304, status preserved");
            return self.response_from_entry(&entry, true);
        }

        let request_cc = Directives::parse(&request_parts.headers);
        let response_cc = Directives::parse(&response_parts.headers);
        let no_store = request_cc.contains("no-store") || response_cc.contains("no-store");

        if no_store {
            self.store.delete(key).await?;
            trace!("no-store directive present, deleted any entry for key {key}");
            return Ok(Response::from_parts(response_parts, origin_body));
        }

        if response_parts.status.is_server_error() {
            if let Some(entry) = &entry {
                let entry_headers = entry.headers()?;
                if self.within_stale_if_error_window(&entry_headers, &request_cc) {
                    debug!(
                        "serving stale entry for key {key} under stale-if-error after {} response",
                        response_parts.status
                    );
                    return self.response_from_entry(entry, true);
                }
            }
        }

        let should_store = is_cacheable_status(response_parts.status)
            && self.options.should_cache.as_ref().is_none_or(|should_cache| should_cache(request_parts, &response_parts, key));

        if !should_store {
            self.store.delete(key).await?;
            return Ok(Response::from_parts(response_parts, origin_body));
        }

        if self.options.enable_etag_pair {
            return self.store_with_etag_pair(request_parts, key, response_parts, origin_body).await;
        }

        let store = Arc::clone(&self.store);
        let options = self.options.clone();
        let key = key.to_string();
        let status = response_parts.status;
        let headers = response_parts.headers.clone();
        let request_headers = request_parts.headers.clone();

        let finisher: TeeFinisher = Box::new(move |body: Bytes| {
            Box::pin(async move {
                let entry = match build_entry(&options, status, &headers, &request_headers, body) {
                    Ok(entry) => entry,
                    Err(err) => {
                        warn!("failed to build cache entry for key {key}: {err}");
                        return;
                    }
                };
                let bytes = match entry.to_bytes() {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        warn!("failed to encode cache entry for key {key}: {err}");
                        return;
                    }
                };
                if let Err(err) = store.set(key.clone(), bytes).await {
                    warn!("failed to persist cache entry for key {key}: {err}");
                }
            })
        });

        let tee = TeeBody::new(origin_body, finisher);
        Ok(Response::from_parts(response_parts, BodyExt::boxed(tee)))
    }

    /// Stores a response that is about to establish a cache entry's
    /// baseline, while also attaching the ETag-pair diagnostic headers
    /// (§4.4.1) to the response the caller sees. Computing `X-ETag-2`
    /// requires the full body up front, so this path reads the origin
    /// body eagerly instead of tee-ing it — only taken when
    /// `enable_etag_pair` is set, since the plain store-bound path keeps
    /// streaming by default.
    async fn store_with_etag_pair(
        &self,
        request_parts: &request::Parts,
        key: &str,
        mut response_parts: response::Parts,
        origin_body: ExecutorBody,
    ) -> Result<Response<ExecutorBody>> {
        let body = BodyExt::collect(origin_body).await.map_err(HttpCacheError::Executor)?.to_bytes();
        let stored_etag = response_parts.headers.get(header::ETAG).and_then(|v| v.to_str().ok()).map(str::to_string);

        match build_entry(&self.options, response_parts.status, &response_parts.headers, &request_parts.headers, body.clone()) {
            Ok(entry) => match entry.to_bytes() {
                Ok(bytes) => {
                    if let Err(err) = self.store.set(key.to_string(), bytes).await {
                        warn!("failed to persist cache entry for key {key}: {err}");
                    }
                }
                Err(err) => warn!("failed to encode cache entry for key {key}: {err}"),
            },
            Err(err) => warn!("failed to build cache entry for key {key}: {err}"),
        }

        self.annotate(&mut response_parts.headers, &body, stored_etag.as_deref(), false);
        let body = BodyExt::boxed(BodyExt::map_err(Full::new(body), |never| match never {}));
        Ok(Response::from_parts(response_parts, body))
    }
}

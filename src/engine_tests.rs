//! End-to-end scenarios against [`HttpCache`], driven through its public
//! API with a scripted executor and a manual clock so results never
//! depend on wall time.

use std::{sync::Arc, time::SystemTime};

use bytes::Bytes;
use http::{Request, Response, StatusCode};

use crate::{
    clock::ManualClock,
    executor::test_support::{boxed_body, ScriptedExecutor},
    options::HttpCacheOptions,
    store::{CacheStore, InMemoryStore},
    HttpCache,
};

fn epoch() -> SystemTime {
    SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000)
}

fn get(uri: &str) -> Request<Bytes> {
    Request::builder().method("GET").uri(uri).body(Bytes::new()).unwrap()
}

fn cacheable_response(body: &'static [u8], max_age: u64, date: SystemTime) -> Response<crate::ExecutorBody> {
    Response::builder()
        .status(StatusCode::OK)
        .header("cache-control", format!("max-age={max_age}"))
        .header("date", httpdate::fmt_http_date(date))
        .body(boxed_body(Bytes::from_static(body)))
        .unwrap()
}

async fn drain(response: Response<crate::ExecutorBody>) -> (StatusCode, http::HeaderMap, Bytes) {
    use http_body_util::BodyExt;
    let (parts, body) = response.into_parts();
    let collected = body.collect().await.unwrap().to_bytes();
    (parts.status, parts.headers, collected)
}

/// A fresh response is served without contacting the executor on the
/// second request for the same key.
#[tokio::test]
async fn fresh_entry_is_served_without_a_second_origin_call() {
    let clock = Arc::new(ManualClock::new(epoch()));
    let executor = ScriptedExecutor::new(vec![Ok(cacheable_response(b"one", 3600, epoch()))]);
    let cache = HttpCache::with_clock(InMemoryStore::new(), executor, clock.clone());

    let first = cache.round_trip(get("https://example.com/a")).await.unwrap();
    let (_, _, body) = drain(first).await;
    assert_eq!(body, Bytes::from_static(b"one"));

    clock.advance(10);
    let second = cache.round_trip(get("https://example.com/a")).await.unwrap();
    let (status, headers, body) = drain(second).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Bytes::from_static(b"one"));
    assert_eq!(cache.executor.call_count(), 1);
    assert!(!headers.contains_key("x-from-cache"));
}

/// With `mark_cached_responses` enabled, a cache-served response carries
/// the `X-From-Cache` marker.
#[tokio::test]
async fn mark_cached_responses_annotates_cache_hits() {
    let clock = Arc::new(ManualClock::new(epoch()));
    let executor = ScriptedExecutor::new(vec![Ok(cacheable_response(b"one", 3600, epoch()))]);
    let mut cache = HttpCache::with_clock(InMemoryStore::new(), executor, clock.clone());
    cache.options = HttpCacheOptions { mark_cached_responses: true, ..Default::default() };

    drain(cache.round_trip(get("https://example.com/a")).await.unwrap()).await;
    clock.advance(1);

    let second = cache.round_trip(get("https://example.com/a")).await.unwrap();
    let (_, headers, _) = drain(second).await;
    assert_eq!(headers.get("x-from-cache").unwrap(), "1");
}

/// A stale entry triggers revalidation; a 304 merges the origin's fresh
/// headers onto the stored entry and re-serves the stored body.
#[tokio::test]
async fn stale_entry_revalidates_via_304_and_preserves_stored_body() {
    let clock = Arc::new(ManualClock::new(epoch()));
    let not_modified = Response::builder()
        .status(StatusCode::NOT_MODIFIED)
        .header("cache-control", "max-age=3600")
        .header("date", httpdate::fmt_http_date(epoch() + std::time::Duration::from_secs(3601)))
        .body(boxed_body(Bytes::new()))
        .unwrap();
    let original = Response::builder()
        .status(StatusCode::OK)
        .header("cache-control", "max-age=10")
        .header("date", httpdate::fmt_http_date(epoch()))
        .header("last-modified", httpdate::fmt_http_date(epoch() - std::time::Duration::from_secs(3600)))
        .body(boxed_body(Bytes::from_static(b"original")))
        .unwrap();
    let executor = ScriptedExecutor::new(vec![Ok(original), Ok(not_modified)]);
    let cache = HttpCache::with_clock(InMemoryStore::new(), executor, clock.clone());

    drain(cache.round_trip(get("https://example.com/a")).await.unwrap()).await;

    clock.advance(3601);
    let revalidated = cache.round_trip(get("https://example.com/a")).await.unwrap();
    let (status, headers, body) = drain(revalidated).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Bytes::from_static(b"original"));
    assert_eq!(headers.get("cache-control").unwrap(), "max-age=3600");
    assert_eq!(cache.executor.call_count(), 2);

    let conditional_request = cache.executor.requests.lock().unwrap();
    assert!(conditional_request.last().unwrap().headers().contains_key("if-modified-since"));
}

/// `only-if-cached` on a key with no stored entry synthesizes a 504
/// without ever invoking the executor.
#[tokio::test]
async fn only_if_cached_miss_synthesizes_gateway_timeout() {
    let clock = Arc::new(ManualClock::new(epoch()));
    let executor = ScriptedExecutor::new(vec![]);
    let cache = HttpCache::with_clock(InMemoryStore::new(), executor, clock);

    let request = Request::builder()
        .method("GET")
        .uri("https://example.com/a")
        .header("cache-control", "only-if-cached")
        .body(Bytes::new())
        .unwrap();
    let response = cache.round_trip(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(cache.executor.call_count(), 0);
}

/// When the origin call fails and the stored entry carries
/// `stale-if-error`, the stale entry is served instead of the error.
#[tokio::test]
async fn transport_failure_falls_back_to_stale_entry_within_budget() {
    let clock = Arc::new(ManualClock::new(epoch()));
    let fresh = Response::builder()
        .status(StatusCode::OK)
        .header("cache-control", "max-age=10, stale-if-error=300")
        .header("date", httpdate::fmt_http_date(epoch()))
        .body(boxed_body(Bytes::from_static(b"stale body")))
        .unwrap();
    let executor = ScriptedExecutor::new(vec![
        Ok(fresh),
        Err(crate::HttpCacheError::executor(std::io::Error::other("connection reset"))),
    ]);
    let cache = HttpCache::with_clock(InMemoryStore::new(), executor, clock.clone());

    drain(cache.round_trip(get("https://example.com/a")).await.unwrap()).await;

    // Past max-age but still inside the stale-if-error grant.
    clock.advance(60);
    let response = cache.round_trip(get("https://example.com/a")).await.unwrap();
    let (status, _, body) = drain(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Bytes::from_static(b"stale body"));
}

/// Once the stale-if-error window has elapsed, the transport failure
/// propagates instead of being masked.
#[tokio::test]
async fn transport_failure_propagates_once_stale_if_error_window_elapses() {
    let clock = Arc::new(ManualClock::new(epoch()));
    let fresh = Response::builder()
        .status(StatusCode::OK)
        .header("cache-control", "max-age=10, stale-if-error=20")
        .header("date", httpdate::fmt_http_date(epoch()))
        .body(boxed_body(Bytes::from_static(b"stale body")))
        .unwrap();
    let executor = ScriptedExecutor::new(vec![
        Ok(fresh),
        Err(crate::HttpCacheError::executor(std::io::Error::other("connection reset"))),
    ]);
    let cache = HttpCache::with_clock(InMemoryStore::new(), executor, clock.clone());

    drain(cache.round_trip(get("https://example.com/a")).await.unwrap()).await;

    // max-age=10 + stale-if-error=20 == 30s budget; 31s blows through it.
    clock.advance(31);
    let result = cache.round_trip(get("https://example.com/a")).await;
    assert!(result.is_err());
}

/// A successful-but-5xx origin response also falls back to a stale entry
/// when `stale-if-error` still has budget.
#[tokio::test]
async fn server_error_response_falls_back_to_stale_entry_within_budget() {
    let clock = Arc::new(ManualClock::new(epoch()));
    let fresh = Response::builder()
        .status(StatusCode::OK)
        .header("cache-control", "max-age=10, stale-if-error=300")
        .header("date", httpdate::fmt_http_date(epoch()))
        .body(boxed_body(Bytes::from_static(b"stale body")))
        .unwrap();
    let bad_gateway =
        Response::builder().status(StatusCode::BAD_GATEWAY).body(boxed_body(Bytes::new())).unwrap();
    let executor = ScriptedExecutor::new(vec![Ok(fresh), Ok(bad_gateway)]);
    let cache = HttpCache::with_clock(InMemoryStore::new(), executor, clock.clone());

    drain(cache.round_trip(get("https://example.com/a")).await.unwrap()).await;

    clock.advance(60);
    let response = cache.round_trip(get("https://example.com/a")).await.unwrap();
    let (status, _, body) = drain(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Bytes::from_static(b"stale body"));
}

/// `no-store` on the response prevents storage and deletes any existing
/// entry for the key.
#[tokio::test]
async fn no_store_response_deletes_existing_entry() {
    let clock = Arc::new(ManualClock::new(epoch()));
    let first = cacheable_response(b"cached", 3600, epoch());
    let no_store = Response::builder()
        .status(StatusCode::OK)
        .header("cache-control", "no-store")
        .body(boxed_body(Bytes::from_static(b"fresh")))
        .unwrap();
    let executor = ScriptedExecutor::new(vec![Ok(first), Ok(no_store)]);
    let cache = HttpCache::with_clock(InMemoryStore::new(), executor, clock.clone());

    drain(cache.round_trip(get("https://example.com/a")).await.unwrap()).await;
    assert_eq!(cache.store.size().await.unwrap(), 1);

    clock.advance(3601);
    drain(cache.round_trip(get("https://example.com/a")).await.unwrap()).await;
    assert_eq!(cache.store.size().await.unwrap(), 0);
}

/// Requests whose Vary-named header differs from the one the entry was
/// stored under cause a miss, not a served stale/fresh entry.
#[tokio::test]
async fn vary_mismatch_forces_a_fresh_origin_call() {
    let clock = Arc::new(ManualClock::new(epoch()));
    let varied = |body: &'static [u8]| {
        Response::builder()
            .status(StatusCode::OK)
            .header("cache-control", "max-age=3600")
            .header("date", httpdate::fmt_http_date(epoch()))
            .header("vary", "accept-encoding")
            .body(boxed_body(Bytes::from_static(body)))
            .unwrap()
    };
    let executor = ScriptedExecutor::new(vec![Ok(varied(b"gzip-body")), Ok(varied(b"identity-body"))]);
    let cache = HttpCache::with_clock(InMemoryStore::new(), executor, clock.clone());

    let gzip_request = Request::builder()
        .method("GET")
        .uri("https://example.com/a")
        .header("accept-encoding", "gzip")
        .body(Bytes::new())
        .unwrap();
    drain(cache.round_trip(gzip_request).await.unwrap()).await;

    let identity_request = Request::builder()
        .method("GET")
        .uri("https://example.com/a")
        .header("accept-encoding", "identity")
        .body(Bytes::new())
        .unwrap();
    let response = cache.round_trip(identity_request).await.unwrap();
    let (_, _, body) = drain(response).await;
    assert_eq!(body, Bytes::from_static(b"identity-body"));
    assert_eq!(cache.executor.call_count(), 2);
}

/// A non-GET request always bypasses the store entirely.
#[tokio::test]
async fn non_get_requests_bypass_the_store() {
    let clock = Arc::new(ManualClock::new(epoch()));
    let response = Response::builder().status(StatusCode::OK).body(boxed_body(Bytes::from_static(b"posted"))).unwrap();
    let executor = ScriptedExecutor::new(vec![Ok(response)]);
    let cache = HttpCache::with_clock(InMemoryStore::new(), executor, clock);

    let request = Request::builder().method("POST").uri("https://example.com/a").body(Bytes::new()).unwrap();
    drain(cache.round_trip(request).await.unwrap()).await;
    assert_eq!(cache.store.size().await.unwrap(), 0);
}

/// 206 Partial Content is never stored; a later non-range GET for the
/// same key is a plain miss that stores normally.
#[tokio::test]
async fn partial_content_is_never_stored() {
    let clock = Arc::new(ManualClock::new(epoch()));
    let partial = Response::builder()
        .status(StatusCode::PARTIAL_CONTENT)
        .header("content-range", "bytes 4-9/18")
        .body(boxed_body(Bytes::from_static(b" text ")))
        .unwrap();
    let full = cacheable_response(b"Some text content", 3600, epoch());
    let executor = ScriptedExecutor::new(vec![Ok(partial), Ok(full)]);
    let cache = HttpCache::with_clock(InMemoryStore::new(), executor, clock.clone());

    let range_request = Request::builder()
        .method("GET")
        .uri("https://example.com/range")
        .header("range", "bytes=4-9")
        .body(Bytes::new())
        .unwrap();
    let (status, _, body) = drain(cache.round_trip(range_request).await.unwrap()).await;
    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(body, Bytes::from_static(b" text "));
    assert_eq!(cache.store.size().await.unwrap(), 0);

    let (status, _, body) = drain(cache.round_trip(get("https://example.com/range")).await.unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Bytes::from_static(b"Some text content"));
    assert_eq!(cache.store.size().await.unwrap(), 1);

    clock.advance(1);
    let (status, headers, body) = drain(cache.round_trip(get("https://example.com/range")).await.unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Bytes::from_static(b"Some text content"));
    assert!(!headers.contains_key("x-from-cache"));
    assert_eq!(cache.executor.call_count(), 2);
}

/// A stored ETag is replayed as `If-None-Match`; a 304 response is
/// merged onto the stored entry and re-served.
#[tokio::test]
async fn etag_validator_is_replayed_as_if_none_match() {
    let clock = Arc::new(ManualClock::new(epoch()));
    let original = Response::builder()
        .status(StatusCode::OK)
        .header("etag", "124567")
        .header("date", httpdate::fmt_http_date(epoch()))
        .body(boxed_body(Bytes::from_static(b"etag body")))
        .unwrap();
    let not_modified = Response::builder().status(StatusCode::NOT_MODIFIED).body(boxed_body(Bytes::new())).unwrap();
    let executor = ScriptedExecutor::new(vec![Ok(original), Ok(not_modified)]);
    let mut cache = HttpCache::with_clock(InMemoryStore::new(), executor, clock.clone());
    cache.options = HttpCacheOptions { mark_cached_responses: true, ..Default::default() };

    drain(cache.round_trip(get("https://example.com/etag")).await.unwrap()).await;

    let second = cache.round_trip(get("https://example.com/etag")).await.unwrap();
    let sent = cache.executor.requests.lock().unwrap().last().unwrap().headers().get("if-none-match").cloned();
    assert_eq!(sent.unwrap(), "124567");
    let (status, headers, body) = drain(second).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Bytes::from_static(b"etag body"));
    assert_eq!(headers.get("x-from-cache").unwrap(), "1");
}

/// A cached 404-with-ETag that validates via 304 still reports 404, not
/// the implicit 200 of the 304 response itself.
#[tokio::test]
async fn revalidation_preserves_a_cached_error_status() {
    let clock = Arc::new(ManualClock::new(epoch()));
    let not_found = Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("etag", "\"abc\"")
        .header("date", httpdate::fmt_http_date(epoch()))
        .body(boxed_body(Bytes::from_static(b"Not found")))
        .unwrap();
    let not_modified = Response::builder().status(StatusCode::NOT_MODIFIED).body(boxed_body(Bytes::new())).unwrap();
    let executor = ScriptedExecutor::new(vec![Ok(not_found), Ok(not_modified)]);
    let cache = HttpCache::with_clock(InMemoryStore::new(), executor, clock.clone());

    drain(cache.round_trip(get("https://example.com/cachederror")).await.unwrap()).await;

    let second = cache.round_trip(get("https://example.com/cachederror")).await.unwrap();
    let (status, _, body) = drain(second).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, Bytes::from_static(b"Not found"));
}

/// A corrupted stored blob is treated as a miss: the engine falls
/// through to the origin and deletes the unreadable entry rather than
/// failing the round trip.
#[tokio::test]
async fn corrupt_stored_entry_is_treated_as_a_miss() {
    let clock = Arc::new(ManualClock::new(epoch()));
    let store = InMemoryStore::new();
    store.set("k".to_string(), vec![0xff, 0x00, 0xff]).await.unwrap();
    let executor = ScriptedExecutor::new(vec![Ok(cacheable_response(b"fresh from origin", 3600, epoch()))]);
    let mut cache = HttpCache::with_clock(store, executor, clock);
    cache.options = HttpCacheOptions { cache_key: Some(Arc::new(|_parts| "k".to_string())), ..Default::default() };

    let response = cache.round_trip(get("https://example.com/a")).await.unwrap();
    let (status, headers, body) = drain(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Bytes::from_static(b"fresh from origin"));
    assert!(!headers.contains_key("x-from-cache"));
    assert_eq!(cache.executor.call_count(), 1);
}

/// With `enable_etag_pair` turned on, even the very first (cache-miss)
/// response carries both diagnostic ETag headers, since the engine
/// eagerly buffers the origin body to compute `X-ETag-2` rather than
/// only annotating cache-served responses.
#[tokio::test]
async fn enable_etag_pair_annotates_the_first_origin_fetch() {
    let clock = Arc::new(ManualClock::new(epoch()));
    let executor = ScriptedExecutor::new(vec![Ok(cacheable_response(b"fresh body", 3600, epoch()))]);
    let mut cache = HttpCache::with_clock(InMemoryStore::new(), executor, clock.clone());
    cache.options = HttpCacheOptions { enable_etag_pair: true, ..Default::default() };

    let response = cache.round_trip(get("https://example.com/a")).await.unwrap();
    let (_, headers, body) = drain(response).await;
    assert_eq!(body, Bytes::from_static(b"fresh body"));
    let etag_1 = headers.get("x-etag-1").expect("x-etag-1 missing on first fetch").clone();
    let etag_2 = headers.get("x-etag-2").expect("x-etag-2 missing on first fetch").clone();
    assert_eq!(etag_1, etag_2);

    clock.advance(3601);
    let second = cache.round_trip(get("https://example.com/a")).await.unwrap();
    let (_, headers, _) = drain(second).await;
    assert_eq!(headers.get("x-etag-1").unwrap(), &etag_1);
    assert_eq!(headers.get("x-etag-2").unwrap(), &etag_2);
    assert_eq!(cache.executor.call_count(), 1);
}

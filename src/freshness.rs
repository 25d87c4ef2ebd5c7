//! RFC 7234 freshness calculation.
//!
//! Given a stored response's headers, the incoming request's headers,
//! and a [`Clock`], decides whether the entry may be served without
//! contacting the origin (`Fresh`), must be revalidated (`Stale`), or
//! whether the request itself forbids cache use entirely
//! (`Transparent`).
//!
//! The clock is always injected; nothing in this module reads process
//! time directly, which is what makes the boundary properties in the
//! crate's test suite deterministic.

use std::time::{Duration, SystemTime};

use http::HeaderMap;

use crate::{clock::Clock, directives::Directives};

/// The outcome of evaluating a stored entry against an incoming request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// The entry may be served without revalidation.
    Fresh,
    /// The entry requires revalidation (or may be served under
    /// `only-if-cached`/`max-stale`/stale-if-error relaxations).
    Stale,
    /// The request forbids cache use; treat this as a miss and always
    /// go to the origin.
    Transparent,
}

fn pragma_no_cache(request_headers: &HeaderMap) -> bool {
    request_headers
        .get(http::header::PRAGMA)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().contains("no-cache"))
}

fn parse_http_date(headers: &HeaderMap, name: http::HeaderName) -> Option<SystemTime> {
    headers.get(name).and_then(|v| v.to_str().ok()).and_then(|s| httpdate::parse_http_date(s).ok())
}

/// Computes the age of a stored response: wall time elapsed since its
/// `Date` header. Falls back to zero if the header is absent or
/// unparseable, per §4.3.
#[must_use]
pub fn age(response_headers: &HeaderMap, now: SystemTime) -> Duration {
    parse_http_date(response_headers, http::header::DATE)
        .and_then(|date| now.duration_since(date).ok())
        .unwrap_or(Duration::ZERO)
}

/// Computes the response's declared lifetime: `max-age` if present,
/// else `Expires - Date`, else zero.
#[must_use]
pub fn lifetime(response_headers: &HeaderMap, res_cc: &Directives) -> Duration {
    if let Some(max_age) = res_cc.get_secs("max-age") {
        return Duration::from_secs(max_age);
    }
    let date = parse_http_date(response_headers, http::header::DATE);
    let expires = parse_http_date(response_headers, http::header::EXPIRES);
    match (date, expires) {
        (Some(date), Some(expires)) => expires.duration_since(date).unwrap_or(Duration::ZERO),
        _ => Duration::ZERO,
    }
}

/// Evaluates freshness per §4.3 of the caching design.
#[must_use]
pub fn evaluate(
    response_headers: &HeaderMap,
    request_headers: &HeaderMap,
    clock: &dyn Clock,
) -> Freshness {
    let req_cc = Directives::parse(request_headers);
    let res_cc = Directives::parse(response_headers);

    if req_cc.contains("no-cache") || pragma_no_cache(request_headers) {
        return Freshness::Transparent;
    }

    if res_cc.contains("no-cache")
        || res_cc.contains("must-revalidate")
        || req_cc.contains("must-revalidate")
        || req_cc.get_secs("max-age") == Some(0)
    {
        return Freshness::Stale;
    }

    let now = clock.now();
    let age = age(response_headers, now);
    let mut effective_lifetime = lifetime(response_headers, &res_cc);

    if let Some(request_max_age) = req_cc.get_secs("max-age") {
        effective_lifetime = effective_lifetime.min(Duration::from_secs(request_max_age));
    }

    let fresh = if let Some(min_fresh) = req_cc.get_secs("min-fresh") {
        age + Duration::from_secs(min_fresh) < effective_lifetime
    } else if req_cc.contains("max-stale") {
        match req_cc.get_secs("max-stale") {
            Some(max_stale) => age <= effective_lifetime + Duration::from_secs(max_stale),
            None => true,
        }
    } else {
        age < effective_lifetime
    };

    if fresh {
        Freshness::Fresh
    } else {
        Freshness::Stale
    }
}

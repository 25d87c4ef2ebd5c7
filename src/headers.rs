//! End-to-end header filtering.
//!
//! A 304 response's headers must only overwrite the hop-by-hop-free
//! subset of the stored entry's headers. This module computes that
//! subset: the fixed hop-by-hop set from RFC 7230 §6.1, plus whatever
//! the message's own `Connection` header nominates.

use std::collections::HashSet;

use http::{header::HeaderName, HeaderMap};

/// Headers that are always hop-by-hop and never forwarded end-to-end.
pub const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// Returns the lowercase names of headers in `headers` that are
/// end-to-end: not in the fixed hop-by-hop set, and not nominated by the
/// message's own `Connection` header.
#[must_use]
pub fn end_to_end_header_names(headers: &HeaderMap) -> HashSet<String> {
    let mut excluded: HashSet<String> =
        HOP_BY_HOP.iter().map(|s| (*s).to_string()).collect();

    for value in headers.get_all(http::header::CONNECTION) {
        if let Ok(s) = value.to_str() {
            for token in s.split(',') {
                excluded.insert(token.trim().to_ascii_lowercase());
            }
        }
    }

    headers
        .keys()
        .map(|name| name.as_str().to_ascii_lowercase())
        .filter(|name| !excluded.contains(name))
        .collect()
}

/// Merges the end-to-end headers of `fresh` onto `stored`, leaving
/// `stored`'s hop-by-hop headers (and any header not present in `fresh`)
/// untouched. Used when a 304 response validates a stored entry.
pub fn merge_end_to_end(stored: &mut HeaderMap, fresh: &HeaderMap) {
    let end_to_end = end_to_end_header_names(fresh);
    for name in end_to_end {
        let Ok(header_name) = name.parse::<HeaderName>() else { continue };
        stored.remove(&header_name);
        for value in fresh.get_all(&header_name) {
            stored.append(header_name.clone(), value.clone());
        }
    }
}

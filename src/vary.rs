//! Vary-key projection.
//!
//! RFC 7234 §4.1 requires a cached response to only be served to a later
//! request whose `Vary`-listed headers match the request that originally
//! produced the entry. Since the store only has the response at hand
//! when deciding whether a later request matches, the originating
//! request's relevant header values are projected into the stored entry
//! itself as `X-Varied-<name>` headers (see §4.6).

use http::{HeaderMap, HeaderName, HeaderValue};

const VARIED_PREFIX: &str = "x-varied-";

fn vary_names(vary_header: &HeaderMap) -> Vec<String> {
    let mut names = Vec::new();
    for value in vary_header.get_all(http::header::VARY) {
        let Ok(s) = value.to_str() else { continue };
        for token in s.split(',') {
            let token = token.trim().to_ascii_lowercase();
            if !token.is_empty() {
                names.push(token);
            }
        }
    }
    names
}

/// Returns whether a response's `Vary` header contains `*`, which makes
/// the entry permanently non-serveable.
#[must_use]
pub fn is_never_serveable(response_headers: &HeaderMap) -> bool {
    vary_names(response_headers).iter().any(|n| n == "*")
}

/// Joins a (possibly repeated, possibly absent) request header into a
/// single comparable value. An absent header projects to the empty
/// string, which distinguishes "header absent" from any header value
/// containing a comma and lets the comparison in [`matches`] treat
/// "absent both times" as equal.
fn joined_request_value(request_headers: &HeaderMap, name: &HeaderName) -> HeaderValue {
    let mut joined = String::new();
    for (i, value) in request_headers.get_all(name).iter().enumerate() {
        let Ok(s) = value.to_str() else { continue };
        if i > 0 {
            joined.push(',');
        }
        joined.push_str(s);
    }
    HeaderValue::from_str(&joined).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// Projects the originating request's Vary-named header values into
/// `X-Varied-<name>` entries appended to `stored_headers`.
///
/// Called at store time, once the response's (final) `Vary` header is
/// known. Does nothing if the response carries no `Vary` header.
pub fn project(stored_headers: &mut HeaderMap, response_headers: &HeaderMap, request_headers: &HeaderMap) {
    for name in vary_names(response_headers) {
        if name == "*" {
            continue;
        }
        let Ok(request_header_name) = name.parse::<HeaderName>() else { continue };
        let varied_name = format!("{VARIED_PREFIX}{name}");
        let Ok(varied_header_name) = varied_name.parse::<HeaderName>() else { continue };
        let value = joined_request_value(request_headers, &request_header_name);
        stored_headers.insert(varied_header_name, value);
    }
}

/// Checks whether `request_headers` matches the Vary projection embedded
/// in `stored_headers`. Returns `true` if every `X-Varied-<name>` header
/// on the stored entry is byte-equal to the corresponding header on the
/// new request.
#[must_use]
pub fn matches(stored_headers: &HeaderMap, request_headers: &HeaderMap) -> bool {
    for (name, stored_value) in stored_headers {
        let Some(suffix) = name.as_str().strip_prefix(VARIED_PREFIX) else { continue };
        let Ok(request_header_name) = suffix.parse::<HeaderName>() else { return false };
        let actual = joined_request_value(request_headers, &request_header_name);
        if &actual != stored_value {
            return false;
        }
    }
    true
}

/// Strips the internal `X-Varied-<name>` headers before a stored entry's
/// headers are handed back to a caller.
pub fn strip(headers: &mut HeaderMap) {
    let varied: Vec<HeaderName> = headers
        .keys()
        .filter(|name| name.as_str().starts_with(VARIED_PREFIX))
        .cloned()
        .collect();
    for name in varied {
        headers.remove(&name);
    }
}

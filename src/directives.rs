//! Cache-Control directive parsing.
//!
//! Splits the (possibly repeated) `Cache-Control` header into a map from
//! lowercase directive name to its argument, per RFC 7234 §5.2. Bare
//! directives (`no-cache`, `must-revalidate`, ...) map to an empty string
//! rather than `None`, which keeps callers from juggling two layers of
//! optionality when all they want to know is "is the directive present".

use std::collections::HashMap;

use http::HeaderMap;

/// A parsed set of Cache-Control directives.
///
/// Duplicate directives across repeated/comma-joined `Cache-Control`
/// values resolve last-occurrence-wins. Unknown directives are kept
/// verbatim so callers that care about vendor extensions can still see
/// them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directives(HashMap<String, String>);

impl Directives {
    /// Parses the `Cache-Control` header(s) out of a header map.
    #[must_use]
    pub fn parse(headers: &HeaderMap) -> Self {
        let mut joined = String::new();
        for (i, value) in headers.get_all(http::header::CACHE_CONTROL).iter().enumerate() {
            if let Ok(s) = value.to_str() {
                if i > 0 {
                    joined.push(',');
                }
                joined.push_str(s);
            }
        }
        Self::parse_str(&joined)
    }

    /// Parses a raw Cache-Control header value (already comma-joined if
    /// the header appeared more than once).
    #[must_use]
    pub fn parse_str(raw: &str) -> Self {
        let mut map = HashMap::new();
        for token in raw.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let mut parts = token.splitn(2, '=');
            let name = parts.next().unwrap_or("").trim().to_ascii_lowercase();
            if name.is_empty() {
                continue;
            }
            let arg = parts
                .next()
                .map(|v| v.trim().trim_matches('"').to_string())
                .unwrap_or_default();
            map.insert(name, arg);
        }
        Self(map)
    }

    /// Returns whether a directive (bare or with an argument) is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Returns the raw string argument for a directive, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Returns a directive's argument parsed as a `u64` (e.g. `max-age`).
    #[must_use]
    pub fn get_secs(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(|v| v.parse().ok())
    }
}

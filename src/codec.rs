//! The opaque stored-entry representation and its wire codec.
//!
//! A [`CachedResponse`] is the self-describing blob the store holds:
//! status, the full header multimap, and the complete body. Encoding is
//! implementation-defined (postcard) and stable only within one process;
//! no on-disk version compatibility is promised, per §4.5.

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{HttpCacheError, Result};

/// A single header occurrence, kept as a name/value pair so that
/// multi-value headers and first-occurrence casing both round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct HeaderEntry {
    name: String,
    value: Vec<u8>,
}

/// A stored response: status, header multimap, and body bytes.
///
/// This is the type that crosses the [`crate::store::CacheStore`]
/// boundary as an opaque blob; [`CachedResponse::to_bytes`] and
/// [`CachedResponse::from_bytes`] are the only operations a store
/// implementation needs to round-trip it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse {
    status: u16,
    headers: Vec<HeaderEntry>,
    body: Vec<u8>,
}

impl CachedResponse {
    /// Builds a stored entry from its constituent parts.
    #[must_use]
    pub fn new(status: StatusCode, headers: &HeaderMap, body: Bytes) -> Self {
        let mut entries = Vec::with_capacity(headers.len());
        for (name, value) in headers {
            entries.push(HeaderEntry { name: name.as_str().to_string(), value: value.as_bytes().to_vec() });
        }
        Self { status: status.as_u16(), headers: entries, body: body.to_vec() }
    }

    /// The stored status code.
    #[must_use]
    pub fn status(&self) -> Result<StatusCode> {
        Ok(StatusCode::from_u16(self.status)?)
    }

    /// Reconstructs the stored header multimap, preserving insertion
    /// order and multi-value occurrences.
    pub fn headers(&self) -> Result<HeaderMap> {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for entry in &self.headers {
            let name: HeaderName = entry.name.parse()?;
            let value = HeaderValue::from_bytes(&entry.value)?;
            map.append(name, value);
        }
        Ok(map)
    }

    /// The stored body bytes.
    #[must_use]
    pub fn body(&self) -> Bytes {
        Bytes::from(self.body.clone())
    }

    /// Replaces the header multimap in place, e.g. after a 304 merge.
    pub fn set_headers(&mut self, headers: &HeaderMap) {
        self.headers = headers
            .iter()
            .map(|(name, value)| HeaderEntry { name: name.as_str().to_string(), value: value.as_bytes().to_vec() })
            .collect();
    }

    /// Serializes this entry to the opaque bytes a [`crate::store::CacheStore`] persists.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        postcard::to_allocvec(self).map_err(|e| HttpCacheError::Codec(e.to_string()))
    }

    /// Deserializes an entry previously produced by [`Self::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        postcard::from_bytes(bytes).map_err(|e| HttpCacheError::Codec(e.to_string()))
    }
}

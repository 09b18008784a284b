//! Cached archive responses and chat replies.

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;

use crate::cache::ttl::TtlCache;

/// Response header reporting whether the archive cache answered.
pub const X_CACHE: &str = "x-cache";

/// Archive response cache keyed by the raw upstream query string.
pub type ResponseCache = TtlCache<String, CachedResponse>;

/// Chat reply cache keyed by the exact prompt.
pub type ReplyCache = TtlCache<String, String>;

pub fn response_cache() -> ResponseCache {
    TtlCache::new("archive")
}

pub fn reply_cache() -> ReplyCache {
    TtlCache::new("chat")
}

/// An upstream archive response as it was relayed to the first caller.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    /// Only the allow-listed headers that were relayed.
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CachedResponse {
    /// Replay the stored response, tagged `x-cache: HIT`.
    pub fn to_response(&self) -> Response {
        let mut response = Response::new(Body::from(self.body.clone()));
        *response.status_mut() = self.status;
        let headers = response.headers_mut();
        headers.extend(self.headers.clone());
        headers.insert(X_CACHE, HeaderValue::from_static("HIT"));
        response
    }
}

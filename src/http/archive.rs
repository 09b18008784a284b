//! Archive query proxy: `GET|HEAD /api/exoplanets?<query>`.
//!
//! # Data Flow
//! ```text
//! request → method check → raw query string (cache key)
//!     → ResponseCache hit?  → replay stored response (x-cache: HIT)
//!     → miss → GET <archive base>?<query>
//!            → stream body to client (x-cache: MISS)
//!            → body complete + 2xx → store CachedResponse
//! ```
//!
//! # Design Decisions
//! - Key is the query string exactly as received, never decoded
//! - Only `accept` and `user-agent` reach the archive
//! - Non-2xx answers are relayed but never cached
//! - A failure after headers are sent aborts the connection

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{
        header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE, USER_AGENT},
        HeaderMap, HeaderValue, Method, StatusCode, Uri,
    },
    response::Response,
};
use futures_util::stream::{BoxStream, Stream, StreamExt};

use crate::cache::{CachedResponse, ResponseCache, X_CACHE};
use crate::http::error::ApiError;
use crate::http::request::{header_str, request_id};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::upstream::UpstreamError;

const ROUTE: &str = "archive";

/// Proxy an archive query, serving repeated queries from the cache.
pub async fn proxy_archive(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    inbound: HeaderMap,
) -> Result<Response, ApiError> {
    if method != Method::GET && method != Method::HEAD {
        return Err(ApiError::MethodNotAllowed { allow: "GET, HEAD" });
    }

    let query = match uri.query() {
        Some(q) if !q.is_empty() => q.to_owned(),
        _ => return Err(ApiError::MissingQuery),
    };
    let request_id = request_id(&inbound).to_owned();

    if let Some(cached) = state.archive_cache.get(&query) {
        tracing::debug!(request_id = %request_id, query = %query, "Archive cache hit");
        return Ok(cached.to_response());
    }

    let config = state.config();
    let timeout = config.timeouts.upstream();
    let upstream = state
        .upstream
        .fetch_archive(
            &config.archive.base_url,
            &query,
            header_str(&inbound, ACCEPT),
            header_str(&inbound, USER_AGENT),
            timeout,
        )
        .await
        .map_err(|e| upstream_failure(&request_id, e))?;

    let status = upstream.status();
    let headers = relay_headers(upstream.headers(), &config.archive.default_cache_control);
    let ttl = config.archive.cache_ttl();

    tracing::debug!(
        request_id = %request_id,
        status = %status,
        query = %query,
        "Archive upstream responded"
    );
    if !status.is_success() {
        metrics::record_upstream_error(ROUTE, "status");
    }

    let pending = status.is_success().then(|| PendingEntry {
        cache: state.archive_cache.clone(),
        key: query,
        status,
        headers: headers.clone(),
        ttl,
        buffer: Vec::new(),
    });

    let body = if method == Method::HEAD {
        // No body will be polled for HEAD; read it here so the entry can be stored.
        let bytes = upstream
            .bytes()
            .await
            .map_err(|e| upstream_failure(&request_id, UpstreamError::from_reqwest(e, timeout.as_secs())))?;
        if let Some(mut pending) = pending {
            pending.buffer.extend_from_slice(&bytes);
            pending.commit();
        }
        Body::from(bytes)
    } else {
        Body::from_stream(CacheOnComplete {
            inner: upstream.bytes_stream().boxed(),
            pending,
            request_id,
        })
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    response.headers_mut().extend(headers);
    response
        .headers_mut()
        .insert(X_CACHE, HeaderValue::from_static("MISS"));
    Ok(response)
}

/// Copy the allow-listed upstream headers, synthesizing `cache-control`.
pub fn relay_headers(upstream: &HeaderMap, default_cache_control: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(value) = upstream.get(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, value.clone());
    }
    match upstream.get(CACHE_CONTROL) {
        Some(value) => {
            headers.insert(CACHE_CONTROL, value.clone());
        }
        None => match HeaderValue::from_str(default_cache_control) {
            Ok(value) => {
                headers.insert(CACHE_CONTROL, value);
            }
            Err(e) => tracing::warn!(error = %e, "Configured default cache-control is not a valid header"),
        },
    }
    headers
}

fn upstream_failure(request_id: &str, err: UpstreamError) -> ApiError {
    metrics::record_upstream_error(ROUTE, err.kind());
    match err {
        UpstreamError::InvalidUrl { .. } | UpstreamError::Client(_) => {
            tracing::error!(request_id = %request_id, error = %err, "Archive proxy misconfigured");
            ApiError::Proxy
        }
        UpstreamError::Timeout(_) | UpstreamError::Transport(_) => {
            tracing::error!(request_id = %request_id, error = ?err, "Archive upstream request failed");
            ApiError::UpstreamUnavailable(err.to_string())
        }
    }
}

/// A response waiting for its body to finish before it is cached.
struct PendingEntry {
    cache: ResponseCache,
    key: String,
    status: StatusCode,
    headers: HeaderMap,
    ttl: Duration,
    buffer: Vec<u8>,
}

impl PendingEntry {
    fn commit(self) {
        let entry = CachedResponse {
            status: self.status,
            headers: self.headers,
            body: Bytes::from(self.buffer),
        };
        tracing::debug!(key = %self.key, bytes = entry.body.len(), "Archive response cached");
        self.cache.insert(self.key, entry, self.ttl);
    }
}

/// Passes upstream chunks through while recording them, then stores the
/// completed body. An upstream error drops the recording.
struct CacheOnComplete {
    inner: BoxStream<'static, reqwest::Result<Bytes>>,
    pending: Option<PendingEntry>,
    request_id: String,
}

impl Stream for CacheOnComplete {
    type Item = reqwest::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                if let Some(pending) = this.pending.as_mut() {
                    pending.buffer.extend_from_slice(&chunk);
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.pending = None;
                metrics::record_upstream_error(ROUTE, if e.is_timeout() { "timeout" } else { "transport" });
                tracing::error!(
                    request_id = %this.request_id,
                    error = %e,
                    "Archive upstream failed mid-stream, closing connection"
                );
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                if let Some(pending) = this.pending.take() {
                    pending.commit();
                }
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

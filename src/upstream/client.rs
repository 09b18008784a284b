//! Outbound HTTP client for the archive, prediction and chat services.
//!
//! # Responsibilities
//! - Own the one pooled `reqwest::Client` used for every upstream
//! - Build upstream URLs and forwarded headers
//! - Apply the same deadline to every call, body download included

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use serde_json::Value;
use url::Url;

use crate::upstream::types::{UpstreamError, UpstreamResult};

/// `user-agent` used when the caller sent none.
pub const DEFAULT_USER_AGENT: &str = concat!("exoplanet-proxy/", env!("CARGO_PKG_VERSION"));

/// `accept` used when the caller sent none.
pub const DEFAULT_ACCEPT: &str = "*/*";

/// Shared upstream client. Cloning is cheap and reuses the connection pool.
#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
}

impl UpstreamClient {
    /// Create a client with a pooled connector.
    pub fn new() -> UpstreamResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .build()
            .map_err(UpstreamError::Client)?;
        Ok(Self { http })
    }

    /// Issue `GET <base_url>?<query>` to the archive.
    ///
    /// Only `accept` and `user-agent` are forwarded. The returned response has
    /// not been read yet; the deadline keeps running while its body streams.
    pub async fn fetch_archive(
        &self,
        base_url: &str,
        query: &str,
        accept: Option<&str>,
        user_agent: Option<&str>,
        timeout: Duration,
    ) -> UpstreamResult<reqwest::Response> {
        let url = archive_url(base_url, query)?;

        tracing::debug!(url = %url, "Forwarding archive query");

        self.http
            .get(url)
            .header(ACCEPT, accept.unwrap_or(DEFAULT_ACCEPT))
            .header(USER_AGENT, user_agent.unwrap_or(DEFAULT_USER_AGENT))
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(e, timeout.as_secs()))
    }

    /// `POST` a JSON document, optionally with a bearer token.
    pub async fn post_json(
        &self,
        endpoint: &str,
        body: &Value,
        bearer: Option<&str>,
        timeout: Duration,
    ) -> UpstreamResult<reqwest::Response> {
        let url = Url::parse(endpoint).map_err(|e| UpstreamError::InvalidUrl {
            url: endpoint.to_string(),
            reason: e.to_string(),
        })?;

        let mut request = self.http.post(url).json(body).timeout(timeout);
        if let Some(token) = bearer {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        request
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(e, timeout.as_secs()))
    }
}

/// Append a raw query string to the archive base address.
///
/// Existing percent-escapes are kept. Characters an http(s) query may not
/// carry literally (`'`, `"`, space, `<`, `>`) are percent-encoded, which the
/// archive decodes to the same ADQL.
pub fn archive_url(base_url: &str, query: &str) -> UpstreamResult<Url> {
    let mut url = Url::parse(base_url).map_err(|e| UpstreamError::InvalidUrl {
        url: base_url.to_string(),
        reason: e.to_string(),
    })?;
    url.set_query(Some(query));
    Ok(url)
}

/// Read a response body to text, mapping failures like the send path.
pub async fn read_text(response: reqwest::Response, timeout: Duration) -> UpstreamResult<String> {
    response
        .text()
        .await
        .map_err(|e| UpstreamError::from_reqwest(e, timeout.as_secs()))
}

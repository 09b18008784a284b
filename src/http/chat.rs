//! Chat proxy: `POST /api/gemini`.
//!
//! # Data Flow
//! ```text
//! request → method check → credentials configured? (else 501)
//!     → prompt validation
//!     → ReplyCache hit? → {reply, cached: true}
//!     → POST endpoint (Bearer key, {prompt})
//!     → extract_reply → ReplyCache → {reply}
//! ```

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{HeaderMap, Method},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::http::error::ApiError;
use crate::http::request::request_id;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::upstream::client::read_text;
use crate::upstream::extract_reply;

const ROUTE: &str = "chat";

/// Successful chat response.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ChatReply {
    pub reply: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
}

/// Answer a prompt through the configured completion endpoint.
pub async fn proxy_chat(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    if method != Method::POST {
        return Err(ApiError::MethodNotAllowed { allow: "POST" });
    }
    let request_id = request_id(&headers);

    let config = state.config();
    let Some((api_key, endpoint)) = config.chat.credentials() else {
        tracing::warn!(request_id = %request_id, "Chat proxy called without configured credentials");
        return Err(ApiError::NotConfigured(
            "GEMINI_API_KEY or GEMINI_API_ENDPOINT not configured on server.".into(),
        ));
    };

    let prompt = parse_prompt(&body?)?;

    if let Some(reply) = state.reply_cache.get(&prompt) {
        tracing::debug!(request_id = %request_id, "Chat reply served from cache");
        return Ok(Json(ChatReply {
            reply,
            cached: Some(true),
        }));
    }

    let timeout = config.timeouts.upstream();
    tracing::info!(request_id = %request_id, prompt_chars = prompt.chars().count(), "Forwarding chat prompt");

    let upstream = state
        .upstream
        .post_json(endpoint, &json!({ "prompt": prompt.as_str() }), Some(api_key), timeout)
        .await
        .map_err(|e| {
            metrics::record_upstream_error(ROUTE, e.kind());
            tracing::error!(request_id = %request_id, error = ?e, "Chat proxy error");
            ApiError::Proxy
        })?;

    let status = upstream.status();
    let text = read_text(upstream, timeout).await.map_err(|e| {
        metrics::record_upstream_error(ROUTE, e.kind());
        tracing::error!(request_id = %request_id, error = ?e, "Failed to read chat response");
        ApiError::Proxy
    })?;

    if !status.is_success() {
        metrics::record_upstream_error(ROUTE, "status");
        tracing::error!(request_id = %request_id, status = %status, body = %text, "Chat upstream error");
        return Err(ApiError::UpstreamStatus {
            status: status.as_u16(),
            body: text,
        });
    }

    let data: Value = serde_json::from_str(&text).map_err(|e| {
        tracing::error!(request_id = %request_id, error = %e, "Chat upstream returned invalid JSON");
        ApiError::Proxy
    })?;

    let reply = extract_reply(&data);
    state
        .reply_cache
        .insert(prompt, reply.clone(), config.chat.cache_ttl());

    Ok(Json(ChatReply { reply, cached: None }))
}

/// Extract a non-empty string `prompt` from the request body.
pub fn parse_prompt(body: &[u8]) -> Result<String, ApiError> {
    let value: Value = serde_json::from_slice(body).map_err(|_| ApiError::MissingPrompt)?;
    match value.get("prompt") {
        Some(Value::String(prompt)) if !prompt.is_empty() => Ok(prompt.clone()),
        _ => Err(ApiError::MissingPrompt),
    }
}

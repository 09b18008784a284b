//! Prediction proxy: `POST /api/predict`.
//!
//! Forwards the candidate's feature object to the model endpoint and relays
//! the verdict unchanged. Nothing is cached.

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{header::CONTENT_TYPE, HeaderMap, HeaderValue, Method},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

use crate::http::error::ApiError;
use crate::http::request::request_id;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::upstream::client::read_text;

const ROUTE: &str = "predict";

/// Forward a prediction request.
pub async fn proxy_predict(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    if method != Method::POST {
        return Err(ApiError::MethodNotAllowed { allow: "POST" });
    }
    let request_id = request_id(&headers);
    let features = parse_features(&body?)?;

    let config = state.config();
    let endpoint = config.predict.endpoint.as_str();
    let timeout = config.timeouts.upstream();

    tracing::info!(request_id = %request_id, endpoint = %endpoint, "Forwarding prediction request");
    tracing::debug!(request_id = %request_id, body = %features, "Outgoing prediction body");

    let upstream = state
        .upstream
        .post_json(endpoint, &features, None, timeout)
        .await
        .map_err(|e| {
            metrics::record_upstream_error(ROUTE, e.kind());
            tracing::error!(request_id = %request_id, error = ?e, "Prediction proxy error");
            ApiError::Proxy
        })?;

    let status = upstream.status();
    let content_type = upstream.headers().get(CONTENT_TYPE).cloned();
    let text = read_text(upstream, timeout).await.map_err(|e| {
        metrics::record_upstream_error(ROUTE, e.kind());
        tracing::error!(request_id = %request_id, error = ?e, "Failed to read prediction response");
        ApiError::Proxy
    })?;

    if !status.is_success() {
        metrics::record_upstream_error(ROUTE, "status");
        tracing::error!(request_id = %request_id, status = %status, body = %text, "Prediction upstream error");
        return Err(ApiError::UpstreamStatus {
            status: status.as_u16(),
            body: text,
        });
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(verdict) => Ok(Json(verdict).into_response()),
        Err(_) => {
            tracing::warn!(request_id = %request_id, "Prediction upstream returned non-JSON body, relaying as text");
            let content_type = content_type
                .unwrap_or_else(|| HeaderValue::from_static("text/plain; charset=utf-8"));
            Ok(([(CONTENT_TYPE, content_type)], text).into_response())
        }
    }
}

/// The request body must be a JSON object; an empty body counts as `{}`.
pub fn parse_features(body: &[u8]) -> Result<Value, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err(ApiError::InvalidBody("expected a JSON object".into())),
        Err(e) => Err(ApiError::InvalidBody(e.to_string())),
    }
}

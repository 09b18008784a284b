//! Error envelope returned by every proxy endpoint.

use axum::{
    extract::rejection::BytesRejection,
    http::{header::ALLOW, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Handler-boundary errors. Each variant maps to one status and error kind.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Method outside the endpoint's allow-list.
    #[error("Method not allowed")]
    MethodNotAllowed { allow: &'static str },

    /// Archive request without a query string.
    #[error("A query string is required, e.g. ?query=select+pl_name+from+ps&format=json")]
    MissingQuery,

    /// Prediction body that is not a JSON object.
    #[error("Invalid body: {0}")]
    InvalidBody(String),

    /// Request body over `listener.max_body_bytes`.
    #[error("Request body exceeds the configured limit")]
    PayloadTooLarge,

    /// The whole request outlived `timeouts.request_secs`.
    #[error("Request did not complete within {0} seconds")]
    RequestTimeout(u64),

    /// Chat body without a usable prompt.
    #[error("Missing prompt in request body")]
    MissingPrompt,

    /// A required secret or endpoint is not configured.
    #[error("{0}")]
    NotConfigured(String),

    /// Upstream answered with a non-success status.
    #[error("Upstream returned status {status}")]
    UpstreamStatus { status: u16, body: String },

    /// Upstream could not be reached in time (archive proxy).
    #[error("{0}")]
    UpstreamUnavailable(String),

    /// Any other failure while proxying. Details stay in the server log.
    #[error("Proxy error while contacting upstream service")]
    Proxy,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::MissingQuery | ApiError::InvalidBody(_) | ApiError::MissingPrompt => {
                StatusCode::BAD_REQUEST
            }
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::RequestTimeout(_) => StatusCode::REQUEST_TIMEOUT,
            ApiError::NotConfigured(_) => StatusCode::NOT_IMPLEMENTED,
            ApiError::UpstreamStatus { .. } | ApiError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            ApiError::Proxy => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable error kind written to the `error` field.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::MethodNotAllowed { .. } => "MethodNotAllowed",
            ApiError::MissingQuery => "MissingQuery",
            ApiError::InvalidBody(_) => "InvalidBody",
            ApiError::MissingPrompt => "MissingPrompt",
            ApiError::PayloadTooLarge => "PayloadTooLarge",
            ApiError::RequestTimeout(_) => "RequestTimeout",
            ApiError::NotConfigured(_) => "NotConfigured",
            ApiError::UpstreamStatus { .. } | ApiError::UpstreamUnavailable(_) => "UpstreamError",
            ApiError::Proxy => "ProxyError",
        }
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::InvalidBody(rejection.body_text())
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Upstream status, for upstream errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Raw upstream body, for upstream errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::MethodNotAllowed { .. } => None,
            other => Some(other.to_string()),
        };
        let (upstream_status, upstream_body) = match &self {
            ApiError::UpstreamStatus { status, body } => (Some(*status), Some(body.clone())),
            _ => (None, None),
        };

        let body = ErrorResponse {
            error: self.kind(),
            message,
            status: upstream_status,
            body: upstream_body,
        };

        let mut response = (status, Json(body)).into_response();
        if let ApiError::MethodNotAllowed { allow } = self {
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static(allow));
        }
        response
    }
}

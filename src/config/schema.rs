//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// NASA Exoplanet Archive TAP synchronous query endpoint.
pub const DEFAULT_ARCHIVE_BASE_URL: &str = "https://exoplanetarchive.ipac.caltech.edu/TAP/sync";

/// Prediction model endpoint used when nothing else is configured.
pub const DEFAULT_PREDICT_ENDPOINT: &str = "https://back-557899680969.us-south1.run.app/predict/";

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Archive query proxy settings.
    pub archive: ArchiveConfig,

    /// Prediction proxy settings.
    pub predict: PredictConfig,

    /// Chat proxy settings.
    pub chat: ChatConfig,

    /// Cross-origin settings for the browser front-end.
    pub cors: CorsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3001").
    pub bind_address: String,

    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3001".to_string(),
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for every outbound upstream call, body included, in seconds.
    pub upstream_secs: u64,

    /// Deadline for producing response headers to the client, in seconds.
    pub request_secs: u64,
}

impl TimeoutConfig {
    pub fn upstream(&self) -> Duration {
        Duration::from_secs(self.upstream_secs)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            upstream_secs: 25,
            request_secs: 30,
        }
    }
}

/// Archive query proxy configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Upstream TAP endpoint. Only settable from the config file.
    pub base_url: String,

    /// Lifetime of a cached archive response in seconds.
    pub cache_ttl_secs: u64,

    /// `cache-control` sent to clients when upstream provides none.
    pub default_cache_control: String,
}

impl ArchiveConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ARCHIVE_BASE_URL.to_string(),
            cache_ttl_secs: 300,
            default_cache_control: "s-maxage=300, stale-while-revalidate=60".to_string(),
        }
    }
}

/// Prediction proxy configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PredictConfig {
    /// Model endpoint receiving the feature object.
    pub endpoint: String,
}

impl Default for PredictConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_PREDICT_ENDPOINT.to_string(),
        }
    }
}

/// Chat proxy configuration.
///
/// Both `api_key` and `endpoint` must be present for the chat proxy to serve
/// requests; otherwise it answers `501 Not Implemented`.
#[derive(Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ChatConfig {
    /// Bearer token for the completion endpoint. Read, never written back.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Completion endpoint URL.
    pub endpoint: Option<String>,

    /// Lifetime of a cached reply in seconds.
    pub cache_ttl_secs: u64,
}

impl ChatConfig {
    /// Returns `(api_key, endpoint)` when both are set and non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let key = self.api_key.as_deref().filter(|k| !k.is_empty())?;
        let endpoint = self.endpoint.as_deref().filter(|e| !e.is_empty())?;
        Some((key, endpoint))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: None,
            cache_ttl_secs: 120,
        }
    }
}

// Keep the API key out of logs.
impl std::fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .finish()
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins. A single `"*"` allows any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

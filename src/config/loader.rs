//! Configuration loading from disk and the process environment.

use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Listen port override.
pub const ENV_PORT: &str = "PORT";
/// Prediction endpoint override.
pub const ENV_PREDICT_ENDPOINT: &str = "PREDICT_ENDPOINT";
/// Bearer token for the chat endpoint.
pub const ENV_CHAT_API_KEY: &str = "GEMINI_API_KEY";
/// Chat completion endpoint.
pub const ENV_CHAT_ENDPOINT: &str = "GEMINI_API_ENDPOINT";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load a TOML file, apply environment overrides and validate the result.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: ProxyConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;
    finish(config)
}

impl ProxyConfig {
    /// Build a configuration from defaults and environment variables only.
    pub fn from_env() -> Result<Self, ConfigError> {
        finish(ProxyConfig::default())
    }
}

fn finish(mut config: ProxyConfig) -> Result<ProxyConfig, ConfigError> {
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Overlay environment values onto `config`.
///
/// `lookup` resolves a variable name; empty values count as unset. The archive
/// base URL is deliberately absent from the environment surface.
pub fn apply_env_overrides<F>(config: &mut ProxyConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(port) = get(ENV_PORT) {
        match port.trim().parse::<u16>() {
            Ok(port) => {
                let addr = match config.listener.bind_address.parse::<SocketAddr>() {
                    Ok(mut addr) => {
                        addr.set_port(port);
                        addr
                    }
                    Err(_) => SocketAddr::from(([0, 0, 0, 0], port)),
                };
                config.listener.bind_address = addr.to_string();
            }
            Err(e) => {
                tracing::warn!(value = %port, error = %e, "Ignoring invalid {} value", ENV_PORT);
            }
        }
    }

    if let Some(endpoint) = get(ENV_PREDICT_ENDPOINT) {
        config.predict.endpoint = endpoint;
    }
    if let Some(key) = get(ENV_CHAT_API_KEY) {
        config.chat.api_key = Some(key);
    }
    if let Some(endpoint) = get(ENV_CHAT_ENDPOINT) {
        config.chat.endpoint = Some(endpoint);
    }
}

/// Pin the listen address given on the command line.
///
/// Applied to the initial configuration and to every reload, so the file or
/// `PORT` never reclaims the address.
pub fn apply_bind_override(config: &mut ProxyConfig, bind: Option<&str>) {
    if let Some(bind) = bind {
        config.listener.bind_address = bind.to_string();
    }
}

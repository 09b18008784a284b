//! Exoplanet explorer proxy library.
//!
//! Mediates browser traffic to the exoplanet archive, the prediction model
//! and the chat completion service, caching what can be cached.

pub mod cache;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod upstream;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;

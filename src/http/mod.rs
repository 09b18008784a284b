//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware: request ID, trace, CORS, limits)
//!     → archive.rs  GET|HEAD /api/exoplanets  (cached, streamed)
//!     → predict.rs  POST     /api/predict
//!     → chat.rs     POST     /api/gemini      (cached replies)
//!     → status.rs   GET      /api/health
//!     → error.rs (every failure becomes a JSON envelope)
//! ```

pub mod archive;
pub mod chat;
pub mod error;
pub mod predict;
pub mod request;
pub mod server;
pub mod status;

pub use error::ApiError;
pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};

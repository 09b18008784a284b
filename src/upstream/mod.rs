//! Upstream service access.
//!
//! # Data Flow
//! ```text
//! archive handler → client.rs fetch_archive → TAP sync endpoint
//! predict handler → client.rs post_json     → model endpoint
//! chat handler    → client.rs post_json     → completion endpoint
//!                 → reply.rs extract_reply
//! ```
//!
//! # Design Decisions
//! - One pooled client shared by all handlers
//! - One deadline for every upstream, taken from `timeouts.upstream_secs`
//! - No retries: the caller owns retry policy

pub mod client;
pub mod reply;
pub mod types;

pub use client::UpstreamClient;
pub use reply::extract_reply;
pub use types::{UpstreamError, UpstreamResult};

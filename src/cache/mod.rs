//! In-process response caches.
//!
//! # Data Flow
//! ```text
//! archive handler → ResponseCache (query string → CachedResponse, 300s)
//! chat handler    → ReplyCache    (prompt → reply, 120s)
//! ```
//!
//! # Design Decisions
//! - Built once at startup and injected through application state
//! - Lazy eviction on read, no sweeper task
//! - Unbounded and process-local; a cold cache is always correct
//! - Concurrent misses may both fetch; last write wins

pub mod response;
pub mod ttl;

pub use response::{reply_cache, response_cache, CachedResponse, ReplyCache, ResponseCache, X_CACHE};
pub use ttl::TtlCache;

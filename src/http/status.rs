use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::server::AppState;

#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub archive_cache_entries: usize,
    pub reply_cache_entries: usize,
    pub chat_configured: bool,
}

/// GET /api/health - liveness plus cache occupancy.
pub async fn get_status(State(state): State<AppState>) -> Json<ServiceStatus> {
    Json(ServiceStatus {
        status: "operational",
        version: env!("CARGO_PKG_VERSION"),
        archive_cache_entries: state.archive_cache.len(),
        reply_cache_entries: state.reply_cache.len(),
        chat_configured: state.config().chat.credentials().is_some(),
    })
}

//! HTTP handlers: catalog side-channel, status, static assets.

pub mod assets;
pub mod files;
pub mod status;

use std::path::PathBuf;

use axum::http::StatusCode;

use vlink_core::config::VlinkConfig;
use vlink_services::Rendezvous;

#[derive(Clone)]
pub struct ApiState {
    pub hub: Rendezvous,
    /// Root for static assets.
    pub static_dir: PathBuf,
    /// Served for `/` and for any missing asset.
    pub default_page: String,
    /// Read size when streaming catalog files.
    pub chunk_size: usize,
}

impl ApiState {
    pub fn new(hub: Rendezvous, config: &VlinkConfig) -> Self {
        Self {
            hub,
            static_dir: config.server.static_dir.clone(),
            default_page: config.server.default_page.clone(),
            chunk_size: config.transfer.chunk_size,
        }
    }
}

// ── Shared helpers ────────────────────────────────────────────────────────────

type ApiError = (StatusCode, String);

fn not_found(what: impl Into<String>) -> ApiError {
    (StatusCode::NOT_FOUND, what.into())
}

fn internal(e: impl std::fmt::Display) -> ApiError {
    tracing::warn!(error = %e, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal server error".to_string(),
    )
}

pub use assets::handle_fallback;
pub use files::{handle_get_file, handle_list_files, handle_publish_files};
pub use status::handle_status;

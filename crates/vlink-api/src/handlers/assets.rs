//! Fallback route: WebSocket upgrades for the rendezvous protocol, otherwise
//! static assets with the default page standing in for anything missing.

use std::path::{Component, Path, PathBuf};

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::{header, Uri};
use axum::response::{IntoResponse, Response};

use super::{internal, ApiError, ApiState};

pub async fn handle_fallback(
    State(state): State<ApiState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    uri: Uri,
) -> Response {
    if let Ok(ws) = ws {
        return crate::ws::upgrade(ws, state.hub.clone());
    }
    match serve_asset(&state, uri.path()).await {
        Ok(resp) => resp,
        Err(e) => e.into_response(),
    }
}

async fn serve_asset(state: &ApiState, request_path: &str) -> Result<Response, ApiError> {
    if let Some(rel) = asset_path(request_path) {
        let full = state.static_dir.join(&rel);
        let is_file = tokio::fs::metadata(&full)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if is_file {
            let body = tokio::fs::read(&full).await.map_err(internal)?;
            return Ok(typed(&rel, body));
        }
        tracing::debug!(path = request_path, "asset missing, serving default page");
    }

    let page = PathBuf::from(&state.default_page);
    let body = tokio::fs::read(state.static_dir.join(&page))
        .await
        .map_err(internal)?;
    Ok(typed(&page, body))
}

fn typed(path: &Path, body: Vec<u8>) -> Response {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    ([(header::CONTENT_TYPE, mime.essence_str().to_string())], body).into_response()
}

/// Map a request path to a relative asset path. Only normal components
/// survive; `.`/`..` segments and roots are dropped. None means the root.
fn asset_path(request_path: &str) -> Option<PathBuf> {
    let rel: PathBuf = request_path
        .split(['/', '\\'])
        .flat_map(|seg| Path::new(seg).components())
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect();
    if rel.as_os_str().is_empty() {
        None
    } else {
        Some(rel)
    }
}

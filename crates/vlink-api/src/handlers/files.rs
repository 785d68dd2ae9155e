//! /files, /file/{index} handlers: the catalog side-channel.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use axum::Json;
use bytes::Bytes;
use serde::Serialize;
use tokio::io::AsyncReadExt;

use vlink_core::FileDescriptor;
use vlink_services::CatalogError;

use super::{internal, not_found, ApiError, ApiState};

// ── GET /files ────────────────────────────────────────────────────────────────

pub async fn handle_list_files(State(state): State<ApiState>) -> Json<Vec<FileDescriptor>> {
    Json(state.hub.catalog().await)
}

// ── GET /file/{index} ─────────────────────────────────────────────────────────

pub async fn handle_get_file(
    State(state): State<ApiState>,
    Path(index): Path<String>,
) -> Result<Response, ApiError> {
    let index: usize = index
        .parse()
        .map_err(|_| not_found(format!("no file at index {index}")))?;

    let (entry, path) = state.hub.locate(index).await.map_err(|e| {
        tracing::debug!(index, error = %e, "catalog lookup failed");
        not_found(e.to_string())
    })?;

    let file = match tokio::fs::File::open(&path).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(index, path = %path.display(), "backing file missing");
            return Err(not_found(format!("{} is not available", entry.name)));
        }
        Err(e) => return Err(internal(e)),
    };
    let len = file.metadata().await.map_err(internal)?.len();
    let content_type = mime_guess::from_path(&path).first_or_octet_stream();

    let chunk_size = state.chunk_size.max(1);
    let stream = futures::stream::try_unfold(file, move |mut file| async move {
        let mut buf = vec![0u8; chunk_size];
        let n = file.read(&mut buf).await?;
        if n == 0 {
            return Ok::<_, std::io::Error>(None);
        }
        buf.truncate(n);
        Ok(Some((Bytes::from(buf), file)))
    });

    tracing::info!(index, file = %entry.name, bytes = len, "serving catalog file");
    Response::builder()
        .header(header::CONTENT_TYPE, content_type.essence_str())
        .header(header::CONTENT_LENGTH, len)
        .header(header::CONTENT_DISPOSITION, content_disposition(&entry.name))
        .body(Body::from_stream(stream))
        .map_err(internal)
}

/// `inline; filename="<name>"`, with characters a header cannot carry removed.
fn content_disposition(name: &str) -> HeaderValue {
    let safe: String = name
        .chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control() && *c != '"' && *c != '\\')
        .collect();
    HeaderValue::from_str(&format!("inline; filename=\"{safe}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("inline"))
}

// ── POST /files ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct PublishResponse {
    pub files: usize,
}

pub async fn handle_publish_files(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(files): Json<Vec<FileDescriptor>>,
) -> Result<Json<PublishResponse>, ApiError> {
    let token = bearer_token(&headers);
    match state.hub.replace_catalog(files, token).await {
        Ok(files) => Ok(Json(PublishResponse { files })),
        Err(CatalogError::Unauthorized) => {
            tracing::warn!("rejected catalog publish with bad token");
            Err((StatusCode::UNAUTHORIZED, "invalid control token".to_string()))
        }
        Err(e) => Err(internal(e)),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

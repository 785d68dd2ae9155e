//! /status handler.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::ApiState;

#[derive(Serialize)]
pub struct StatusResponse {
    pub peers: usize,
    pub files: usize,
}

pub async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let (peers, files) = state.hub.counts().await;
    Json(StatusResponse { peers, files })
}

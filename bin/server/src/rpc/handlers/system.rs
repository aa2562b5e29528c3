//! System-related RPC handlers.

use super::to_json;
use crate::rpc::state::{acquire_read, SharedForum};
use axum::{response::IntoResponse, Json};
use loophub::api::HealthResult;
use loophub::rpc::RpcError;
use serde_json::Value;

fn health() -> HealthResult {
    HealthResult {
        status: "ok".to_string(),
        service: "loophub-server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

pub fn handle_health() -> Result<Value, RpcError> {
    to_json(health())
}

pub fn handle_stats(forum: &SharedForum) -> Result<Value, RpcError> {
    to_json(acquire_read(forum).stats()?)
}

/// `GET /health` for load balancers.
pub async fn health_check() -> impl IntoResponse {
    Json(health())
}

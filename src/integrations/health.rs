//! 健康检查端点：GET /health 返回固定 JSON

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use crate::core::BridgeError;

pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// 在给定地址上启动健康端点；随进程运行，由编排器 abort
pub async fn serve(bind: &str) -> Result<(), BridgeError> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| BridgeError::Health(format!("bind {}: {}", bind, e)))?;
    tracing::info!(addr = %bind, "health endpoint listening");
    axum::serve(listener, router())
        .await
        .map_err(|e| BridgeError::Health(e.to_string()))
}

//! 健康检查路由
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/health | GET | 简单健康检查 |
//!
//! ```json
//! { "status": "healthy", "version": "0.1.0", "pending_deliveries": 0 }
//! ```

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/health", get(health))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// healthy | degraded
    status: &'static str,
    version: &'static str,
    /// 等待执行的送达任务数 (数据库不可读时为空)
    #[serde(skip_serializing_if = "Option::is_none")]
    pending_deliveries: Option<usize>,
}

pub async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    let pending = match state.storage.get_pending_deliveries() {
        Ok(entries) => Some(entries.len()),
        Err(e) => {
            tracing::error!(error = %e, "Health check could not read delivery queue");
            None
        }
    };

    Json(HealthResponse {
        status: if pending.is_some() { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        pending_deliveries: pending,
    })
}

use axum::Json;
use serde_json::{json, Value};

/// GET /health
/// Constant liveness signal; does not touch the recommendation pipeline.
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy"
    }))
}

use axum::Json;
use serde_json::{json, Value as JsonValue};

/// GET /healthz
pub async fn healthz() -> Json<JsonValue> {
    Json(json!({ "ok": true }))
}

/// Pipeline stage listing endpoint

use crate::{api::cases::AppState, workflow::StepRegistry};
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};

pub fn create_stage_routes() -> Router<AppState> {
    Router::new().route("/api/stages", get(list_stages))
}

/// GET /api/stages
/// Returns: { "stages": [{ "id": "upload", "title": "...", "description": "...", "kind": "upload" }] }
async fn list_stages() -> Json<Value> {
    Json(json!({ "stages": StepRegistry::stages() }))
}

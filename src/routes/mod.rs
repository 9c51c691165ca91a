use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::services::tools::Tool;
use crate::{AppState, SERVER_NAME, VERSION};

pub mod tools;

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .merge(tools::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> Json<Value> {
    let tools: Vec<&str> = Tool::ALL.iter().map(|tool| tool.name()).collect();
    Json(json!({
        "name": SERVER_NAME,
        "version": VERSION,
        "protocol": "mcp",
        "tools": tools,
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "server": SERVER_NAME,
        "version": VERSION,
    }))
}

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::Method,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::{
    error::AppError,
    services::tools::{self, Tool, ToolResponse},
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/tools", get(list_tools))
        .route("/tools/:tool_name", post(call_tool))
        .layer(cors)
}

/// Request body of a tool call. Other fields, such as a `name` echoing the
/// path segment, are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct ToolRequest {
    #[serde(default)]
    arguments: Value,
}

async fn list_tools() -> Json<Value> {
    let tools: Vec<Value> = Tool::ALL
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name(),
                "description": tool.description(),
                "parameters": tool.parameters(),
            })
        })
        .collect();
    Json(json!({ "tools": tools }))
}

async fn call_tool(
    State(state): State<Arc<AppState>>,
    Path(tool_name): Path<String>,
    body: Bytes,
) -> Result<Json<ToolResponse>, AppError> {
    let tool = Tool::from_name(&tool_name).ok_or_else(|| {
        tracing::warn!("Unknown tool requested: {}", tool_name);
        AppError::NotFound(format!("Tool '{}' not found", tool_name))
    })?;

    let request: ToolRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ToolRequest::default()
    } else {
        serde_json::from_slice(&body)?
    };

    match tools::dispatch(&state, tool, request.arguments).await {
        Ok(result) => Ok(Json(ToolResponse::ok(result))),
        Err(e) => {
            tracing::error!("Error executing tool {}: {}", tool.name(), e);
            Err(e)
        }
    }
}

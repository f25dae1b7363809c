use axum::{
    body::Bytes,
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;
use serde_json::json;
use std::sync::Arc;
use tracing::error;

use super::Server;
use crate::tools::{ToolDescriptor, ToolResult};
use crate::Error;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Caller(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Backend(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

pub async fn list_tools(State(server): State<Arc<Server>>) -> Json<Vec<ToolDescriptor>> {
    Json(server.registry.descriptors())
}

/// Body is the tool's JSON arguments. An empty body means no arguments.
pub async fn call_tool(
    State(server): State<Arc<Server>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<ToolResult>, Error> {
    let args = if body.iter().all(u8::is_ascii_whitespace) {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| Error::Caller(format!("Request body is not valid JSON: {}", e)))?
    };

    let result = server.registry.call(&name, args).await?;
    Ok(Json(result))
}

pub async fn metrics(State(server): State<Arc<Server>>) -> Result<String, Error> {
    server.registry.reporter().gather()
}

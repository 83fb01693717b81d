// crates/server/src/routes/tools.rs
//! Tool listing and token-gated launch.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;
use taskgate_core::{LaunchRequest, LaunchTicket, ParamSpec};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// One tool as advertised to clients: its description plus the full
/// launch signature (declared parameters with `token` and `timeout_s`
/// appended).
#[derive(Debug, Serialize)]
pub struct ToolSummary {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
}

#[derive(Debug, Serialize)]
pub struct ToolListResponse {
    pub count: usize,
    pub tools: Vec<ToolSummary>,
}

/// GET /api/tools — advertise registered tools and their launch schemas.
pub async fn list_tools(State(state): State<Arc<AppState>>) -> Json<ToolListResponse> {
    let tools: Vec<ToolSummary> = state
        .registry
        .descriptors()
        .into_iter()
        .map(|d| ToolSummary {
            params: d.launch_params(),
            name: d.name,
            description: d.description,
        })
        .collect();
    Json(ToolListResponse {
        count: tools.len(),
        tools,
    })
}

/// POST /api/tools/{name} — launch a tool as a background job.
///
/// The body is a flat JSON object: `token` (required) and `timeout_s`
/// (optional) are peeled off here, everything else is passed to the tool
/// as its arguments. The response is an immediate Pending ticket.
pub async fn launch_tool(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Json<LaunchTicket>> {
    let tool = state
        .registry
        .get(&name)
        .ok_or(ApiError::ToolNotFound(name))?;

    let mut body = match body {
        Value::Object(map) => map,
        _ => return Err(ApiError::BadRequest("request body must be a JSON object".into())),
    };

    let token = match body.remove("token") {
        Some(Value::String(t)) => Some(t),
        Some(_) => return Err(ApiError::BadRequest("token must be a string".into())),
        None => None,
    };
    let timeout_s = match body.remove("timeout_s") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::Null) | None => None,
        Some(_) => return Err(ApiError::BadRequest("timeout_s must be a number".into())),
    };

    let ticket = state.launcher.launch(
        tool,
        LaunchRequest {
            token,
            timeout_s,
            args: Value::Object(body),
        },
    )?;
    Ok(Json(ticket))
}

/// Create the tools router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tools", get(list_tools))
        .route("/tools/{name}", post(launch_tool))
}

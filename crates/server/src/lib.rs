// crates/server/src/lib.rs
//! Taskgate server library.
//!
//! Axum HTTP surface over the taskgate-core job system: token issuance,
//! tool launch, and per-session job control (status, result, cancel).

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod sweep;
pub mod tools;

pub use config::ServerConfig;
pub use error::*;
pub use routes::api_routes;
pub use state::AppState;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the Axum application with all routes and middleware.
///
/// This sets up:
/// - API routes (health, token, tools, jobs)
/// - CORS for development (allows any origin)
/// - Request tracing
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api_routes(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

// ============================================================================
// Integration Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use taskgate_core::ToolRegistry;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(tools::SimulateWorkTool::new()))
            .unwrap();
        create_app(AppState::new(ServerConfig::default(), registry))
    }

    /// Helper to make a GET request to the app.
    async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    /// Helper to POST a JSON body.
    async fn post(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn issue_token(app: &Router) -> String {
        let (status, body) = post(app.clone(), "/api/token", json!({})).await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    /// Poll status until the job leaves Pending/Running.
    async fn wait_terminal(app: &Router, job_id: &str, token: &str) -> Value {
        for _ in 0..300 {
            let (status, body) = get(
                app.clone(),
                &format!("/api/jobs/{job_id}/status?token={token}"),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            let state = body["state"].as_str().unwrap();
            if state != "pending" && state != "running" {
                return body;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("job {job_id} never reached a terminal state");
    }

    // ========================================================================
    // Health Endpoint Tests
    // ========================================================================

    #[tokio::test]
    async fn test_health_endpoint() {
        let (status, body) = get(test_app(), "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert!(body["version"].is_string());
        assert!(body["uptime_secs"].is_number());
        assert_eq!(body["jobs"], 0);
    }

    // ========================================================================
    // Token Endpoint Tests
    // ========================================================================

    #[tokio::test]
    async fn test_token_issuance() {
        let (status, body) = post(test_app(), "/api/token", json!({"ttl_s": 120})).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["session_id"].is_string());
        assert_eq!(body["expires_in"], 120);
        // Two-part dot-separated token.
        let token = body["token"].as_str().unwrap();
        assert_eq!(token.matches('.').count(), 1);
    }

    // ========================================================================
    // Tool Listing Tests
    // ========================================================================

    #[tokio::test]
    async fn test_tools_listing_includes_launch_schema() {
        let (status, body) = get(test_app(), "/api/tools").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        let tool = &body["tools"][0];
        assert_eq!(tool["name"], "simulate_work");
        let names: Vec<&str> = tool["params"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap())
            .collect();
        assert!(names.contains(&"token"));
        assert!(names.contains(&"timeout_s"));
        assert!(!names.contains(&"session_id"));
        assert!(!names.contains(&"progress_cb"));
    }

    // ========================================================================
    // Job Lifecycle Tests
    // ========================================================================

    #[tokio::test]
    async fn test_full_lifecycle_launch_status_result() {
        let app = test_app();
        let token = issue_token(&app).await;

        let (status, ticket) = post(
            app.clone(),
            "/api/tools/simulate_work",
            json!({"units": 4, "chunk_size": 2, "step_ms": 1, "token": token}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ticket["state"], "pending");
        let job_id = ticket["job_id"].as_str().unwrap().to_string();

        let terminal = wait_terminal(&app, &job_id, &token).await;
        assert_eq!(terminal["state"], "done");
        assert_eq!(terminal["progress"], 1.0);
        assert!(terminal["finished_at"].is_string());

        let (status, result) = post(
            app.clone(),
            &format!("/api/jobs/{job_id}/result?token={token}"),
            json!({}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(result["state"], "done");
        assert_eq!(result["result"]["units"], 4);

        // Pop-on-read: the second read finds nothing.
        let (status, _) = post(
            app,
            &format!("/api/jobs/{job_id}/result?token={token}"),
            json!({}),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_launch_without_token_creates_no_job() {
        let app = test_app();
        let (status, body) = post(
            app.clone(),
            "/api/tools/simulate_work",
            json!({"units": 2}),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "auth failed");

        let token = issue_token(&app).await;
        let (_, listing) = get(app, &format!("/api/jobs?token={token}")).await;
        assert_eq!(listing["count"], 0);
    }

    #[tokio::test]
    async fn test_launch_with_unknown_param_is_400() {
        let app = test_app();
        let token = issue_token(&app).await;
        let (status, _) = post(
            app,
            "/api/tools/simulate_work",
            json!({"units": 2, "bogus": true, "token": token}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_launch_unknown_tool_is_404() {
        let app = test_app();
        let token = issue_token(&app).await;
        let (status, _) = post(app, "/api/tools/nope", json!({"token": token})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let app = test_app();
        let token_a = issue_token(&app).await;
        let token_b = issue_token(&app).await;

        let (_, ticket) = post(
            app.clone(),
            "/api/tools/simulate_work",
            json!({"units": 2, "step_ms": 1, "token": token_a}),
        )
        .await;
        let job_id = ticket["job_id"].as_str().unwrap().to_string();

        // The other session gets NotFound for status, result, and cancel;
        // identical to a job that never existed.
        for (method, uri) in [
            ("GET", format!("/api/jobs/{job_id}/status?token={token_b}")),
            ("POST", format!("/api/jobs/{job_id}/result?token={token_b}")),
            ("POST", format!("/api/jobs/{job_id}/cancel?token={token_b}")),
        ] {
            let request = Request::builder()
                .method(method)
                .uri(&uri)
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        }

        // The owner still sees it.
        let (status, _) = get(
            app,
            &format!("/api/jobs/{job_id}/status?token={token_a}"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cancel_ends_job_as_canceled() {
        let app = test_app();
        let token = issue_token(&app).await;

        let (_, ticket) = post(
            app.clone(),
            "/api/tools/simulate_work",
            json!({"units": 1000, "chunk_size": 1, "step_ms": 20, "token": token}),
        )
        .await;
        let job_id = ticket["job_id"].as_str().unwrap().to_string();

        // Let it start, then cancel.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let (status, body) = post(
            app.clone(),
            &format!("/api/jobs/{job_id}/cancel?token={token}"),
            json!({}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);

        let terminal = wait_terminal(&app, &job_id, &token).await;
        assert_eq!(terminal["state"], "canceled");

        let (_, result) = post(
            app,
            &format!("/api/jobs/{job_id}/result?token={token}"),
            json!({}),
        )
        .await;
        assert_eq!(result["state"], "canceled");
        assert!(result["result"].is_null());
    }

    #[tokio::test]
    async fn test_failed_job_result_carries_trace() {
        let app = test_app();
        let token = issue_token(&app).await;

        let (_, ticket) = post(
            app.clone(),
            "/api/tools/simulate_work",
            json!({"units": 10, "chunk_size": 5, "step_ms": 1, "fail_at": 2, "token": token}),
        )
        .await;
        let job_id = ticket["job_id"].as_str().unwrap().to_string();

        let terminal = wait_terminal(&app, &job_id, &token).await;
        assert_eq!(terminal["state"], "failed");

        let (_, result) = post(
            app,
            &format!("/api/jobs/{job_id}/result?token={token}"),
            json!({}),
        )
        .await;
        assert_eq!(result["state"], "failed");
        assert_eq!(result["error_type"], "SimulatedFailure");
        assert!(result["trace"].as_str().unwrap().contains("SimulatedFailure"));
    }

    #[tokio::test]
    async fn test_timeout_ends_job_as_timed_out() {
        let app = test_app();
        let token = issue_token(&app).await;

        let (_, ticket) = post(
            app.clone(),
            "/api/tools/simulate_work",
            json!({"units": 1000, "chunk_size": 1, "step_ms": 20, "timeout_s": 0.1, "token": token}),
        )
        .await;
        let job_id = ticket["job_id"].as_str().unwrap().to_string();

        let terminal = wait_terminal(&app, &job_id, &token).await;
        assert_eq!(terminal["state"], "timed_out");
        assert!(terminal["error"].as_str().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_result_before_completion_does_not_consume() {
        let app = test_app();
        let token = issue_token(&app).await;

        let (_, ticket) = post(
            app.clone(),
            "/api/tools/simulate_work",
            json!({"units": 1000, "chunk_size": 1, "step_ms": 20, "token": token}),
        )
        .await;
        let job_id = ticket["job_id"].as_str().unwrap().to_string();

        let (status, body) = post(
            app.clone(),
            &format!("/api/jobs/{job_id}/result?token={token}"),
            json!({}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["error"], "job not complete");

        // Still there.
        let (status, _) = get(
            app,
            &format!("/api/jobs/{job_id}/status?token={token}"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_job_list_is_scoped_to_token_session() {
        let app = test_app();
        let token_a = issue_token(&app).await;
        let token_b = issue_token(&app).await;

        for token in [&token_a, &token_a, &token_b] {
            let (status, _) = post(
                app.clone(),
                "/api/tools/simulate_work",
                json!({"units": 1, "step_ms": 1, "token": token}),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (_, listing) = get(app.clone(), &format!("/api/jobs?token={token_a}")).await;
        assert_eq!(listing["count"], 2);
        let (_, listing) = get(app, &format!("/api/jobs?token={token_b}")).await;
        assert_eq!(listing["count"], 1);
    }

    // ========================================================================
    // CORS Tests
    // ========================================================================

    #[tokio::test]
    async fn test_cors_allows_any_origin() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .header("Origin", "http://example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let allow_origin = response.headers().get("access-control-allow-origin");
        assert!(allow_origin.is_some());
        assert_eq!(allow_origin.unwrap(), "*");
    }

    // ========================================================================
    // 404 Tests
    // ========================================================================

    #[tokio::test]
    async fn test_404_for_unknown_route() {
        let (status, _) = get_raw(test_app(), "/api/nonexistent").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_404_for_non_api_path() {
        let (status, _) = get_raw(test_app(), "/health").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    /// Like `get` but tolerates non-JSON bodies.
    async fn get_raw(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }
}

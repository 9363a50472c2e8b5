// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! HTTP front-end: `POST /mcp`, `GET /health`, `GET /status`, built with
//! the same `AppState` + `Router::with_state` shape used for the rest of
//! this codebase's axum surfaces.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::application::orchestrator::{self, Orchestrator};
use crate::application::validator;
use crate::domain::jsonrpc::{error_codes, JsonRpcResponse};

pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

pub fn app(orchestrator: Arc<Orchestrator>) -> Router {
    let state = Arc::new(AppState { orchestrator });
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/mcp", post(handle_mcp))
        .route("/health", get(handle_health))
        .route("/status", get(handle_status))
        .layer(cors)
        .with_state(state)
}

/// Bytes, not `Json<Value>`: axum's `Json` extractor rejects unparseable
/// bodies with a bare HTTP 400 before this handler ever runs, which would
/// skip the `-32700` JSON-RPC envelope malformed input is supposed to get.
async fn handle_mcp(State(state): State<Arc<AppState>>, body: Bytes) -> impl IntoResponse {
    let body: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "rejected unparseable jsonrpc body");
            let response = JsonRpcResponse::failure(Value::Null, error_codes::PARSE_ERROR, err.to_string(), None);
            return (StatusCode::OK, Json(response));
        }
    };

    let id = body.get("id").cloned().unwrap_or(Value::Null);

    if let Err(err) = validator::validate_request(&body) {
        warn!(error = %err, "rejected malformed jsonrpc request");
        let orchestrator_err = orchestrator::to_orchestrator_error(err);
        let response = JsonRpcResponse::failure(id, orchestrator_err.code, orchestrator_err.message, Some(orchestrator_err.data()));
        return (StatusCode::OK, Json(response));
    }

    let request: crate::domain::jsonrpc::JsonRpcRequest = match serde_json::from_value(body) {
        Ok(request) => request,
        Err(err) => {
            let response = JsonRpcResponse::failure(id, error_codes::PARSE_ERROR, err.to_string(), None);
            return (StatusCode::OK, Json(response));
        }
    };

    let response = state.orchestrator.dispatch(request).await;
    (StatusCode::OK, Json(response))
}

async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let orchestrator = &state.orchestrator;
    let registry = orchestrator.registry();
    let hardening = orchestrator.hardening();
    let router_config = orchestrator.router_config();
    let discovery_config = orchestrator.discovery_config();

    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now(),
        "uptime": orchestrator.uptime_seconds(),
        "orchestrator": {
            "initialized": orchestrator.initialized(),
            "agentCount": registry.agent_count(),
            "toolCount": registry.tool_count(),
            "activeAgents": registry.agents().iter().filter(|a| a.status == crate::domain::agent::AgentStatus::Active).count(),
            "registry": {
                "statePath": registry.config().state_dir,
                "maxErrorLogEntries": registry.config().max_error_log_entries,
            },
        },
        "discovery": {
            "intervalMs": discovery_config.interval.as_millis() as u64,
            "retryAttempts": discovery_config.retry_attempts,
            "retryDelayMs": discovery_config.retry_delay.as_millis() as u64,
        },
        "router": {
            "retryAttempts": router_config.retry_attempts,
            "retryDelayMs": router_config.retry_delay.as_millis() as u64,
            "requestTimeoutMs": router_config.request_timeout.as_millis() as u64,
        },
        "hardening": {
            "defaultTimeoutMs": hardening.config().default_timeout_ms,
            "circuitBreakerThreshold": hardening.config().circuit_breaker_threshold,
            "circuitBreakerTimeoutMs": hardening.config().circuit_breaker_timeout_ms,
            "errorStats": hardening.error_stats(),
        },
    }))
}

async fn handle_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let registry = state.orchestrator.registry();
    let errors = registry.recent_errors().await;

    Json(json!({
        "uptimeSeconds": state.orchestrator.uptime_seconds(),
        "agentCount": registry.agent_count(),
        "toolCount": registry.tool_count(),
        "agents": registry.agents().into_iter().map(|a| json!({
            "id": a.id.to_string(),
            "name": a.name,
            "status": a.status,
            "url": a.connection.url,
        })).collect::<Vec<_>>(),
        "recentErrors": errors,
    }))
}

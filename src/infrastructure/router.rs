// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Outbound JSON-RPC client to agent endpoints: request shape, linear
//! retry, and a single reused `reqwest::Client`.

use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::domain::agent::Agent;
use crate::domain::jsonrpc::{JsonRpcRequest, JsonRpcResponse};
use crate::domain::tool::ToolDefinition;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("agent returned malformed response: {0}")]
    MalformedResponse(String),
    #[error("agent error {code}: {message}")]
    AgentError { code: i32, message: String },
}

/// Linear-retry policy for outbound agent calls, distinct from the
/// hardening layer's exponential backoff — the two compose multiplicatively
/// and are kept separate deliberately.
#[derive(Debug, Clone, Copy)]
pub struct RouterConfig {
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_delay: Duration::from_millis(500),
            request_timeout: Duration::from_secs(10),
        }
    }
}

pub struct Router {
    client: Client,
    config: RouterConfig,
}

impl Router {
    pub fn new(config: RouterConfig) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("reqwest client builds with a fixed, valid configuration");
        Self { client, config }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// `req_<unix-ms>_<9-char-random>`.
    fn request_id() -> String {
        format!("req_{}_{}", Utc::now().timestamp_millis(), &Uuid::new_v4().simple().to_string()[..9])
    }

    async fn call(&self, agent: &Agent, method: &str, params: Option<Value>) -> Result<Value, RouterError> {
        let id = Value::String(Self::request_id());
        let request = JsonRpcRequest::new(id, method, params);

        let mut attempt = 0u32;
        loop {
            match self.send_once(agent, &request).await {
                Ok(value) => return Ok(value),
                Err(err @ RouterError::Transport(_)) if attempt < self.config.retry_attempts => {
                    attempt += 1;
                    warn!(agent_id = %agent.id, method, attempt, error = %err, "retrying agent call");
                    tokio::time::sleep(self.config.retry_delay * attempt).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn send_once(&self, agent: &Agent, request: &JsonRpcRequest) -> Result<Value, RouterError> {
        let endpoint = format!("{}/mcp", agent.connection.url);
        let response = self.client.post(&endpoint).json(request).send().await?;
        let body: JsonRpcResponse = response
            .error_for_status()?
            .json()
            .await
            .map_err(|e| RouterError::MalformedResponse(e.to_string()))?;

        if let Some(error) = body.error {
            return Err(RouterError::AgentError { code: error.code, message: error.message });
        }
        body.result
            .ok_or_else(|| RouterError::MalformedResponse("response has neither result nor error".to_string()))
    }

    /// Send the MCP `initialize` handshake to a newly discovered agent.
    pub async fn initialize_agent(&self, agent: &Agent) -> Result<Value, RouterError> {
        let params = serde_json::json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": { "name": "mcp-orchestrator", "version": env!("CARGO_PKG_VERSION") },
        });
        self.call(agent, "initialize", Some(params)).await
    }

    /// Fetch the agent's declared tool catalog via `tools/list`.
    pub async fn get_agent_tools(&self, agent: &Agent) -> Result<Vec<ToolDefinition>, RouterError> {
        let result = self.call(agent, "tools/list", None).await?;
        let tools = result
            .get("tools")
            .ok_or_else(|| RouterError::MalformedResponse("tools/list missing tools array".to_string()))?;
        serde_json::from_value(tools.clone()).map_err(|e| RouterError::MalformedResponse(e.to_string()))
    }

    /// Forward a `tools/call` invocation to the owning agent.
    pub async fn route_tool_call(&self, agent: &Agent, tool_name: &str, arguments: Value) -> Result<Value, RouterError> {
        let params = serde_json::json!({ "name": tool_name, "arguments": arguments });
        self.call(agent, "tools/call", Some(params)).await
    }

    /// A single `ping` with no retry, used by health checks that already
    /// run on their own cadence.
    pub async fn test_agent_connection(&self, agent: &Agent) -> bool {
        let id = Value::String(Self::request_id());
        let request = JsonRpcRequest::new(id, "ping", None);
        self.send_once(agent, &request).await.is_ok()
    }
}

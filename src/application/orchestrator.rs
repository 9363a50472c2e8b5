// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! The orchestrator itself: dispatches JSON-RPC methods, owns the
//! agent-discovered/agent-lost reaction, and is the only component that
//! mutates the tool index.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::application::hardening::Hardening;
use crate::application::policy::ToolPolicy;
use crate::application::validator::{self, ToolCallParams, ValidationError};
use crate::domain::agent::{Agent, AgentId, AgentStatus};
use crate::domain::error_log::ErrorLogEntry;
use crate::domain::events::OrchestratorEvent;
use crate::domain::jsonrpc::{JsonRpcRequest, JsonRpcResponse};
use crate::domain::mcp_error::OrchestratorError;
use crate::infrastructure::discovery::{Discovery, DiscoveryConfig};
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::registry::Registry;
use crate::infrastructure::router::{Router, RouterConfig};

const PROTOCOL_VERSION: &str = "2024-11-05";

pub struct Orchestrator {
    registry: Arc<Registry>,
    router: Arc<Router>,
    hardening: Arc<Hardening>,
    event_bus: EventBus,
    discovery: Arc<Discovery>,
    policy: ToolPolicy,
    started_at: Instant,
    initialized: AtomicBool,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<Registry>,
        router: Arc<Router>,
        hardening: Arc<Hardening>,
        event_bus: EventBus,
        discovery: Arc<Discovery>,
        policy: ToolPolicy,
    ) -> Self {
        Self {
            registry,
            router,
            hardening,
            event_bus,
            discovery,
            policy,
            started_at: Instant::now(),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn hardening(&self) -> &Arc<Hardening> {
        &self.hardening
    }

    pub fn router_config(&self) -> &RouterConfig {
        self.router.config()
    }

    pub fn discovery_config(&self) -> &DiscoveryConfig {
        self.discovery.config()
    }

    /// Whether the first `initialize` call has run its onboarding scan.
    pub fn initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// React to discovery events on its own task: initialize newly
    /// discovered agents, pull their tool catalog into the index, and evict
    /// lost agents.
    pub async fn run_event_loop(self: Arc<Self>) {
        let mut events = self.event_bus.subscribe();
        loop {
            match events.recv().await {
                Ok(OrchestratorEvent::AgentDiscovered { agent }) => {
                    let orchestrator = self.clone();
                    tokio::spawn(async move { orchestrator.onboard_agent(*agent).await });
                }
                Ok(OrchestratorEvent::AgentLost { agent_id }) => {
                    self.registry.mark_inactive(&AgentId::new(agent_id));
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "orchestrator event loop lagged, events dropped");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
            }
        }
    }

    /// Onboard a newly (re-)discovered agent: initialize, pull its tool
    /// catalog, register tools. No-op if the agent is already active, so
    /// the direct `initialize` path and the background discovery loop can
    /// both observe the same `agentDiscovered` without onboarding twice.
    async fn onboard_agent(&self, agent: Agent) {
        let agent_id = agent.id.clone();
        if let Some(existing) = self.registry.get_agent(&agent_id) {
            if existing.status == AgentStatus::Active {
                return;
            }
        }
        self.registry.upsert_agent(agent.clone());

        let init_result = self
            .hardening
            .safe_tool_call(
                || async { self.router.initialize_agent(&agent).await.map_err(|e| router_to_orchestrator_error(e, &agent_id)) },
                self.hardening.config().default_timeout_ms,
                Some(&agent_id),
            )
            .await;
        if let Err(err) = init_result {
            warn!(agent_id = %agent_id, error = %err, "agent initialize failed");
            return;
        }

        let tools_result = self
            .hardening
            .safe_tool_call(
                || async { self.router.get_agent_tools(&agent).await.map_err(|e| router_to_orchestrator_error(e, &agent_id)) },
                self.hardening.config().default_timeout_ms,
                Some(&agent_id),
            )
            .await;

        match tools_result {
            Ok(tools) => {
                for tool in &tools {
                    if validator::validate_tool_definition(tool).is_err() {
                        continue;
                    }
                    self.registry.register_tool(&agent_id, &tool.name, &tool.description, tool.input_schema.clone());
                }
                info!(agent_id = %agent_id, tools = tools.len(), "agent onboarded");
            }
            Err(err) => warn!(agent_id = %agent_id, error = %err, "tools/list failed"),
        }
    }

    /// Dispatch a validated JSON-RPC request to the matching handler.
    pub async fn dispatch(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();
        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params.as_ref()).await,
            "tools/list" => Ok(self.handle_tools_list()),
            "tools/call" => self.handle_tools_call(request.params.as_ref()).await,
            "ping" => Ok(json!({})),
            other => Err(OrchestratorError::method_not_found(format!("unknown method: {other}"))),
        };

        match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(err) => {
                self.registry
                    .log_error(ErrorLogEntry {
                        timestamp: err.timestamp,
                        agent_id: None,
                        tool: None,
                        error_code: err.code,
                        message: err.message.clone(),
                        correlation_id: err.correlation_id.clone(),
                    })
                    .await;
                JsonRpcResponse { jsonrpc: "2.0".to_string(), id, result: None, error: Some(err.to_json_rpc_error()) }
            }
        }
    }

    /// Idempotent; the front-end may call this repeatedly. Only the first
    /// call triggers a discovery scan and onboards whatever it finds, so a
    /// client that calls `initialize` then `tools/list` sees the discovered
    /// tools without racing the background discovery loop.
    async fn handle_initialize(&self, params: Option<&Value>) -> Result<Value, OrchestratorError> {
        validator::validate_initialize(params).map_err(to_orchestrator_error)?;

        if !self.initialized.swap(true, Ordering::SeqCst) {
            match self.discovery.scan_once().await {
                Ok(discovered) => {
                    for agent in discovered {
                        self.onboard_agent(agent).await;
                    }
                }
                Err(err) => warn!(error = %err, "initial discovery scan failed"),
            }
        }

        Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "serverInfo": { "name": "mcp-orchestrator", "version": env!("CARGO_PKG_VERSION") },
        }))
    }

    fn handle_tools_list(&self) -> Value {
        let tools: Vec<Value> = self
            .registry
            .tool_names()
            .into_iter()
            .filter_map(|name| {
                self.registry.lookup_tool(&name).map(|entry| {
                    json!({
                        "name": name,
                        "description": entry.description,
                        "inputSchema": entry.input_schema.unwrap_or_else(|| json!({"type": "object", "properties": {}, "required": []})),
                    })
                })
            })
            .collect();
        json!({ "tools": tools })
    }

    async fn handle_tools_call(&self, params: Option<&Value>) -> Result<Value, OrchestratorError> {
        let ToolCallParams { name, arguments } = validator::validate_tool_call(params).map_err(to_orchestrator_error)?;

        if !self.policy.is_permitted(&name) {
            return Err(OrchestratorError::invalid_params(format!("tool '{name}' is not permitted by policy")));
        }

        let arguments = validator::sanitize_input(&arguments);

        let entry = self
            .registry
            .lookup_tool(&name)
            .ok_or_else(|| OrchestratorError::method_not_found(format!("unknown tool: {name}")))?;
        let agent_id = entry.agent_id.clone();
        let agent = self
            .registry
            .get_agent(&agent_id)
            .ok_or_else(|| OrchestratorError::service_unavailable("owning agent is no longer known", Some(agent_id.to_string())))?;

        let started = Instant::now();
        let outcome = self
            .hardening
            .safe_tool_call(
                || async {
                    self.router
                        .route_tool_call(&agent, &name, arguments.clone())
                        .await
                        .map_err(|e| router_to_orchestrator_error(e, &agent_id))
                },
                self.hardening.config().default_timeout_ms,
                Some(&agent_id),
            )
            .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let success = outcome.is_ok();
        self.registry.record_health(&agent_id, success, elapsed_ms);
        self.event_bus.publish(OrchestratorEvent::ToolCallCompleted {
            tool_name: name.clone(),
            agent_id: agent_id.to_string(),
            success,
            error: outcome.as_ref().err().map(|e| e.message.clone()),
        });

        outcome
    }
}

fn router_to_orchestrator_error(err: crate::infrastructure::router::RouterError, agent_id: &AgentId) -> OrchestratorError {
    OrchestratorError::internal(err.to_string(), Some(agent_id.to_string()))
}

pub(crate) fn to_orchestrator_error(err: ValidationError) -> OrchestratorError {
    match err {
        ValidationError::InvalidToolName(_) | ValidationError::InvalidParams(_) | ValidationError::InvalidToolDef(_) => {
            OrchestratorError::invalid_params(err.to_string())
        }
        ValidationError::InvalidMethod(_) => OrchestratorError::method_not_found(err.to_string()),
        ValidationError::InvalidEnvelope(_) | ValidationError::InvalidId => OrchestratorError::invalid_request(err.to_string()),
    }
}

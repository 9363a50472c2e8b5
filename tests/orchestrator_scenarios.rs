// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! End-to-end scenarios exercising dispatch through `Orchestrator` with a
//! real HTTP agent (`mockito`) standing in for a discovered container.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use mcp_orchestrator::application::hardening::{Hardening, HardeningConfig};
use mcp_orchestrator::application::orchestrator::Orchestrator;
use mcp_orchestrator::application::policy::ToolPolicy;
use mcp_orchestrator::domain::agent::{Agent, AgentId, AgentStatus, Connection, Protocol};
use mcp_orchestrator::domain::jsonrpc::{error_codes, JsonRpcRequest};
use mcp_orchestrator::infrastructure::discovery::{Discovery, DiscoveryConfig};
use mcp_orchestrator::infrastructure::event_bus::EventBus;
use mcp_orchestrator::infrastructure::registry::{Registry, RegistryConfig};
use mcp_orchestrator::infrastructure::router::{Router, RouterConfig};
use serde_json::{json, Value};

fn agent_at(url: &str) -> Agent {
    let now = Utc::now();
    let mut connection = Connection::new(Protocol::Http, "127.0.0.1", 0);
    connection.url = url.to_string();
    Agent {
        id: AgentId::new("agent-1"),
        name: "echo-agent".to_string(),
        image: "agents/echo".to_string(),
        container_status: "running".to_string(),
        labels: HashMap::new(),
        connection,
        tools: Vec::new(),
        status: AgentStatus::Active,
        discovered_at: now,
        last_seen: now,
    }
}

fn test_discovery() -> Arc<Discovery> {
    let docker = bollard::Docker::connect_with_unix("/tmp/mcp-orchestrator-test.sock", 120, bollard::API_DEFAULT_VERSION)
        .expect("client construction does not touch the socket");
    Arc::new(Discovery::new(docker, DiscoveryConfig::default(), EventBus::new()))
}

fn orchestrator_with(registry: Arc<Registry>, hardening: Arc<Hardening>) -> Orchestrator {
    let router = Arc::new(Router::new(RouterConfig::default()));
    Orchestrator::new(registry, router, hardening, EventBus::new(), test_discovery(), ToolPolicy::default())
}

/// S1 — with no agents registered, `tools/list` is empty and a `tools/call`
/// against any name is a method-not-found error, not a crash.
#[tokio::test]
async fn no_agents_yields_empty_catalog_and_method_not_found() {
    let registry = Arc::new(Registry::new(RegistryConfig::default()));
    let hardening = Arc::new(Hardening::new(HardeningConfig::default(), EventBus::new()));
    let orchestrator = orchestrator_with(registry, hardening);

    let list = orchestrator.dispatch(JsonRpcRequest::new(Value::from(1), "tools/list", None)).await;
    assert_eq!(list.result.unwrap()["tools"], json!([]));

    let call = orchestrator
        .dispatch(JsonRpcRequest::new(Value::from(2), "tools/call", Some(json!({"name": "anything"}))))
        .await;
    assert_eq!(call.error.unwrap().code, error_codes::METHOD_NOT_FOUND);
}

/// S2 — a single onboarded agent with two registered tools: both show up in
/// `tools/list`, and `tools/call` routes to the agent and returns its result.
#[tokio::test]
async fn single_agent_two_tools_list_and_call() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/mcp")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"jsonrpc":"2.0","id":"x","result":{"echoed":true}}"#)
        .create_async()
        .await;

    let registry = Arc::new(Registry::new(RegistryConfig::default()));
    let agent = agent_at(&server.url());
    registry.upsert_agent(agent.clone());
    registry.register_tool(&agent.id, "echo", "echoes input", None);
    registry.register_tool(&agent.id, "reverse", "reverses input", None);

    let hardening = Arc::new(Hardening::new(HardeningConfig::default(), EventBus::new()));
    let orchestrator = orchestrator_with(registry, hardening);

    let list = orchestrator.dispatch(JsonRpcRequest::new(Value::from(1), "tools/list", None)).await;
    let tools = list.result.unwrap()["tools"].as_array().unwrap().len();
    assert_eq!(tools, 2);

    let call = orchestrator
        .dispatch(JsonRpcRequest::new(
            Value::from(2),
            "tools/call",
            Some(json!({"name": "echo", "arguments": {"text": "hi"}})),
        ))
        .await;
    assert_eq!(call.result.unwrap()["echoed"], true);
    mock.assert_async().await;
}

/// S3 — calling a name that was never registered by any agent is
/// method-not-found, distinct from an agent-side error.
#[tokio::test]
async fn unknown_tool_name_is_method_not_found() {
    let registry = Arc::new(Registry::new(RegistryConfig::default()));
    registry.upsert_agent(agent_at("http://127.0.0.1:1"));
    registry.register_tool(&AgentId::new("agent-1"), "echo", "echoes", None);

    let hardening = Arc::new(Hardening::new(HardeningConfig::default(), EventBus::new()));
    let orchestrator = orchestrator_with(registry, hardening);

    let call = orchestrator
        .dispatch(JsonRpcRequest::new(Value::from(1), "tools/call", Some(json!({"name": "missing"}))))
        .await;
    assert_eq!(call.error.unwrap().code, error_codes::METHOD_NOT_FOUND);
}

/// S4 — an agent that never responds trips the hardening layer's deadline;
/// the caller gets a timeout error rather than hanging indefinitely.
#[tokio::test]
async fn unresponsive_agent_times_out() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            if let Ok((socket, _)) = listener.accept().await {
                // Accept and hold the connection open without responding.
                std::mem::forget(socket);
            }
        }
    });

    let registry = Arc::new(Registry::new(RegistryConfig::default()));
    let agent = agent_at(&format!("http://127.0.0.1:{port}"));
    registry.upsert_agent(agent.clone());
    registry.register_tool(&agent.id, "slow", "never answers", None);

    let mut hardening_config = HardeningConfig::default();
    hardening_config.default_timeout_ms = 100;
    let hardening = Arc::new(Hardening::new(hardening_config, EventBus::new()));
    let orchestrator = orchestrator_with(registry, hardening);

    let call = orchestrator
        .dispatch(JsonRpcRequest::new(Value::from(1), "tools/call", Some(json!({"name": "slow"}))))
        .await;
    assert_eq!(call.error.unwrap().code, error_codes::TIMEOUT);
}

/// S5 — repeated failures open the circuit breaker; once open, further calls
/// fail fast as service-unavailable without reaching the agent.
#[tokio::test]
async fn repeated_failures_open_the_breaker_and_reject_fast() {
    let mut server = mockito::Server::new_async().await;
    let mock = server.mock("POST", "/mcp").with_status(500).expect(2).create_async().await;

    let registry = Arc::new(Registry::new(RegistryConfig::default()));
    let agent = agent_at(&server.url());
    registry.upsert_agent(agent.clone());
    registry.register_tool(&agent.id, "flaky", "fails a lot", None);

    let mut router_config = RouterConfig::default();
    router_config.retry_attempts = 0;
    router_config.retry_delay = Duration::from_millis(1);
    let router = Arc::new(Router::new(router_config));

    let mut hardening_config = HardeningConfig::default();
    hardening_config.circuit_breaker_threshold = 2;
    let hardening = Arc::new(Hardening::new(hardening_config, EventBus::new()));

    let orchestrator = Orchestrator::new(registry, router, hardening, EventBus::new(), test_discovery(), ToolPolicy::default());

    for _ in 0..2 {
        let call = orchestrator
            .dispatch(JsonRpcRequest::new(Value::from(1), "tools/call", Some(json!({"name": "flaky"}))))
            .await;
        assert!(call.error.is_some());
    }

    let call = orchestrator
        .dispatch(JsonRpcRequest::new(Value::from(1), "tools/call", Some(json!({"name": "flaky"}))))
        .await;
    assert_eq!(call.error.unwrap().code, error_codes::SERVICE_UNAVAILABLE);
    mock.assert_async().await;
}

/// S6 — once an agent is removed from the registry (simulating discovery
/// observing its container gone), its tools stop resolving.
#[tokio::test]
async fn agent_loss_retires_its_tools() {
    let registry = Arc::new(Registry::new(RegistryConfig::default()));
    let agent = agent_at("http://127.0.0.1:1");
    registry.upsert_agent(agent.clone());
    registry.register_tool(&agent.id, "echo", "echoes", None);

    let hardening = Arc::new(Hardening::new(HardeningConfig::default(), EventBus::new()));
    let orchestrator = orchestrator_with(registry.clone(), hardening);

    let before = orchestrator.dispatch(JsonRpcRequest::new(Value::from(1), "tools/list", None)).await;
    assert_eq!(before.result.unwrap()["tools"].as_array().unwrap().len(), 1);

    registry.remove_agent(&agent.id);

    let after = orchestrator.dispatch(JsonRpcRequest::new(Value::from(2), "tools/list", None)).await;
    assert_eq!(after.result.unwrap()["tools"], json!([]));

    let call = orchestrator
        .dispatch(JsonRpcRequest::new(Value::from(3), "tools/call", Some(json!({"name": "echo"}))))
        .await;
    assert_eq!(call.error.unwrap().code, error_codes::METHOD_NOT_FOUND);
}

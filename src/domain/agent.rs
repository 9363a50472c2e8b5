// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Agent aggregate: a discovered container running an MCP-speaking process.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::tool::ToolDefinition;

/// Stable identifier for an agent: the owning container's platform id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(container_id: impl Into<String>) -> Self {
        Self(container_id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `mcp.server.protocol` label value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn from_label(value: &str) -> Self {
        match value {
            "https" => Protocol::Https,
            _ => Protocol::Http,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

/// Where to reach the agent's MCP endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
    pub url: String,
}

impl Connection {
    pub fn new(protocol: Protocol, host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        let url = format!("{}://{}:{}", protocol.as_str(), host, port);
        Self { protocol, host, port, url }
    }
}

/// Lifecycle status of an agent as tracked by the orchestrator.
///
/// `Inactive` is sticky until the next discovery cycle re-observes the
/// agent's container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Active,
    Inactive,
}

/// An agent: an independently deployed container exposing MCP tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub image: String,
    pub container_status: String,
    pub labels: HashMap<String, String>,
    pub connection: Connection,
    pub tools: Vec<ToolDefinition>,
    pub status: AgentStatus,
    pub discovered_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl Agent {
    pub fn mark_seen(&mut self) {
        self.last_seen = Utc::now();
    }
}

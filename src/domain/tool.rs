// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Tool-definition and tool-index value objects.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::agent::AgentId;

static TOOL_NAME_RE: OnceLock<Regex> = OnceLock::new();

fn tool_name_re() -> &'static Regex {
    TOOL_NAME_RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("valid regex"))
}

/// An agent-declared tool, as returned from that agent's `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema", skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}

impl ToolDefinition {
    /// Tool names must match `^[a-zA-Z0-9_-]+$`.
    pub fn is_valid_name(name: &str) -> bool {
        !name.is_empty() && tool_name_re().is_match(name)
    }

    /// Substitute a permissive default schema when the agent declared none.
    pub fn schema_or_default(&self) -> Value {
        self.input_schema
            .clone()
            .unwrap_or_else(|| json!({ "type": "object", "properties": {}, "required": [] }))
    }
}

/// An entry in the orchestrator's tool-index: which agent owns a tool name.
///
/// First agent to register a tool name wins for the lifetime of that agent.
/// Enforced by the registrar, not this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolIndexEntry {
    pub agent_id: AgentId,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Option<Value>,
}

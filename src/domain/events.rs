// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain events published on the orchestrator's event bus.

use serde::{Deserialize, Serialize};

use super::agent::Agent;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OrchestratorEvent {
    AgentDiscovered { agent: Box<Agent> },
    AgentLost { agent_id: String },
    CircuitBreakerOpened { agent_id: String },
    ToolCallCompleted {
        tool_name: String,
        agent_id: String,
        success: bool,
        error: Option<String>,
    },
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! In-memory agent/tool index with JSON-file persistence.
//!
//! State lives in `DashMap`s for lock-free concurrent reads from HTTP
//! handlers; persistence snapshots the maps to disk with a
//! write-temp-then-rename so a crash mid-write never corrupts the file on
//! disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, warn};

use crate::domain::agent::{Agent, AgentId, AgentStatus};
use crate::domain::error_log::{ErrorLog, ErrorLogEntry};
use crate::domain::module_status::ModuleStatus;
use crate::domain::tool::ToolIndexEntry;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("io error persisting {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Where the registry's snapshot files live and how many error entries to
/// retain.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub state_dir: PathBuf,
    pub max_error_log_entries: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { state_dir: PathBuf::from("./state"), max_error_log_entries: 1000 }
    }
}

/// Disk snapshot of the agent/tool-ownership table. Connection and tool
/// catalog are re-derived on next discovery, so only the durable facts are
/// persisted.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PluginsSnapshot {
    agents: Vec<Agent>,
    tool_index: HashMap<String, ToolIndexEntry>,
}

/// Owns the orchestrator's durable-ish state: known agents, the
/// name -> agent tool index (first-registration wins), per-agent
/// health, and the bounded error log.
pub struct Registry {
    config: RegistryConfig,
    agents: DashMap<AgentId, Agent>,
    tool_index: DashMap<String, ToolIndexEntry>,
    module_status: DashMap<AgentId, ModuleStatus>,
    error_log: Mutex<ErrorLog>,
}

impl Registry {
    pub fn new(config: RegistryConfig) -> Self {
        let max_error_log_entries = config.max_error_log_entries;
        Self {
            config,
            agents: DashMap::new(),
            tool_index: DashMap::new(),
            module_status: DashMap::new(),
            error_log: Mutex::new(ErrorLog::new(max_error_log_entries)),
        }
    }

    // -- agents --------------------------------------------------------

    pub fn upsert_agent(&self, agent: Agent) {
        self.module_status.entry(agent.id.clone()).or_default();
        self.agents.insert(agent.id.clone(), agent);
    }

    pub fn remove_agent(&self, agent_id: &AgentId) {
        self.agents.remove(agent_id);
        self.module_status.remove(agent_id);
        self.tool_index.retain(|_, entry| &entry.agent_id != agent_id);
    }

    /// `agentLost`: mark the agent inactive and free its tool names, but keep
    /// the agent record itself so a later re-discovery can bring it back to
    /// `active` rather than treating it as brand new.
    pub fn mark_inactive(&self, agent_id: &AgentId) {
        if let Some(mut agent) = self.agents.get_mut(agent_id) {
            agent.status = AgentStatus::Inactive;
        }
        self.tool_index.retain(|_, entry| &entry.agent_id != agent_id);
    }

    pub fn get_agent(&self, agent_id: &AgentId) -> Option<Agent> {
        self.agents.get(agent_id).map(|a| a.clone())
    }

    pub fn agents(&self) -> Vec<Agent> {
        self.agents.iter().map(|a| a.value().clone()).collect()
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    // -- tool index ------------------------------------------------------

    /// Register `tool` for `agent_id`. First-wins: does nothing if the name
    /// is already owned by a different agent.
    pub fn register_tool(&self, agent_id: &AgentId, name: &str, description: &str, input_schema: Option<serde_json::Value>) {
        self.tool_index.entry(name.to_string()).or_insert_with(|| ToolIndexEntry {
            agent_id: agent_id.clone(),
            description: description.to_string(),
            input_schema,
        });
    }

    pub fn lookup_tool(&self, name: &str) -> Option<ToolIndexEntry> {
        self.tool_index.get(name).map(|e| e.clone())
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tool_index.iter().map(|e| e.key().clone()).collect()
    }

    pub fn tool_count(&self) -> usize {
        self.tool_index.len()
    }

    // -- health ----------------------------------------------------------

    pub fn record_health(&self, agent_id: &AgentId, success: bool, response_ms: u64) {
        self.module_status.entry(agent_id.clone()).or_default().record(success, response_ms);
    }

    pub fn module_status(&self, agent_id: &AgentId) -> Option<ModuleStatus> {
        self.module_status.get(agent_id).map(|s| s.clone())
    }

    pub fn all_module_status(&self) -> HashMap<AgentId, ModuleStatus> {
        self.module_status.iter().map(|e| (e.key().clone(), e.value().clone())).collect()
    }

    // -- error log --------------------------------------------------------

    pub async fn log_error(&self, entry: ErrorLogEntry) {
        self.error_log.lock().await.push(entry);
    }

    pub async fn recent_errors(&self) -> Vec<ErrorLogEntry> {
        self.error_log.lock().await.to_vec()
    }

    // -- persistence -------------------------------------------------------

    /// Snapshot agents and the tool index to `<state_dir>/plugins.json` and
    /// per-agent health to `<state_dir>/module-status.json`.
    pub async fn persist(&self) -> Result<(), RegistryError> {
        tokio::fs::create_dir_all(&self.config.state_dir)
            .await
            .map_err(|source| RegistryError::Io { path: self.config.state_dir.clone(), source })?;

        let snapshot = PluginsSnapshot {
            agents: self.agents(),
            tool_index: self.tool_index.iter().map(|e| (e.key().clone(), e.value().clone())).collect(),
        };
        write_json(&self.config.state_dir.join("plugins.json"), &snapshot).await?;

        let statuses: HashMap<String, ModuleStatus> =
            self.all_module_status().into_iter().map(|(id, s)| (id.to_string(), s)).collect();
        write_json(&self.config.state_dir.join("module-status.json"), &statuses).await?;

        let errors = self.error_log.lock().await.to_vec();
        write_json(&self.config.state_dir.join("error-log.json"), &errors).await?;

        Ok(())
    }

    /// Restore agents and the tool index from `<state_dir>/plugins.json`,
    /// if present. Absence is not an error: a first boot has nothing to load.
    pub async fn restore(&self) -> Result<(), RegistryError> {
        let path = self.config.state_dir.join("plugins.json");
        match read_json::<PluginsSnapshot>(&path).await {
            Ok(Some(snapshot)) => {
                for agent in snapshot.agents {
                    self.agents.insert(agent.id.clone(), agent);
                }
                for (name, entry) in snapshot.tool_index {
                    self.tool_index.insert(name, entry);
                }
            }
            Ok(None) => {}
            Err(err) => warn!(error = %err, "failed to restore registry snapshot, starting empty"),
        }
        Ok(())
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), RegistryError> {
    let body = serde_json::to_vec_pretty(value)?;
    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, &body)
        .await
        .map_err(|source| RegistryError::Io { path: tmp_path.clone(), source })?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|source| RegistryError::Io { path: path.to_path_buf(), source })?;
    Ok(())
}

async fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, RegistryError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => {
            error!(path = %path.display(), error = %source, "failed reading registry snapshot");
            Err(RegistryError::Io { path: path.to_path_buf(), source })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::{AgentStatus, Connection, Protocol};
    use chrono::Utc;

    fn agent(id: &str) -> Agent {
        let now = Utc::now();
        Agent {
            id: AgentId::new(id),
            name: id.to_string(),
            image: "agents/test".to_string(),
            container_status: "running".to_string(),
            labels: HashMap::new(),
            connection: Connection::new(Protocol::Http, "localhost", 3000),
            tools: Vec::new(),
            status: AgentStatus::Active,
            discovered_at: now,
            last_seen: now,
        }
    }

    #[test]
    fn first_registration_wins_tool_name() {
        let registry = Registry::new(RegistryConfig::default());
        registry.register_tool(&AgentId::new("a1"), "echo", "first", None);
        registry.register_tool(&AgentId::new("a2"), "echo", "second", None);
        let entry = registry.lookup_tool("echo").unwrap();
        assert_eq!(entry.agent_id, AgentId::new("a1"));
        assert_eq!(entry.description, "first");
    }

    #[test]
    fn removing_agent_frees_its_tool_names() {
        let registry = Registry::new(RegistryConfig::default());
        let id = AgentId::new("a1");
        registry.upsert_agent(agent("a1"));
        registry.register_tool(&id, "echo", "d", None);
        registry.remove_agent(&id);
        assert!(registry.lookup_tool("echo").is_none());
        assert_eq!(registry.agent_count(), 0);
    }

    #[test]
    fn marking_inactive_frees_tool_names_but_keeps_the_agent() {
        let registry = Registry::new(RegistryConfig::default());
        let id = AgentId::new("a1");
        registry.upsert_agent(agent("a1"));
        registry.register_tool(&id, "echo", "d", None);

        registry.mark_inactive(&id);

        assert!(registry.lookup_tool("echo").is_none());
        let restored = registry.get_agent(&id).unwrap();
        assert_eq!(restored.status, AgentStatus::Inactive);
        assert_eq!(registry.agent_count(), 1);
    }

    #[tokio::test]
    async fn persist_then_restore_round_trips_agents_and_tools() {
        let dir = tempfile::tempdir().unwrap();
        let config = RegistryConfig { state_dir: dir.path().to_path_buf(), max_error_log_entries: 10 };

        let registry = Registry::new(config.clone());
        registry.upsert_agent(agent("a1"));
        registry.register_tool(&AgentId::new("a1"), "echo", "echoes", None);
        registry.persist().await.unwrap();

        let restored = Registry::new(config);
        restored.restore().await.unwrap();
        assert_eq!(restored.agent_count(), 1);
        assert!(restored.lookup_tool("echo").is_some());
    }

    #[tokio::test]
    async fn restore_without_existing_file_leaves_registry_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = RegistryConfig { state_dir: dir.path().to_path_buf(), max_error_log_entries: 10 };
        let registry = Registry::new(config);
        registry.restore().await.unwrap();
        assert_eq!(registry.agent_count(), 0);
    }
}

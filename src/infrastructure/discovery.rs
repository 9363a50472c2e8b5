// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Periodic container-platform scan for MCP agent containers.
//!
//! Uses `bollard` for container enumeration/inspection and runs as a single
//! non-reentrant periodic task — no per-tick task spawning, so at most one
//! scan is ever in flight.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Duration;

use bollard::container::{InspectContainerOptions, ListContainersOptions};
use bollard::Docker;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::domain::agent::{Agent, AgentId, AgentStatus, Connection, Protocol};
use crate::domain::events::OrchestratorEvent;
use crate::infrastructure::event_bus::EventBus;

const MCP_LABEL: &str = "mcp.server";
const MCP_NAME_LABEL: &str = "mcp.server.name";
const MCP_PORT_LABEL: &str = "mcp.server.port";
const MCP_PROTOCOL_LABEL: &str = "mcp.server.protocol";
const DEFAULT_PORT: &str = "3000";

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("container platform error: {0}")]
    Platform(#[from] bollard::errors::Error),
}

/// Discovery scan cadence and platform-command retry policy.
#[derive(Debug, Clone, Copy)]
pub struct DiscoveryConfig {
    pub interval: Duration,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(30_000),
            retry_attempts: 10,
            retry_delay: Duration::from_millis(3_000),
        }
    }
}

pub struct Discovery {
    docker: Docker,
    config: DiscoveryConfig,
    event_bus: EventBus,
    known: Mutex<HashMap<AgentId, Agent>>,
}

impl Discovery {
    pub fn new(docker: Docker, config: DiscoveryConfig, event_bus: EventBus) -> Self {
        Self { docker, config, event_bus, known: Mutex::new(HashMap::new()) }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Run the periodic scan loop until `shutdown` fires. A single task owns
    /// this loop, so at most one scan is ever in flight: the next tick
    /// cannot start before `scan_once` returns.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.scan_once().await {
                        warn!(error = %err, "discovery scan failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("discovery loop shutting down");
                        return;
                    }
                }
            }
        }
    }

    /// One full enumerate -> inspect -> diff -> emit cycle. Returns the
    /// agents newly observed this cycle (not previously known).
    pub async fn scan_once(&self) -> Result<Vec<Agent>, DiscoveryError> {
        let mut filters = HashMap::new();
        filters.insert("label".to_string(), vec![format!("{MCP_LABEL}=true")]);
        let options = ListContainersOptions::<String> { all: false, filters, ..Default::default() };

        let summaries = with_retries(self.config.retry_attempts, self.config.retry_delay, || {
            self.docker.list_containers(Some(options.clone()))
        })
        .await?;

        let mut observed = HashSet::new();
        let mut discovered = Vec::new();
        let mut known = self.known.lock().await;

        for summary in summaries {
            let Some(id) = summary.id.clone() else { continue };
            let agent_id = AgentId::new(id.clone());

            let inspect = with_retries(self.config.retry_attempts, self.config.retry_delay, || {
                self.docker.inspect_container(&id, None::<InspectContainerOptions>)
            })
            .await?;

            let agent = build_agent(&agent_id, &summary, &inspect);
            observed.insert(agent_id.clone());

            match known.get_mut(&agent_id) {
                Some(existing) => {
                    existing.mark_seen();
                    existing.container_status = agent.container_status.clone();
                }
                None => {
                    info!(agent_id = %agent_id, name = %agent.name, "agent discovered");
                    known.insert(agent_id.clone(), agent.clone());
                    discovered.push(agent.clone());
                    self.event_bus
                        .publish(OrchestratorEvent::AgentDiscovered { agent: Box::new(agent) });
                }
            }
        }

        let lost: Vec<AgentId> = known.keys().filter(|id| !observed.contains(id)).cloned().collect();
        for agent_id in lost {
            known.remove(&agent_id);
            info!(agent_id = %agent_id, "agent lost");
            self.event_bus
                .publish(OrchestratorEvent::AgentLost { agent_id: agent_id.to_string() });
        }

        Ok(discovered)
    }
}

fn build_agent(
    agent_id: &AgentId,
    summary: &bollard::models::ContainerSummary,
    inspect: &bollard::models::ContainerInspectResponse,
) -> Agent {
    let labels = summary.labels.clone().unwrap_or_default();

    let name = labels
        .get(MCP_NAME_LABEL)
        .cloned()
        .or_else(|| summary.names.as_ref().and_then(|n| n.first()).map(|n| n.trim_start_matches('/').to_string()))
        .unwrap_or_else(|| agent_id.to_string());

    let declared_port: u16 = labels
        .get(MCP_PORT_LABEL)
        .map(|s| s.as_str())
        .unwrap_or(DEFAULT_PORT)
        .parse()
        .unwrap_or(3000);

    let protocol = Protocol::from_label(labels.get(MCP_PROTOCOL_LABEL).map(|s| s.as_str()).unwrap_or("http"));

    let host_port = resolve_host_port(inspect, declared_port).unwrap_or(declared_port);

    let image = summary.image.clone().unwrap_or_default();
    let container_status = summary.status.clone().unwrap_or_default();
    let now = Utc::now();

    Agent {
        id: agent_id.clone(),
        name,
        image,
        container_status,
        labels,
        connection: Connection::new(protocol, "localhost", host_port),
        tools: Vec::new(),
        status: AgentStatus::Active,
        discovered_at: now,
        last_seen: now,
    }
}

/// If the platform's port map exposes `0.0.0.0:<hostPort> -> <declaredPort>/tcp`,
/// use `hostPort` — the declared port may not be reachable directly when the
/// platform remaps it.
fn resolve_host_port(inspect: &bollard::models::ContainerInspectResponse, declared_port: u16) -> Option<u16> {
    let ports = inspect.network_settings.as_ref()?.ports.as_ref()?;
    let key = format!("{declared_port}/tcp");
    let bindings = ports.get(&key)?.as_ref()?;

    bindings
        .iter()
        .find(|b| b.host_ip.as_deref() == Some("0.0.0.0"))
        .or_else(|| bindings.first())
        .and_then(|b| b.host_port.as_ref())
        .and_then(|p| p.parse().ok())
}

/// Bounded retries with linear-by-attempt backoff, for transient socket
/// contention common in rootless daemons.
async fn with_retries<T, E, F, Fut>(attempts: u32, delay: Duration, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if attempt >= attempts {
                    return Err(err);
                }
                tokio::time::sleep(delay * attempt).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::{ContainerSummary, PortMap};
    use std::collections::HashMap as StdHashMap;

    fn summary_with_labels(id: &str, labels: StdHashMap<String, String>) -> ContainerSummary {
        ContainerSummary {
            id: Some(id.to_string()),
            names: Some(vec![format!("/{id}")]),
            image: Some("agents/echo:latest".to_string()),
            status: Some("running".to_string()),
            labels: Some(labels),
            ..Default::default()
        }
    }

    #[test]
    fn build_agent_uses_name_label_and_default_port() {
        let mut labels = StdHashMap::new();
        labels.insert(MCP_LABEL.to_string(), "true".to_string());
        labels.insert(MCP_NAME_LABEL.to_string(), "echo-agent".to_string());
        let summary = summary_with_labels("abc123", labels);
        let inspect = bollard::models::ContainerInspectResponse::default();

        let agent = build_agent(&AgentId::new("abc123"), &summary, &inspect);
        assert_eq!(agent.name, "echo-agent");
        assert_eq!(agent.connection.port, 3000);
        assert_eq!(agent.connection.url, "http://localhost:3000");
        assert_eq!(agent.status, AgentStatus::Active);
    }

    #[test]
    fn build_agent_falls_back_to_container_name() {
        let labels = StdHashMap::new();
        let summary = summary_with_labels("abc123", labels);
        let inspect = bollard::models::ContainerInspectResponse::default();

        let agent = build_agent(&AgentId::new("abc123"), &summary, &inspect);
        assert_eq!(agent.name, "abc123");
    }

    #[test]
    fn resolve_host_port_prefers_0_0_0_0_binding() {
        let mut ports = PortMap::new();
        ports.insert(
            "3000/tcp".to_string(),
            Some(vec![bollard::models::PortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some("49213".to_string()),
            }]),
        );
        let mut inspect = bollard::models::ContainerInspectResponse::default();
        inspect.network_settings = Some(bollard::models::NetworkSettings { ports: Some(ports), ..Default::default() });

        assert_eq!(resolve_host_port(&inspect, 3000), Some(49213));
    }

    #[tokio::test]
    async fn retries_until_success() {
        let attempts = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
        let attempts_clone = attempts.clone();
        let result: Result<(), &'static str> = with_retries(5, Duration::from_millis(1), move || {
            let attempts = attempts_clone.clone();
            async move {
                let n = attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                if n < 2 {
                    Err("transient")
                } else {
                    Ok(())
                }
            }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 3);
    }
}

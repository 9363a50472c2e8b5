// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Timeout, retry-with-backoff, circuit-breaker, and error-stat hardening.
//!
//! Per-agent breaker state is a single [`CircuitBreaker`] guarded by one
//! `DashMap` shard lock; the lock is never held across an `.await` of the
//! wrapped operation.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::agent::AgentId;
use crate::domain::circuit_breaker::{Admission, CircuitBreaker};
use crate::domain::events::OrchestratorEvent;
use crate::domain::mcp_error::OrchestratorError;
use crate::infrastructure::event_bus::EventBus;

/// Hardening defaults.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HardeningConfig {
    pub default_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub circuit_breaker_threshold: u32,
    pub circuit_breaker_timeout_ms: u64,
}

impl Default for HardeningConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 30_000,
            max_retries: 3,
            retry_delay_ms: 1_000,
            circuit_breaker_threshold: 5,
            circuit_breaker_timeout_ms: 60_000,
        }
    }
}

/// Substring-matched error categories. Used only for stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Timeout,
    Connection,
    Parse,
    Validation,
    NotFound,
    Unknown,
}

impl ErrorCategory {
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("timeout") || lower.contains("timed out") {
            ErrorCategory::Timeout
        } else if lower.contains("connection") {
            ErrorCategory::Connection
        } else if lower.contains("parse") {
            ErrorCategory::Parse
        } else if lower.contains("validation") {
            ErrorCategory::Validation
        } else if lower.contains("not_found") || lower.contains("not found") {
            ErrorCategory::NotFound
        } else {
            ErrorCategory::Unknown
        }
    }
}

/// Hardening layer: owns per-agent circuit breakers and error-category stats.
pub struct Hardening {
    config: HardeningConfig,
    breakers: Arc<DashMap<AgentId, CircuitBreaker>>,
    error_stats: Arc<DashMap<ErrorCategory, u64>>,
    event_bus: EventBus,
}

impl Hardening {
    pub fn new(config: HardeningConfig, event_bus: EventBus) -> Self {
        Self {
            config,
            breakers: Arc::new(DashMap::new()),
            error_stats: Arc::new(DashMap::new()),
            event_bus,
        }
    }

    pub fn config(&self) -> &HardeningConfig {
        &self.config
    }

    pub fn error_stats(&self) -> HashMap<ErrorCategory, u64> {
        self.error_stats.iter().map(|e| (*e.key(), *e.value())).collect()
    }

    /// Explicit breaker reset; there is no automatic decay back to closed.
    pub fn reset_breaker(&self, agent_id: &AgentId) {
        self.breakers.remove(agent_id);
    }

    pub fn breaker_snapshot(&self, agent_id: &AgentId) -> Option<CircuitBreaker> {
        self.breakers.get(agent_id).map(|b| b.clone())
    }

    fn record_category(&self, message: &str) {
        let category = ErrorCategory::classify(message);
        *self.error_stats.entry(category).or_insert(0) += 1;
    }

    /// Gate a call on `agent_id`'s breaker without holding the lock across `op`.
    fn admit(&self, agent_id: &AgentId) -> Admission {
        let timeout = chrono::Duration::milliseconds(self.config.circuit_breaker_timeout_ms as i64);
        let now = Utc::now();
        let mut breaker = self.breakers.entry(agent_id.clone()).or_default();
        breaker.admit(timeout, now)
    }

    fn on_success(&self, agent_id: &AgentId) {
        let now = Utc::now();
        let mut breaker = self.breakers.entry(agent_id.clone()).or_default();
        breaker.record_success(now);
    }

    /// Returns `true` if this failure just opened the breaker. Publishes
    /// `circuitBreakerOpened` in that case.
    fn on_failure(&self, agent_id: &AgentId) -> bool {
        let now = Utc::now();
        let opened = {
            let mut breaker = self.breakers.entry(agent_id.clone()).or_default();
            breaker.record_failure(self.config.circuit_breaker_threshold, now)
        };
        if opened {
            self.event_bus
                .publish(OrchestratorEvent::CircuitBreakerOpened { agent_id: agent_id.to_string() });
        }
        opened
    }

    /// Breaker-gate + hard deadline + stat recording around `op`.
    /// `agent_id` is `None` for internal housekeeping calls that have no
    /// per-agent breaker (the breaker gate is then skipped entirely).
    pub async fn safe_tool_call<T, F, Fut>(
        &self,
        op: F,
        timeout_ms: u64,
        agent_id: Option<&AgentId>,
    ) -> Result<T, OrchestratorError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, OrchestratorError>>,
    {
        if let Some(agent_id) = agent_id {
            if self.admit(agent_id) == Admission::Reject {
                let message = "circuit breaker open";
                self.record_category(message);
                return Err(OrchestratorError::service_unavailable(
                    message,
                    Some(agent_id.to_string()),
                ));
            }
        }

        let result = tokio::time::timeout(Duration::from_millis(timeout_ms), op()).await;

        let outcome = match result {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(OrchestratorError::timeout(
                timeout_ms,
                agent_id.map(|a| a.to_string()),
            )),
        };

        match &outcome {
            Ok(_) => {
                if let Some(agent_id) = agent_id {
                    self.on_success(agent_id);
                }
            }
            Err(err) => {
                self.record_category(&err.message);
                if let Some(agent_id) = agent_id {
                    if self.on_failure(agent_id) {
                        warn!(agent_id = %agent_id, "circuit breaker opened");
                    }
                }
            }
        }

        outcome
    }

    /// Up to `max_retries + 1` attempts with exponential backoff
    /// (`retry_delay * 2^(attempt-1)`), each attempt routed through
    /// [`Self::safe_tool_call`] so the breaker observes every attempt.
    /// Reserved for internal housekeeping paths — `tools/call` itself does
    /// not enable this retry layer, since it composes multiplicatively with
    /// the router's own linear retry and would multiply worst-case latency.
    pub async fn safe_async_operation<T, F, Fut>(
        &self,
        mut op: F,
        max_retries: u32,
        retry_delay_ms: u64,
        timeout_ms: u64,
        agent_id: Option<&AgentId>,
    ) -> Result<T, OrchestratorError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, OrchestratorError>>,
    {
        let mut attempt = 0u32;
        loop {
            let outcome = self.safe_tool_call(|| op(), timeout_ms, agent_id).await;
            match outcome {
                Ok(value) => return Ok(value),
                Err(err) if attempt < max_retries => {
                    attempt += 1;
                    let delay = retry_delay_ms.saturating_mul(1u64 << (attempt - 1).min(16));
                    warn!(attempt, delay_ms = delay, error = %err, "retrying after failure");
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

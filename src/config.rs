// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Process configuration: a `clap::Parser` struct reading `env = "..."`
//! variables with defaults.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::application::hardening::HardeningConfig;
use crate::application::policy::ToolPolicy;
use crate::infrastructure::discovery::DiscoveryConfig;
use crate::infrastructure::registry::RegistryConfig;
use crate::infrastructure::router::RouterConfig;

#[derive(Parser, Debug, Clone)]
#[command(name = "mcp-orchestrator")]
#[command(version, about = "Discovers MCP agent containers and routes tool calls to them", long_about = None)]
pub struct Config {
    /// HTTP API host.
    #[arg(long, env = "ORCHESTRATOR_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// HTTP API port.
    #[arg(long, env = "ORCHESTRATOR_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Log level passed to the tracing `EnvFilter`.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Directory persisted snapshot files (`plugins.json`, `module-status.json`,
    /// `error-log.json`) are written to and restored from.
    #[arg(long, env = "REGISTRY_PATH", default_value = "./registry")]
    pub state_dir: PathBuf,

    /// Container-platform scan interval, in milliseconds.
    #[arg(long, env = "DISCOVERY_INTERVAL", default_value_t = 30_000)]
    pub discovery_interval_ms: u64,

    /// Attempts for platform commands (list/inspect containers) before giving up.
    #[arg(long, env = "DISCOVERY_RETRY_ATTEMPTS", default_value_t = 10)]
    pub discovery_retry_attempts: u32,

    /// Linear backoff unit for platform command retries, in milliseconds.
    #[arg(long, env = "DISCOVERY_RETRY_DELAY", default_value_t = 3_000)]
    pub discovery_retry_delay_ms: u64,

    /// Attempts per outbound JSON-RPC call to an agent before giving up.
    #[arg(long, env = "ROUTER_RETRY_ATTEMPTS", default_value_t = 3)]
    pub router_retry_attempts: u32,

    /// Linear backoff unit for outbound agent call retries, in milliseconds.
    #[arg(long, env = "ROUTER_RETRY_DELAY_MS", default_value_t = 500)]
    pub router_retry_delay_ms: u64,

    /// Per-request timeout to an agent, in milliseconds.
    #[arg(long, env = "ROUTER_REQUEST_TIMEOUT_MS", default_value_t = 10_000)]
    pub router_request_timeout_ms: u64,

    /// Default per-call deadline enforced by the hardening layer, in milliseconds.
    #[arg(long, env = "MCP_TIMEOUT", default_value_t = 30_000)]
    pub default_timeout_ms: u64,

    /// Consecutive failures before a per-agent circuit breaker opens.
    #[arg(long, env = "CIRCUIT_BREAKER_THRESHOLD", default_value_t = 5)]
    pub circuit_breaker_threshold: u32,

    /// How long a breaker stays open before admitting a half-open probe, in milliseconds.
    #[arg(long, env = "CIRCUIT_BREAKER_TIMEOUT_MS", default_value_t = 60_000)]
    pub circuit_breaker_timeout_ms: u64,

    /// Cap on retained bounded error-log entries.
    #[arg(long, env = "MAX_ERROR_LOG_ENTRIES", default_value_t = 1_000)]
    pub max_error_log_entries: usize,

    /// Tool names (or `"prefix.*"` wildcards) permitted through `tools/call`.
    /// Empty means every discovered tool is permitted.
    #[arg(long, env = "ALLOWED_TOOLS", value_delimiter = ',')]
    pub allowed_tools: Vec<String>,

    /// Tool names (or `"prefix.*"` wildcards) rejected by `tools/call`,
    /// overriding `allowed_tools`.
    #[arg(long, env = "DENIED_TOOLS", value_delimiter = ',')]
    pub denied_tools: Vec<String>,
}

impl Config {
    pub fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            interval: Duration::from_millis(self.discovery_interval_ms),
            retry_attempts: self.discovery_retry_attempts,
            retry_delay: Duration::from_millis(self.discovery_retry_delay_ms),
        }
    }

    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            retry_attempts: self.router_retry_attempts,
            retry_delay: Duration::from_millis(self.router_retry_delay_ms),
            request_timeout: Duration::from_millis(self.router_request_timeout_ms),
        }
    }

    pub fn hardening_config(&self) -> HardeningConfig {
        HardeningConfig {
            default_timeout_ms: self.default_timeout_ms,
            max_retries: self.router_retry_attempts,
            retry_delay_ms: self.router_retry_delay_ms,
            circuit_breaker_threshold: self.circuit_breaker_threshold,
            circuit_breaker_timeout_ms: self.circuit_breaker_timeout_ms,
        }
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig { state_dir: self.state_dir.clone(), max_error_log_entries: self.max_error_log_entries }
    }

    pub fn tool_policy(&self) -> ToolPolicy {
        ToolPolicy { allowed_tools: self.allowed_tools.clone(), denied_tools: self.denied_tools.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_with_no_args() {
        let config = Config::parse_from(["mcp-orchestrator"]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.discovery_retry_attempts, 10);
        assert!(config.allowed_tools.is_empty());
    }
}

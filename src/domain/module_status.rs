// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Per-agent health counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Unknown,
}

/// Running health counters for a single agent's module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleStatus {
    pub success_count: u64,
    pub failure_count: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub average_response_time_ms: f64,
    pub status: HealthStatus,
}

impl Default for ModuleStatus {
    fn default() -> Self {
        Self {
            success_count: 0,
            failure_count: 0,
            last_success: None,
            last_failure: None,
            average_response_time_ms: 0.0,
            status: HealthStatus::Unknown,
        }
    }
}

impl ModuleStatus {
    /// Record an outcome, updating the running mean of response time and the
    /// derived health status. `uptime()` is derived, not stored.
    pub fn record(&mut self, success: bool, response_ms: u64) {
        let total_before = self.success_count + self.failure_count;
        let total_after = total_before + 1;
        self.average_response_time_ms = ((self.average_response_time_ms * total_before as f64)
            + response_ms as f64)
            / total_after as f64;

        if success {
            self.success_count += 1;
            self.last_success = Some(Utc::now());
            self.status = HealthStatus::Healthy;
        } else {
            self.failure_count += 1;
            self.last_failure = Some(Utc::now());
            self.status = HealthStatus::Unhealthy;
        }
    }

    /// `successes / (successes + failures) * 100`, or `100.0` with no data yet.
    pub fn uptime(&self) -> f64 {
        let total = self.success_count + self.failure_count;
        if total == 0 {
            100.0
        } else {
            (self.success_count as f64 / total as f64) * 100.0
        }
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Bounded error log.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::agent::AgentId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub timestamp: DateTime<Utc>,
    pub agent_id: Option<AgentId>,
    pub tool: Option<String>,
    pub error_code: i32,
    pub message: String,
    pub correlation_id: String,
}

/// FIFO-capped error log. Default cap is 1000 entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorLog {
    entries: VecDeque<ErrorLogEntry>,
    capacity: usize,
}

impl ErrorLog {
    pub fn new(capacity: usize) -> Self {
        Self { entries: VecDeque::with_capacity(capacity.min(4096)), capacity }
    }

    pub fn push(&mut self, entry: ErrorLogEntry) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ErrorLogEntry> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<ErrorLogEntry> {
        self.entries.iter().cloned().collect()
    }
}

impl Default for ErrorLog {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(msg: &str) -> ErrorLogEntry {
        ErrorLogEntry {
            timestamp: Utc::now(),
            agent_id: None,
            tool: None,
            error_code: -32603,
            message: msg.to_string(),
            correlation_id: "err_1_abcdefghi".to_string(),
        }
    }

    #[test]
    fn drops_oldest_entry_on_overflow() {
        let mut log = ErrorLog::new(2);
        log.push(entry("a"));
        log.push(entry("b"));
        log.push(entry("c"));
        assert_eq!(log.len(), 2);
        let messages: Vec<_> = log.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["b", "c"]);
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Orchestrator-side tool allow/deny gate, checked before a `tools/call` is
//! routed to its owning agent. Coarse name-based filtering only — no
//! filesystem/network/rate-limit policy, which stays out of scope here.

use serde::{Deserialize, Serialize};

/// Prefix-wildcard (`"foo.*"`) tool-name allow/deny list. An empty allowlist
/// permits every name; the denylist always overrides the allowlist.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolPolicy {
    pub allowed_tools: Vec<String>,
    pub denied_tools: Vec<String>,
}

impl ToolPolicy {
    fn matches(patterns: &[String], tool_name: &str) -> bool {
        patterns.iter().any(|pattern| match pattern.strip_suffix(".*") {
            Some(prefix) => tool_name.starts_with(prefix),
            None => pattern == tool_name,
        })
    }

    pub fn is_tool_allowed(&self, tool_name: &str) -> bool {
        self.allowed_tools.is_empty() || Self::matches(&self.allowed_tools, tool_name)
    }

    pub fn is_tool_denied(&self, tool_name: &str) -> bool {
        Self::matches(&self.denied_tools, tool_name)
    }

    /// Denylist overrides the allowlist.
    pub fn is_permitted(&self, tool_name: &str) -> bool {
        self.is_tool_allowed(tool_name) && !self.is_tool_denied(tool_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_policy_permits_everything() {
        let policy = ToolPolicy::default();
        assert!(policy.is_permitted("anything.at-all"));
    }

    #[test]
    fn prefix_wildcard_scopes_the_allowlist() {
        let policy = ToolPolicy { allowed_tools: vec!["filesystem.*".to_string()], denied_tools: vec![] };
        assert!(policy.is_permitted("filesystem.read"));
        assert!(!policy.is_permitted("web-search.query"));
    }

    #[test]
    fn denylist_overrides_the_allowlist() {
        let policy = ToolPolicy {
            allowed_tools: vec!["filesystem.*".to_string()],
            denied_tools: vec!["filesystem.delete".to_string()],
        };
        assert!(policy.is_permitted("filesystem.read"));
        assert!(!policy.is_permitted("filesystem.delete"));
    }

    #[test]
    fn exact_name_match_without_wildcard() {
        let policy = ToolPolicy { allowed_tools: vec!["echo".to_string()], denied_tools: vec![] };
        assert!(policy.is_permitted("echo"));
        assert!(!policy.is_permitted("echo2"));
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! MCP multi-agent tool-call orchestrator.
//!
//! Discovers MCP agent containers via container-platform metadata
//! (`infrastructure::discovery`), aggregates the tools they expose into a
//! single index (`infrastructure::registry`), and routes `tools/call`
//! invocations to the owning agent (`infrastructure::router`) behind a
//! timeout/retry/circuit-breaker layer (`application::hardening`).

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod agent;
pub mod circuit_breaker;
pub mod error_log;
pub mod events;
pub mod jsonrpc;
pub mod mcp_error;
pub mod module_status;
pub mod tool;

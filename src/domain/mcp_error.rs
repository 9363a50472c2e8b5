// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Structured orchestrator error carrying a stable `{code, message, data}`
//! shape plus a correlation id for cross-referencing the error log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::jsonrpc::{error_codes, JsonRpcError};

/// `err_<unix-ms>_<9-char-random>`.
pub fn new_correlation_id() -> String {
    format!(
        "err_{}_{}",
        Utc::now().timestamp_millis(),
        &Uuid::new_v4().simple().to_string()[..9]
    )
}

/// A structured error that never leaves the orchestrator boundary without
/// this envelope: every failure returned to a caller is wrapped into one of
/// these before it crosses the HTTP boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorError {
    pub name: &'static str,
    pub code: i32,
    pub message: String,
    pub original_error: String,
    pub timestamp: DateTime<Utc>,
    pub context: Option<String>,
    pub correlation_id: String,
}

impl OrchestratorError {
    pub fn new(code: i32, message: impl Into<String>, original_error: impl Into<String>, context: Option<String>) -> Self {
        Self {
            name: "MCPOrchestratorError",
            code,
            message: message.into(),
            original_error: original_error.into(),
            timestamp: Utc::now(),
            context,
            correlation_id: new_correlation_id(),
        }
    }

    pub fn timeout(ms: u64, context: Option<String>) -> Self {
        Self::new(
            error_codes::TIMEOUT,
            format!("Operation timed out after {} ms", ms),
            format!("timeout after {} ms", ms),
            context,
        )
    }

    pub fn service_unavailable(message: impl Into<String>, context: Option<String>) -> Self {
        let message = message.into();
        Self::new(error_codes::SERVICE_UNAVAILABLE, message.clone(), message, context)
    }

    pub fn method_not_found(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(error_codes::METHOD_NOT_FOUND, message.clone(), message, None)
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(error_codes::INVALID_PARAMS, message.clone(), message, None)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(error_codes::INVALID_REQUEST, message.clone(), message, None)
    }

    pub fn internal(original_error: impl Into<String>, context: Option<String>) -> Self {
        let original_error = original_error.into();
        Self::new(error_codes::INTERNAL_ERROR, original_error.clone(), original_error, context)
    }

    pub fn data(&self) -> Value {
        json!({
            "originalError": self.original_error,
            "timestamp": self.timestamp,
            "context": self.context,
            "correlationId": self.correlation_id,
        })
    }

    pub fn to_json_rpc_error(&self) -> JsonRpcError {
        JsonRpcError {
            code: self.code,
            message: self.message.clone(),
            data: Some(self.data()),
        }
    }
}

impl std::fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {}, correlation {})", self.message, self.code, self.correlation_id)
    }
}

impl std::error::Error for OrchestratorError {}

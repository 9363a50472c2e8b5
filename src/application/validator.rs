// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Structural JSON-RPC validation.
//!
//! This never performs schema-level semantic validation of agent-defined
//! tool arguments — only the shape of the envelope and parameters.

use serde_json::Value;

use crate::domain::tool::ToolDefinition;

/// Methods the orchestrator recognizes in strict mode.
pub const RECOGNIZED_METHODS: &[&str] = &["initialize", "tools/list", "tools/call", "ping"];

#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),
    #[error("invalid method: {0}")]
    InvalidMethod(String),
    #[error("invalid id")]
    InvalidId,
    #[error("invalid params: {0}")]
    InvalidParams(String),
    #[error("invalid tool name: {0}")]
    InvalidToolName(String),
    #[error("invalid tool definition: {0}")]
    InvalidToolDef(String),
}

/// Validate an inbound JSON-RPC 2.0 request envelope.
pub fn validate_request(envelope: &Value) -> Result<(), ValidationError> {
    let obj = envelope
        .as_object()
        .ok_or_else(|| ValidationError::InvalidEnvelope("envelope must be a JSON object".to_string()))?;

    match obj.get("jsonrpc").and_then(Value::as_str) {
        Some("2.0") => {}
        _ => return Err(ValidationError::InvalidEnvelope("jsonrpc must be \"2.0\"".to_string())),
    }

    let method = obj
        .get("method")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ValidationError::InvalidEnvelope("method must be a non-empty string".to_string()))?;

    if !RECOGNIZED_METHODS.contains(&method) {
        return Err(ValidationError::InvalidMethod(method.to_string()));
    }

    match obj.get("id") {
        Some(Value::Null) | None => return Err(ValidationError::InvalidId),
        Some(_) => {}
    }

    if let Some(params) = obj.get("params") {
        if !(params.is_object() || params.is_array()) {
            return Err(ValidationError::InvalidParams(
                "params must be an object or array".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validate an outbound/received JSON-RPC 2.0 response envelope.
pub fn validate_response(envelope: &Value) -> Result<(), ValidationError> {
    let obj = envelope
        .as_object()
        .ok_or_else(|| ValidationError::InvalidEnvelope("envelope must be a JSON object".to_string()))?;

    let has_result = obj.get("result").is_some();
    let has_error = obj.get("error").is_some();

    if has_result == has_error {
        return Err(ValidationError::InvalidEnvelope(
            "exactly one of result/error must be present".to_string(),
        ));
    }

    if has_error {
        let error = obj.get("error").unwrap();
        let code_ok = error.get("code").and_then(Value::as_i64).is_some();
        let message_ok = error
            .get("message")
            .and_then(Value::as_str)
            .is_some_and(|m| !m.is_empty());
        if !code_ok || !message_ok {
            return Err(ValidationError::InvalidEnvelope(
                "error object requires integer code and non-empty message".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validate `initialize` params.
pub fn validate_initialize(params: Option<&Value>) -> Result<(), ValidationError> {
    let Some(params) = params else { return Ok(()) };
    let obj = params
        .as_object()
        .ok_or_else(|| ValidationError::InvalidParams("params must be an object".to_string()))?;

    if let Some(v) = obj.get("protocolVersion") {
        if !v.is_string() {
            return Err(ValidationError::InvalidParams("protocolVersion must be a string".to_string()));
        }
    }
    if let Some(v) = obj.get("capabilities") {
        if !v.is_object() {
            return Err(ValidationError::InvalidParams("capabilities must be an object".to_string()));
        }
    }
    if let Some(v) = obj.get("clientInfo") {
        if !v.is_object() {
            return Err(ValidationError::InvalidParams("clientInfo must be an object".to_string()));
        }
    }

    Ok(())
}

/// Validated `tools/call` parameters.
pub struct ToolCallParams {
    pub name: String,
    pub arguments: Value,
}

/// Validate `tools/call` params, defaulting missing arguments to `{}`.
pub fn validate_tool_call(params: Option<&Value>) -> Result<ToolCallParams, ValidationError> {
    let params = params.ok_or_else(|| ValidationError::InvalidParams("params required".to_string()))?;
    let obj = params
        .as_object()
        .ok_or_else(|| ValidationError::InvalidParams("params must be an object".to_string()))?;

    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| ValidationError::InvalidToolName("name must be a string".to_string()))?;

    if !ToolDefinition::is_valid_name(name) {
        return Err(ValidationError::InvalidToolName(name.to_string()));
    }

    let arguments = match obj.get("arguments") {
        None => Value::Object(Default::default()),
        Some(Value::Object(map)) => Value::Object(map.clone()),
        Some(_) => return Err(ValidationError::InvalidParams("arguments must be an object".to_string())),
    };

    Ok(ToolCallParams { name: name.to_string(), arguments })
}

/// Validate a tool definition accepted from an agent's `tools/list` reply.
pub fn validate_tool_definition(tool: &ToolDefinition) -> Result<(), ValidationError> {
    if !ToolDefinition::is_valid_name(&tool.name) {
        return Err(ValidationError::InvalidToolDef(format!(
            "invalid tool name: {}",
            tool.name
        )));
    }
    if let Some(schema) = &tool.input_schema {
        if !schema.is_object() {
            return Err(ValidationError::InvalidToolDef(
                "inputSchema must be an object".to_string(),
            ));
        }
    }
    Ok(())
}

/// Deep-clone a JSON value, dropping prototype-pollution-style keys
/// (`__proto__`, `constructor`) at every level.
pub fn sanitize_input(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                if k == "__proto__" || k == "constructor" {
                    continue;
                }
                out.insert(k.clone(), sanitize_input(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sanitize_input).collect()),
        other => other.clone(),
    }
}

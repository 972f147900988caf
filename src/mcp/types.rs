//! JSON-RPC envelopes exchanged with the MCP server.
//!
//! Requests and notifications are POSTed to the submission endpoint; responses
//! arrive as `data:` frames on the event stream.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC protocol marker carried by every outbound envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// Outbound request envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// Outbound notification envelope. Carries no id and expects no response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    pub params: Value,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// Parameters of a `tools/call` request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallToolParams {
    pub name: String,
    pub arguments: Value,
}

/// Client identity sent during `initialize`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

/// Parameters of the `initialize` request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitializeParams {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: Value,
    #[serde(rename = "clientInfo")]
    pub client_info: ClientInfo,
}

/// A typed fragment of a tool result.
///
/// Only text blocks matter to this client; every other block type is kept as
/// [`ContentBlock::Other`] and skipped when rendering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        /// A text block without `text` counts as empty.
        #[serde(default)]
        text: String,
    },
    #[serde(other)]
    Other,
}

/// A response pushed by the server on the event stream.
///
/// Also used as the error-shaped result of a failed call: `id` and `result`
/// are absent and `error` holds a message.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResponseEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl ResponseEnvelope {
    /// Build an error-shaped envelope carrying `message`.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            id: None,
            result: None,
            error: Some(Value::String(message.into())),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Human readable form of the `error` member, if any.
    ///
    /// Accepts both a bare string and a JSON-RPC error object with a `message`.
    pub fn error_message(&self) -> Option<String> {
        let err = self.error.as_ref()?;
        Some(match err {
            Value::String(s) => s.clone(),
            Value::Object(obj) => obj
                .get("message")
                .and_then(Value::as_str)
                .map_or_else(|| err.to_string(), ToString::to_string),
            other => other.to_string(),
        })
    }

    /// Content blocks of `result.content`, in order. Blocks that fail to parse
    /// are skipped individually.
    pub fn content_blocks(&self) -> Vec<ContentBlock> {
        self.result
            .as_ref()
            .and_then(|r| r.get("content"))
            .and_then(Value::as_array)
            .map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|b| serde_json::from_value(b.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Join every text block of `result.content` with newlines.
///
/// Returns an empty string when the envelope has no result or no content.
pub fn extract_text(response: &ResponseEnvelope) -> String {
    response
        .content_blocks()
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Other => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

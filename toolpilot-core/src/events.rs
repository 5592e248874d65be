//! Event types streamed from the agent loop to its caller
//!
//! Every event serializes to a tagged JSON object (`{"type": "...", ...}`)
//! with camelCase field names, which is the exact wire shape written to
//! SSE clients.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Transport-level sentinel written after the last event of a request
pub const DONE_SENTINEL: &str = "[DONE]";

/// Progress and result events emitted by the agent loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A new model round-trip is starting
    #[serde(rename_all = "camelCase")]
    Iteration {
        iteration: usize,
        max_iterations: usize,
    },
    /// A streamed fragment of assistant text
    Content { content: String },
    /// The model requested a tool call
    #[serde(rename_all = "camelCase")]
    ToolCall {
        name: String,
        tool_call_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        arguments: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        command: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        icon: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    /// A tool call finished
    #[serde(rename_all = "camelCase")]
    ToolResult {
        tool_call_id: String,
        name: String,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        icon: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    /// The request was aborted
    Error { error: String },
}

impl AgentEvent {
    /// Create a content event
    pub fn content(content: impl Into<String>) -> Self {
        Self::Content {
            content: content.into(),
        }
    }

    /// Create an error event
    pub fn error(error: impl Into<String>) -> Self {
        Self::Error {
            error: error.into(),
        }
    }

    /// Wire name of this event's `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Iteration { .. } => "iteration",
            Self::Content { .. } => "content",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Error { .. } => "error",
        }
    }

    /// Serialize to the JSON payload of one SSE `data:` frame
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            serde_json::json!({ "type": "error", "error": e.to_string() }).to_string()
        })
    }
}

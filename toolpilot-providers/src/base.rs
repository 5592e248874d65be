//! Base trait and message model for LLM providers

use async_trait::async_trait;
use futures::stream::{self, Stream};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use thiserror::Error;

/// Error type for provider operations
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

pub type ProviderEventStream = Pin<Box<dyn Stream<Item = ProviderResult<LLMStreamEvent>> + Send>>;

/// A tool call requested by the model
///
/// `arguments` is the raw argument text exactly as the model produced it;
/// parsing happens at execution time so malformed JSON never breaks the
/// conversation history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCallRequest {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

impl Serialize for ToolCallRequest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;

        #[derive(Serialize)]
        struct Function<'a> {
            name: &'a str,
            arguments: &'a str,
        }

        let mut state = serializer.serialize_struct("ToolCallRequest", 3)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("type", "function")?;
        state.serialize_field(
            "function",
            &Function {
                name: &self.name,
                arguments: &self.arguments,
            },
        )?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for ToolCallRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Function {
            name: String,
            #[serde(default)]
            arguments: serde_json::Value,
        }

        #[derive(Deserialize)]
        struct Helper {
            id: String,
            function: Function,
        }

        let helper = Helper::deserialize(deserializer)?;
        // Some servers send arguments as an object rather than a JSON string
        let arguments = match helper.function.arguments {
            serde_json::Value::String(raw) => raw,
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        };

        Ok(Self {
            id: helper.id,
            name: helper.function.name,
            arguments,
        })
    }
}

/// Response from a non-streaming LLM call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRequest>,
    #[serde(default = "default_finish_reason")]
    pub finish_reason: String,
    #[serde(default)]
    pub usage: HashMap<String, i64>,
}

fn default_finish_reason() -> String {
    "stop".to_string()
}

impl LLMResponse {
    /// Check if response contains tool calls
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Streaming event emitted by LLM providers
///
/// Tool-call deltas are forwarded raw: fragments for the same `index` must
/// be concatenated by the consumer, and `id`/`name` may appear only on the
/// first fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LLMStreamEvent {
    /// Incremental assistant text output
    TextDelta(String),
    /// Incremental tool-call fragment
    ToolCallDelta {
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments_delta: Option<String>,
    },
    /// The provider finished this response
    Finished { finish_reason: String },
}

/// Conversation role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        f.write_str(s)
    }
}

/// A message in the chat conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
}

impl Message {
    fn with_role(role: Role, content: Option<String>) -> Self {
        Self {
            role,
            content,
            tool_call_id: None,
            tool_calls: Vec::new(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, Some(content.into()))
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, Some(content.into()))
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, Some(content.into()))
    }

    /// Create an assistant message carrying tool calls
    ///
    /// Empty content is stored as `None`, which serializes as `null`.
    pub fn assistant_with_tools(content: String, tool_calls: Vec<ToolCallRequest>) -> Self {
        let content = if content.is_empty() {
            None
        } else {
            Some(content)
        };
        Self {
            tool_calls,
            ..Self::with_role(Role::Assistant, content)
        }
    }

    /// Create a tool response message
    pub fn tool(content: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::with_role(Role::Tool, Some(content.into()))
        }
    }

    /// Text content, or an empty string when absent
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

/// Trait for LLM providers
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Send a chat completion request
    async fn chat(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<serde_json::Value>>,
        model: Option<String>,
        max_tokens: u32,
        temperature: f32,
    ) -> ProviderResult<LLMResponse>;

    /// Send a streaming chat completion request.
    ///
    /// Default behavior falls back to non-streaming chat and replays the
    /// response as one text delta, one delta per tool call, and a finish.
    async fn chat_stream(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<serde_json::Value>>,
        model: Option<String>,
        max_tokens: u32,
        temperature: f32,
    ) -> ProviderResult<ProviderEventStream> {
        let response = self
            .chat(messages, tools, model, max_tokens, temperature)
            .await?;

        let mut events = Vec::new();
        if let Some(content) = response.content.filter(|c| !c.is_empty()) {
            events.push(Ok(LLMStreamEvent::TextDelta(content)));
        }
        for (index, call) in response.tool_calls.into_iter().enumerate() {
            events.push(Ok(LLMStreamEvent::ToolCallDelta {
                index,
                id: Some(call.id),
                name: Some(call.name),
                arguments_delta: Some(call.arguments),
            }));
        }
        events.push(Ok(LLMStreamEvent::Finished {
            finish_reason: response.finish_reason,
        }));

        Ok(Box::pin(stream::iter(events)))
    }

    /// Get the default model for this provider
    fn get_default_model(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    #[test]
    fn test_tool_call_serializes_openai_shape() {
        let call = ToolCallRequest::new("call_1", "calendar_list", r#"{"a":1}"#);
        assert_eq!(
            serde_json::to_value(&call).unwrap(),
            json!({
                "id": "call_1",
                "type": "function",
                "function": {"name": "calendar_list", "arguments": "{\"a\":1}"}
            })
        );
    }

    #[test]
    fn test_tool_call_deserializes_object_arguments() {
        let call: ToolCallRequest = serde_json::from_value(json!({
            "id": "x",
            "type": "function",
            "function": {"name": "n", "arguments": {"k": "v"}}
        }))
        .unwrap();
        assert_eq!(call.arguments, r#"{"k":"v"}"#);
    }

    #[test]
    fn test_message_constructors() {
        let tool = Message::tool("out", "call_9");
        assert_eq!(tool.role, Role::Tool);
        assert_eq!(tool.tool_call_id.as_deref(), Some("call_9"));

        let assistant = Message::assistant_with_tools(
            String::new(),
            vec![ToolCallRequest::new("c", "n", "{}")],
        );
        assert!(assistant.content.is_none());
        let value = serde_json::to_value(&assistant).unwrap();
        assert_eq!(value["content"], serde_json::Value::Null);
        assert_eq!(value["tool_calls"][0]["id"], "c");
        assert!(value.get("tool_call_id").is_none());
    }

    struct FixedProvider;

    #[async_trait]
    impl LLMProvider for FixedProvider {
        async fn chat(
            &self,
            _messages: Vec<Message>,
            _tools: Option<Vec<serde_json::Value>>,
            _model: Option<String>,
            _max_tokens: u32,
            _temperature: f32,
        ) -> ProviderResult<LLMResponse> {
            Ok(LLMResponse {
                content: Some("hello".to_string()),
                tool_calls: vec![ToolCallRequest::new("c1", "exec", r#"{"command":"ls"}"#)],
                finish_reason: "tool_calls".to_string(),
                usage: HashMap::new(),
            })
        }

        fn get_default_model(&self) -> String {
            "fixed".to_string()
        }
    }

    #[tokio::test]
    async fn test_default_chat_stream_replays_response() {
        let stream = FixedProvider
            .chat_stream(vec![Message::user("hi")], None, None, 16, 0.0)
            .await
            .unwrap();
        let events: Vec<LLMStreamEvent> = stream.map(|e| e.unwrap()).collect().await;

        assert_eq!(events.len(), 3);
        assert_eq!(events[0], LLMStreamEvent::TextDelta("hello".to_string()));
        assert_eq!(
            events[1],
            LLMStreamEvent::ToolCallDelta {
                index: 0,
                id: Some("c1".to_string()),
                name: Some("exec".to_string()),
                arguments_delta: Some(r#"{"command":"ls"}"#.to_string()),
            }
        );
        assert_eq!(
            events[2],
            LLMStreamEvent::Finished {
                finish_reason: "tool_calls".to_string()
            }
        );
    }
}

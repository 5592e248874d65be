//! Base trait and result types for tools

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of one tool execution
///
/// Failures are values, not errors: the loop hands them back to the model
/// and never retries.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(default)]
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ToolResult {
    /// Successful result with the given output
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
            url: None,
        }
    }

    /// Failed result with the given error message
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
            url: None,
        }
    }

    /// Attach a link to the resource the tool touched
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Attach output (e.g. stderr next to a failure)
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }
}

/// Trait for tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name
    fn name(&self) -> &str;

    /// Get the tool description
    fn description(&self) -> &str;

    /// Get the tool parameters schema (JSON Schema format)
    fn parameters(&self) -> Value;

    /// Execute the tool with arguments
    async fn execute(&self, args: Value) -> Result<ToolResult>;

    /// Icon hint shown next to tool events
    fn icon(&self) -> Option<&str> {
        None
    }

    /// Human-readable label shown next to tool events
    fn label(&self) -> Option<&str> {
        None
    }

    /// Whether output is withheld from `tool_result` events.
    /// The model still receives it.
    fn suppress_output(&self) -> bool {
        false
    }

    /// Replacement for the raw arguments in `tool_call` events
    fn display_command(&self, _args: &Value) -> Option<String> {
        None
    }

    /// Validate parameters against the schema
    fn validate_params(&self, params: &Value) -> Vec<String> {
        let Some(params_obj) = params.as_object() else {
            return vec!["Parameters must be an object".to_string()];
        };

        let schema = self.parameters();
        let mut errors = Vec::new();

        if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
            for field in required.iter().filter_map(|f| f.as_str()) {
                if params_obj.get(field).map_or(true, Value::is_null) {
                    errors.push(format!("Missing required field: {}", field));
                }
            }
        }

        errors
    }

    /// Convert tool to OpenAI function schema format
    fn to_schema(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name(),
                "description": self.description(),
                "parameters": self.parameters(),
            }
        })
    }
}

/// Tool errors
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ToolError>;

/// Supplies bearer tokens to connector tools
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// A fixed token obtained out of band
pub struct StaticToken {
    token: String,
    service: &'static str,
}

impl StaticToken {
    pub fn new(token: impl Into<String>, service: &'static str) -> Self {
        Self {
            token: token.into(),
            service,
        }
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String> {
        let token = self.token.trim();
        if token.is_empty() {
            return Err(ToolError::Auth(format!(
                "{} is not connected (no access token configured)",
                self.service
            )));
        }
        Ok(token.to_string())
    }
}

/// Read a required string argument
pub fn require_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ToolError::InvalidParams(format!("Missing '{}' parameter", key)))
}

/// Read an optional, non-empty string argument
pub fn optional_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Read an optional integer argument clamped into `[min, max]`
pub fn bounded_u64(args: &Value, key: &str, default: u64, min: u64, max: u64) -> u64 {
    args.get(key)
        .and_then(Value::as_u64)
        .unwrap_or(default)
        .clamp(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo text back"
        }

        fn parameters(&self) -> Value {
            json!({
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"]
            })
        }

        async fn execute(&self, args: Value) -> Result<ToolResult> {
            Ok(ToolResult::ok(require_str(&args, "text")?))
        }
    }

    #[test]
    fn test_validate_params() {
        assert!(Echo.validate_params(&json!({"text": "hi"})).is_empty());
        assert_eq!(
            Echo.validate_params(&json!({})),
            vec!["Missing required field: text".to_string()]
        );
        assert_eq!(Echo.validate_params(&json!([1])).len(), 1);
    }

    #[test]
    fn test_to_schema() {
        let schema = Echo.to_schema();
        assert_eq!(schema["type"], "function");
        assert_eq!(schema["function"]["name"], "echo");
        assert_eq!(schema["function"]["parameters"]["required"][0], "text");
    }

    #[tokio::test]
    async fn test_static_token_rejects_empty() {
        assert!(matches!(
            StaticToken::new("  ", "Gmail").access_token().await,
            Err(ToolError::Auth(_))
        ));
        assert_eq!(
            StaticToken::new("abc", "Gmail").access_token().await.unwrap(),
            "abc"
        );
    }

    #[test]
    fn test_arg_helpers() {
        let args = json!({"a": "x", "b": "", "n": 500});
        assert_eq!(require_str(&args, "a").unwrap(), "x");
        assert!(require_str(&args, "b").is_err());
        assert_eq!(optional_str(&args, "b"), None);
        assert_eq!(bounded_u64(&args, "n", 10, 1, 100), 100);
        assert_eq!(bounded_u64(&args, "missing", 10, 1, 100), 10);
    }
}

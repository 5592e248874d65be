//! Agent loop: stream, execute tools, repeat until a final answer

use crate::sink::EventSink;
use futures::StreamExt;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use toolpilot_core::config::AgentConfig;
use toolpilot_core::utils::preview;
use toolpilot_core::AgentEvent;
use toolpilot_providers::{
    LLMProvider, LLMStreamEvent, Message, ProviderError, ToolCallRequest,
};
use toolpilot_tools::ToolRegistry;
use tracing::{debug, error, info, warn};

/// Content emitted when the model ends a turn with neither text nor tool calls
pub const NO_ANSWER_MESSAGE: &str = "I've completed processing but have no response to give.";

static URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s<>"'`)\]]+"#).expect("valid regex"));

/// First http(s) link in `text`, if any
pub fn first_url(text: &str) -> Option<String> {
    URL_PATTERN
        .find(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':']).to_string())
}

#[derive(Debug, Clone, Default)]
struct PartialCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// Reassembles streamed tool-call fragments keyed by call index.
///
/// The first non-empty id and name seen for an index win; argument
/// fragments are concatenated in arrival order.
#[derive(Debug, Clone, Default)]
pub struct ToolCallAccumulator {
    partials: BTreeMap<usize, PartialCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments_delta: Option<String>,
    ) {
        let entry = self.partials.entry(index).or_default();
        if entry.id.is_none() {
            entry.id = id.filter(|s| !s.is_empty());
        }
        if entry.name.is_none() {
            entry.name = name.filter(|s| !s.is_empty());
        }
        if let Some(delta) = arguments_delta {
            entry.arguments.push_str(&delta);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.partials.is_empty()
    }

    /// Completed calls in index order; the accumulator is left empty
    pub fn finish(&mut self) -> Vec<ToolCallRequest> {
        std::mem::take(&mut self.partials)
            .into_iter()
            .map(|(index, call)| {
                ToolCallRequest::new(
                    call.id.unwrap_or_else(|| format!("call_{}", index)),
                    call.name.unwrap_or_default(),
                    call.arguments,
                )
            })
            .collect()
    }
}

/// Per-request state threaded through the iterations
#[derive(Debug, Clone, Default)]
pub struct LoopState {
    pub messages: Vec<Message>,
    pub iteration: usize,
    pub pending: ToolCallAccumulator,
}

impl LoopState {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            iteration: 0,
            pending: ToolCallAccumulator::new(),
        }
    }
}

/// How a request ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStatus {
    /// The model produced a final answer
    Completed,
    /// The model ended without text or tool calls
    NoAnswer,
    /// The model call failed
    Failed(String),
    /// The iteration cap was hit
    MaxIterationsExceeded,
}

#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub status: LoopStatus,
    pub final_content: Option<String>,
    pub state: LoopState,
}

impl LoopOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, LoopStatus::Completed | LoopStatus::NoAnswer)
    }
}

/// Model settings for a loop
#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub model: Option<String>,
    pub max_iterations: usize,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self::from(&AgentConfig::default())
    }
}

impl From<&AgentConfig> for LoopConfig {
    fn from(config: &AgentConfig) -> Self {
        Self {
            model: Some(config.model.clone()).filter(|m| !m.is_empty()),
            max_iterations: config.max_iterations,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

/// The tool-calling loop for one request
pub struct AgentLoop {
    provider: Arc<dyn LLMProvider>,
    tools: Arc<ToolRegistry>,
    config: LoopConfig,
}

impl AgentLoop {
    pub fn new(provider: Arc<dyn LLMProvider>, tools: Arc<ToolRegistry>, config: LoopConfig) -> Self {
        Self {
            provider,
            tools,
            config,
        }
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Run until the model answers, fails, or the iteration cap is reached.
    ///
    /// `model` overrides the configured model for this request only.
    pub async fn run(
        &self,
        messages: Vec<Message>,
        model: Option<String>,
        sink: &dyn EventSink,
    ) -> LoopOutcome {
        let model = model
            .filter(|m| !m.is_empty())
            .or_else(|| self.config.model.clone());
        let max_iterations = self.config.max_iterations;
        let tool_schemas = self.tools.schemas_for_model();
        let mut state = LoopState::new(messages);

        while state.iteration < max_iterations {
            state.iteration += 1;
            debug!("Agent iteration {}/{}", state.iteration, max_iterations);
            sink.emit(AgentEvent::Iteration {
                iteration: state.iteration,
                max_iterations,
            });

            let mut stream = match self
                .provider
                .chat_stream(
                    state.messages.clone(),
                    tool_schemas.clone(),
                    model.clone(),
                    self.config.max_tokens,
                    self.config.temperature,
                )
                .await
            {
                Ok(stream) => stream,
                Err(e) => return Self::fail(state, e, sink),
            };

            let mut content = String::new();
            while let Some(event) = stream.next().await {
                match event {
                    Ok(LLMStreamEvent::TextDelta(delta)) => {
                        if delta.is_empty() {
                            continue;
                        }
                        content.push_str(&delta);
                        sink.emit(AgentEvent::content(delta));
                    }
                    Ok(LLMStreamEvent::ToolCallDelta {
                        index,
                        id,
                        name,
                        arguments_delta,
                    }) => state.pending.push(index, id, name, arguments_delta),
                    Ok(LLMStreamEvent::Finished { finish_reason }) => {
                        debug!("Stream finished: {}", finish_reason);
                        break;
                    }
                    Err(e) => return Self::fail(state, e, sink),
                }
            }

            let calls = state.pending.finish();
            if calls.is_empty() {
                if content.is_empty() {
                    info!("Model ended without an answer");
                    sink.emit(AgentEvent::content(NO_ANSWER_MESSAGE));
                    return LoopOutcome {
                        status: LoopStatus::NoAnswer,
                        final_content: None,
                        state,
                    };
                }
                info!("Final answer: {}", preview(&content, 120));
                state.messages.push(Message::assistant(content.clone()));
                return LoopOutcome {
                    status: LoopStatus::Completed,
                    final_content: Some(content),
                    state,
                };
            }

            info!("LLM requested {} tool calls", calls.len());
            state
                .messages
                .push(Message::assistant_with_tools(content, calls.clone()));
            for call in &calls {
                let result_message = self.execute_call(call, sink).await;
                state.messages.push(result_message);
            }
        }

        warn!("Reached maximum iterations ({})", max_iterations);
        sink.emit(AgentEvent::error(format!(
            "Reached maximum iterations ({}) without a final answer",
            max_iterations
        )));
        LoopOutcome {
            status: LoopStatus::MaxIterationsExceeded,
            final_content: None,
            state,
        }
    }

    fn fail(state: LoopState, e: ProviderError, sink: &dyn EventSink) -> LoopOutcome {
        let message = e.to_string();
        error!("Model call failed: {}", message);
        sink.emit(AgentEvent::error(message.clone()));
        LoopOutcome {
            status: LoopStatus::Failed(message),
            final_content: None,
            state,
        }
    }

    /// Execute one call, emitting its events; returns the tool message for history
    async fn execute_call(&self, call: &ToolCallRequest, sink: &dyn EventSink) -> Message {
        let args = parse_arguments(&call.name, &call.arguments);
        let tool = self.tools.get(&call.name);
        let icon = tool.as_ref().and_then(|t| t.icon()).map(str::to_string);
        let label = tool.as_ref().and_then(|t| t.label()).map(str::to_string);
        let command = tool.as_ref().and_then(|t| t.display_command(&args));
        let suppress = tool.as_ref().is_some_and(|t| t.suppress_output());

        info!("Tool call: {}({})", call.name, preview(&call.arguments, 200));
        sink.emit(AgentEvent::ToolCall {
            name: call.name.clone(),
            tool_call_id: call.id.clone(),
            arguments: if command.is_some() {
                None
            } else {
                Some(args.clone())
            },
            command,
            icon: icon.clone(),
            label: label.clone(),
        });

        let result = self.tools.execute(&call.name, args).await;
        if !result.success {
            warn!(
                "Tool {} failed: {}",
                call.name,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }

        let url = result.url.clone().or_else(|| first_url(&result.output));
        sink.emit(AgentEvent::ToolResult {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            success: result.success,
            output: if suppress || result.output.is_empty() {
                None
            } else {
                Some(result.output.clone())
            },
            error: result.error.clone(),
            url,
            icon,
            label,
        });

        Message::tool(ToolRegistry::format(&result), call.id.clone())
    }
}

/// Decode accumulated arguments; anything unparseable becomes `{}`
fn parse_arguments(tool: &str, raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            warn!("Malformed arguments for {}: {} ({})", tool, e, preview(raw, 200));
            Value::Object(Default::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::RecordingSink;
    use crate::testing::{ScriptedProvider, Turn};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use toolpilot_providers::Role;
    use toolpilot_tools::{Tool, ToolResult};

    /// Tool that records its arguments and returns a fixed result
    struct FakeTool {
        name: &'static str,
        result: ToolResult,
        seen: Arc<Mutex<Vec<Value>>>,
    }

    impl FakeTool {
        fn new(name: &'static str, result: ToolResult) -> Self {
            Self {
                name,
                result,
                seen: Arc::default(),
            }
        }
    }

    #[async_trait]
    impl Tool for FakeTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "fake"
        }

        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        fn icon(&self) -> Option<&str> {
            Some("star")
        }

        async fn execute(&self, args: Value) -> toolpilot_tools::base::Result<ToolResult> {
            self.seen.lock().unwrap().push(args);
            Ok(self.result.clone())
        }
    }

    fn agent(provider: Arc<ScriptedProvider>, tools: ToolRegistry, max_iterations: usize) -> AgentLoop {
        AgentLoop::new(
            provider,
            Arc::new(tools),
            LoopConfig {
                model: Some("test-model".to_string()),
                max_iterations,
                max_tokens: 1024,
                temperature: 0.0,
            },
        )
    }

    fn tool_call_ids(events: &[AgentEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                AgentEvent::ToolCall { tool_call_id, .. } => Some(tool_call_id.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_accumulator_reassembles_fragments() {
        let mut acc = ToolCallAccumulator::new();
        acc.push(0, Some("c1".into()), Some("add".into()), Some("{\"a\":".into()));
        acc.push(0, None, None, Some("1,\"b\"".into()));
        acc.push(0, Some("ignored".into()), Some("ignored".into()), Some(":2}".into()));

        let calls = acc.finish();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "c1");
        assert_eq!(calls[0].name, "add");
        let args: Value = serde_json::from_str(&calls[0].arguments).unwrap();
        assert_eq!(args, json!({"a": 1, "b": 2}));
        assert!(acc.is_empty());
    }

    #[test]
    fn test_accumulator_orders_by_index_and_fills_ids() {
        let mut acc = ToolCallAccumulator::new();
        acc.push(2, None, Some("c".into()), None);
        acc.push(0, Some("".into()), Some("a".into()), None);
        acc.push(1, Some("id-b".into()), Some("b".into()), None);

        let calls = acc.finish();
        let names: Vec<_> = calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(calls[0].id, "call_0");
        assert_eq!(calls[1].id, "id-b");
        assert_eq!(calls[2].id, "call_2");
    }

    #[test]
    fn test_first_url() {
        assert_eq!(
            first_url("Created: https://docs.google.com/document/d/x/edit."),
            Some("https://docs.google.com/document/d/x/edit".to_string())
        );
        assert_eq!(first_url("no links here"), None);
    }

    #[tokio::test]
    async fn test_plain_answer() {
        let provider = Arc::new(ScriptedProvider::new().with_turn(Turn::text(&["Hel", "lo"])));
        let sink = RecordingSink::new();
        let outcome = agent(provider.clone(), ToolRegistry::new(), 5)
            .run(vec![Message::user("hi")], None, &sink)
            .await;

        assert_eq!(outcome.status, LoopStatus::Completed);
        assert_eq!(outcome.final_content.as_deref(), Some("Hello"));
        assert_eq!(sink.kinds(), vec!["iteration", "content", "content"]);
        assert_eq!(outcome.state.messages.last().unwrap().text(), "Hello");
        // No tools registered: the request carries no tool list
        assert_eq!(provider.stream_tools(), vec![None]);
    }

    #[tokio::test]
    async fn test_always_tool_calling_model_stops_at_cap() {
        let provider = Arc::new(
            ScriptedProvider::new().repeating(Turn::tool_calls(&[("c", "ping", "{}")])),
        );
        let tools = ToolRegistry::builder()
            .tool(FakeTool::new("ping", ToolResult::ok("pong")))
            .build();
        let sink = RecordingSink::new();
        let outcome = agent(provider.clone(), tools, 3)
            .run(vec![Message::user("loop")], None, &sink)
            .await;

        assert_eq!(outcome.status, LoopStatus::MaxIterationsExceeded);
        assert_eq!(provider.stream_calls(), 3);
        let events = sink.events();
        let errors: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                AgentEvent::Error { error } => Some(error.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            errors,
            vec!["Reached maximum iterations (3) without a final answer".to_string()]
        );
        assert_eq!(events.last().map(AgentEvent::kind), Some("error"));
    }

    #[tokio::test]
    async fn test_tools_run_in_declared_order() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .with_turn(Turn::tool_calls(&[
                    ("A", "first", "{}"),
                    ("B", "second", "{}"),
                    ("C", "third", "{}"),
                ]))
                .with_turn(Turn::text(&["done"])),
        );
        let tools = ToolRegistry::builder()
            .tool(FakeTool::new("first", ToolResult::ok("1")))
            .tool(FakeTool::new("second", ToolResult::ok("2")))
            .tool(FakeTool::new("third", ToolResult::ok("3")))
            .build();
        let sink = RecordingSink::new();
        let outcome = agent(provider.clone(), tools, 5)
            .run(vec![Message::user("go")], None, &sink)
            .await;

        assert_eq!(outcome.status, LoopStatus::Completed);
        assert_eq!(tool_call_ids(&sink.events()), vec!["A", "B", "C"]);

        let tool_ids: Vec<_> = outcome
            .state
            .messages
            .iter()
            .filter(|m| m.role == Role::Tool)
            .filter_map(|m| m.tool_call_id.clone())
            .collect();
        assert_eq!(tool_ids, vec!["A", "B", "C"]);

        // The second request sees the assistant call message before the results
        let second = &provider.stream_requests()[1];
        let assistant = second
            .iter()
            .position(|m| m.role == Role::Assistant)
            .unwrap();
        assert_eq!(second[assistant].tool_calls.len(), 3);
        assert_eq!(second[assistant + 1].tool_call_id.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_fragmented_arguments_reach_tool() {
        let fragments = vec![
            LLMStreamEvent::ToolCallDelta {
                index: 0,
                id: Some("c1".into()),
                name: Some("add".into()),
                arguments_delta: Some("{\"a\":".into()),
            },
            LLMStreamEvent::ToolCallDelta {
                index: 0,
                id: None,
                name: None,
                arguments_delta: Some("1,\"b\"".into()),
            },
            LLMStreamEvent::ToolCallDelta {
                index: 0,
                id: None,
                name: None,
                arguments_delta: Some(":2}".into()),
            },
            LLMStreamEvent::Finished {
                finish_reason: "tool_calls".into(),
            },
        ];
        let provider = Arc::new(
            ScriptedProvider::new()
                .with_turn(Turn::Events(fragments))
                .with_turn(Turn::text(&["3"])),
        );
        let add = FakeTool::new("add", ToolResult::ok("3"));
        let seen = add.seen.clone();
        let tools = ToolRegistry::builder().tool(add).build();

        let sink = RecordingSink::new();
        agent(provider, tools, 5)
            .run(vec![Message::user("1+2")], None, &sink)
            .await;

        assert_eq!(seen.lock().unwrap().as_slice(), &[json!({"a": 1, "b": 2})]);
        let call = sink
            .events()
            .into_iter()
            .find(|e| e.kind() == "tool_call")
            .unwrap();
        assert!(matches!(
            call,
            AgentEvent::ToolCall { arguments: Some(ref a), .. } if a == &json!({"a": 1, "b": 2})
        ));
    }

    #[tokio::test]
    async fn test_unknown_tool_and_bad_arguments_continue() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .with_turn(Turn::tool_calls(&[
                    ("x", "does_not_exist", "{}"),
                    ("y", "echo", "{not json"),
                ]))
                .with_turn(Turn::text(&["recovered"])),
        );
        let echo = FakeTool::new("echo", ToolResult::ok("echoed"));
        let seen = echo.seen.clone();
        let tools = ToolRegistry::builder().tool(echo).build();

        let sink = RecordingSink::new();
        let outcome = agent(provider.clone(), tools, 5)
            .run(vec![Message::user("try")], None, &sink)
            .await;

        assert_eq!(outcome.status, LoopStatus::Completed);
        assert_eq!(seen.lock().unwrap().as_slice(), &[json!({})]);

        let results: Vec<_> = sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                AgentEvent::ToolResult { success, error, .. } => Some((success, error)),
                _ => None,
            })
            .collect();
        assert_eq!(
            results[0],
            (false, Some("Unknown tool: does_not_exist".to_string()))
        );
        assert!(results[1].0);

        let second = &provider.stream_requests()[1];
        let unknown = second
            .iter()
            .find(|m| m.tool_call_id.as_deref() == Some("x"))
            .unwrap();
        assert!(unknown.text().starts_with("Error: Unknown tool"));
    }

    #[tokio::test]
    async fn test_provider_error_emits_single_error() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .with_turn(Turn::EventsThenError(
                    vec![LLMStreamEvent::TextDelta("partial".into())],
                    "stream reset".into(),
                )),
        );
        let sink = RecordingSink::new();
        let outcome = agent(provider, ToolRegistry::new(), 5)
            .run(vec![Message::user("hi")], None, &sink)
            .await;

        assert!(matches!(outcome.status, LoopStatus::Failed(ref e) if e.contains("stream reset")));
        assert_eq!(sink.kinds(), vec!["iteration", "content", "error"]);
        assert_eq!(outcome.state.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_turn_yields_placeholder() {
        let provider = Arc::new(ScriptedProvider::new().with_turn(Turn::text(&[])));
        let sink = RecordingSink::new();
        let outcome = agent(provider, ToolRegistry::new(), 5)
            .run(vec![Message::user("hi")], None, &sink)
            .await;

        assert_eq!(outcome.status, LoopStatus::NoAnswer);
        assert!(outcome.is_success());
        assert_eq!(sink.content(), NO_ANSWER_MESSAGE);
    }

    #[tokio::test]
    async fn test_whitespace_answer_is_kept() {
        let provider = Arc::new(ScriptedProvider::new().with_turn(Turn::text(&["\n", " "])));
        let sink = RecordingSink::new();
        let outcome = agent(provider, ToolRegistry::new(), 5)
            .run(vec![Message::user("hi")], None, &sink)
            .await;

        assert_eq!(outcome.status, LoopStatus::Completed);
        assert_eq!(outcome.final_content.as_deref(), Some("\n "));
        assert_eq!(sink.kinds(), vec!["iteration", "content", "content"]);
        assert_eq!(outcome.state.messages.last().unwrap().text(), "\n ");
    }

    #[tokio::test]
    async fn test_calendar_round_trip() {
        let listing = "Found 1 event(s):\n- Dentist (2024-05-02T09:00:00Z to 2024-05-02T10:00:00Z) [id: ev1]";
        let provider = Arc::new(
            ScriptedProvider::new()
                .with_turn(Turn::tool_calls(&[(
                    "call_cal",
                    "calendar_list",
                    r#"{"time_min":"2024-05-02T00:00:00Z","time_max":"2024-05-03T00:00:00Z"}"#,
                )]))
                .with_turn(Turn::text(&["You have a dentist ", "appointment at 9."])),
        );
        let calendar = FakeTool::new(
            "calendar_list",
            ToolResult::ok(listing).with_url("https://calendar.google.com/calendar/r/day/2024/5/2"),
        );
        let seen = calendar.seen.clone();
        let tools = ToolRegistry::builder().tool(calendar).build();

        let sink = RecordingSink::new();
        let outcome = agent(provider.clone(), tools, 10)
            .run(
                vec![
                    Message::system("base"),
                    Message::user("What's on my calendar tomorrow?"),
                ],
                None,
                &sink,
            )
            .await;

        assert_eq!(outcome.status, LoopStatus::Completed);
        assert_eq!(
            seen.lock().unwrap()[0]["time_min"],
            json!("2024-05-02T00:00:00Z")
        );
        assert_eq!(
            sink.kinds(),
            vec!["iteration", "tool_call", "tool_result", "iteration", "content", "content"]
        );
        let result = sink
            .events()
            .into_iter()
            .find(|e| e.kind() == "tool_result")
            .unwrap();
        assert_eq!(
            result,
            AgentEvent::ToolResult {
                tool_call_id: "call_cal".to_string(),
                name: "calendar_list".to_string(),
                success: true,
                output: Some(listing.to_string()),
                error: None,
                url: Some("https://calendar.google.com/calendar/r/day/2024/5/2".to_string()),
                icon: Some("star".to_string()),
                label: None,
            }
        );
        assert_eq!(
            outcome.final_content.as_deref(),
            Some("You have a dentist appointment at 9.")
        );

        let roles: Vec<_> = outcome.state.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::Tool, Role::Assistant]
        );
        assert_eq!(outcome.state.messages[3].text(), listing);
        assert_eq!(outcome.state.iteration, 2);
    }
}

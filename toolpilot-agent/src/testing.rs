//! Scripted provider for driving the router and loop without a model

use async_trait::async_trait;
use futures::stream;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use toolpilot_providers::{
    LLMProvider, LLMResponse, LLMStreamEvent, Message, ProviderError, ProviderEventStream,
    ProviderResult,
};

/// One scripted streaming round-trip
#[derive(Debug, Clone)]
pub enum Turn {
    /// Events delivered in order, then the stream ends
    Events(Vec<LLMStreamEvent>),
    /// Events delivered, then the stream yields an error
    EventsThenError(Vec<LLMStreamEvent>, String),
    /// The request itself fails
    Error(String),
}

impl Turn {
    /// A plain text answer split into the given fragments
    pub fn text(fragments: &[&str]) -> Self {
        let mut events: Vec<_> = fragments
            .iter()
            .map(|f| LLMStreamEvent::TextDelta(f.to_string()))
            .collect();
        events.push(LLMStreamEvent::Finished {
            finish_reason: "stop".to_string(),
        });
        Self::Events(events)
    }

    /// Tool calls given as `(id, name, arguments)`, one delta each
    pub fn tool_calls(calls: &[(&str, &str, &str)]) -> Self {
        let mut events: Vec<_> = calls
            .iter()
            .enumerate()
            .map(|(index, (id, name, arguments))| LLMStreamEvent::ToolCallDelta {
                index,
                id: Some(id.to_string()),
                name: Some(name.to_string()),
                arguments_delta: Some(arguments.to_string()),
            })
            .collect();
        events.push(LLMStreamEvent::Finished {
            finish_reason: "tool_calls".to_string(),
        });
        Self::Events(events)
    }
}

#[derive(Default)]
struct Recorded {
    chat: Vec<Vec<Message>>,
    stream: Vec<Vec<Message>>,
    stream_tools: Vec<Option<Vec<Value>>>,
}

/// Provider replaying queued replies; exhausting a queue is a provider error
/// unless a repeating turn was configured.
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, String>>>,
    turns: Mutex<VecDeque<Turn>>,
    repeat: Option<Turn>,
    recorded: Mutex<Recorded>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a non-streaming reply (used by the skill router)
    pub fn with_reply(self, content: &str) -> Self {
        lock(&self.replies).push_back(Ok(content.to_string()));
        self
    }

    pub fn with_reply_error(self, error: &str) -> Self {
        lock(&self.replies).push_back(Err(error.to_string()));
        self
    }

    /// Queue a streaming turn
    pub fn with_turn(self, turn: Turn) -> Self {
        lock(&self.turns).push_back(turn);
        self
    }

    /// Turn replayed whenever the streaming queue is empty
    pub fn repeating(mut self, turn: Turn) -> Self {
        self.repeat = Some(turn);
        self
    }

    pub fn chat_calls(&self) -> usize {
        lock(&self.recorded).chat.len()
    }

    pub fn stream_calls(&self) -> usize {
        lock(&self.recorded).stream.len()
    }

    /// Messages sent on each non-streaming call
    pub fn chat_requests(&self) -> Vec<Vec<Message>> {
        lock(&self.recorded).chat.clone()
    }

    /// Messages sent on each streaming call
    pub fn stream_requests(&self) -> Vec<Vec<Message>> {
        lock(&self.recorded).stream.clone()
    }

    /// Tool schemas sent on each streaming call
    pub fn stream_tools(&self) -> Vec<Option<Vec<Value>>> {
        lock(&self.recorded).stream_tools.clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn chat(
        &self,
        messages: Vec<Message>,
        _tools: Option<Vec<Value>>,
        _model: Option<String>,
        _max_tokens: u32,
        _temperature: f32,
    ) -> ProviderResult<LLMResponse> {
        lock(&self.recorded).chat.push(messages);
        match lock(&self.replies).pop_front() {
            Some(Ok(content)) => Ok(LLMResponse {
                content: Some(content),
                tool_calls: Vec::new(),
                finish_reason: "stop".to_string(),
                usage: Default::default(),
            }),
            Some(Err(error)) => Err(ProviderError::ApiError(error)),
            None => Err(ProviderError::ApiError("no scripted reply".to_string())),
        }
    }

    async fn chat_stream(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<Value>>,
        _model: Option<String>,
        _max_tokens: u32,
        _temperature: f32,
    ) -> ProviderResult<ProviderEventStream> {
        {
            let mut recorded = lock(&self.recorded);
            recorded.stream.push(messages);
            recorded.stream_tools.push(tools);
        }

        let turn = lock(&self.turns)
            .pop_front()
            .or_else(|| self.repeat.clone())
            .unwrap_or_else(|| Turn::Error("no scripted turn".to_string()));

        let items: Vec<ProviderResult<LLMStreamEvent>> = match turn {
            Turn::Events(events) => events.into_iter().map(Ok).collect(),
            Turn::EventsThenError(events, error) => events
                .into_iter()
                .map(Ok)
                .chain(std::iter::once(Err(ProviderError::ApiError(error))))
                .collect(),
            Turn::Error(error) => return Err(ProviderError::ApiError(error)),
        };
        Ok(Box::pin(stream::iter(items)))
    }

    fn get_default_model(&self) -> String {
        "scripted".to_string()
    }
}

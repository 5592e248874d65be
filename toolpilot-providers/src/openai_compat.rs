//! OpenAI-compatible chat completions client

use async_trait::async_trait;
use eventsource_stream::{EventStreamError, Eventsource};
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use toolpilot_core::config::ProviderConfig;
use tracing::debug;

use crate::base::{
    LLMProvider, LLMResponse, LLMStreamEvent, Message, ProviderError, ProviderEventStream,
    ProviderResult, ToolCallRequest,
};

/// Chat completion request body
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCallRequest>,
}

#[derive(Debug, Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: i64,
    #[serde(default)]
    completion_tokens: i64,
    #[serde(default)]
    total_tokens: i64,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<StreamToolCall>,
}

#[derive(Debug, Deserialize)]
struct StreamToolCall {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunction>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamFunction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

/// Client for any server speaking the OpenAI chat completions protocol
pub struct OpenAICompatClient {
    client: Client,
    api_base: String,
    api_key: Option<String>,
    default_model: String,
    extra_headers: HashMap<String, String>,
}

impl OpenAICompatClient {
    /// Create a new client
    pub fn new(
        api_key: Option<String>,
        api_base: impl Into<String>,
        default_model: impl Into<String>,
        extra_headers: HashMap<String, String>,
    ) -> Self {
        let api_key = api_key.filter(|key| !key.trim().is_empty());
        let api_base = api_base.into().trim_end_matches('/').to_string();

        Self {
            client: Client::builder()
                .http1_only() // Force HTTP/1.1 to avoid issues with some local servers
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_base,
            api_key,
            default_model: default_model.into(),
            extra_headers,
        }
    }

    /// Create a client from the provider section of the config
    pub fn from_config(config: &ProviderConfig, default_model: impl Into<String>) -> Self {
        Self::new(
            Some(config.api_key.clone()),
            config.api_base.clone(),
            default_model,
            config.extra_headers.clone(),
        )
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn build_request(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<serde_json::Value>>,
        model: String,
        max_tokens: u32,
        temperature: f32,
        stream: bool,
    ) -> ChatCompletionRequest {
        // A zero-length tool list is rejected by several servers
        let tools = tools.filter(|list| !list.is_empty());
        let tool_choice = tools.as_ref().map(|_| "auto".to_string());

        ChatCompletionRequest {
            model,
            messages,
            tools,
            tool_choice,
            stream: if stream { Some(true) } else { None },
            max_tokens,
            temperature,
        }
    }

    fn apply_headers(&self, mut req_builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(api_key) = &self.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        for (key, value) in &self.extra_headers {
            req_builder = req_builder.header(key, value);
        }

        req_builder
    }

    async fn send(&self, request: &ChatCompletionRequest) -> ProviderResult<reqwest::Response> {
        let url = format!("{}/chat/completions", self.api_base);
        let response = self
            .apply_headers(self.client.post(&url).json(request))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::ApiError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        Ok(response)
    }

    fn parse_response(response: ChatCompletionResponse) -> ProviderResult<LLMResponse> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".to_string()))?;

        let mut usage = HashMap::new();
        usage.insert("prompt_tokens".to_string(), response.usage.prompt_tokens);
        usage.insert(
            "completion_tokens".to_string(),
            response.usage.completion_tokens,
        );
        usage.insert("total_tokens".to_string(), response.usage.total_tokens);

        Ok(LLMResponse {
            content: choice.message.content,
            tool_calls: choice.message.tool_calls,
            finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
            usage,
        })
    }

    /// Translate one decoded chunk into raw stream events
    fn chunk_events(chunk: StreamChunk, finish_reason: &mut Option<String>) -> Vec<LLMStreamEvent> {
        let mut events = Vec::new();
        for choice in chunk.choices {
            if let Some(reason) = choice.finish_reason {
                *finish_reason = Some(reason);
            }
            if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                events.push(LLMStreamEvent::TextDelta(text));
            }
            for call in choice.delta.tool_calls {
                let function = call.function.unwrap_or_default();
                events.push(LLMStreamEvent::ToolCallDelta {
                    index: call.index,
                    id: call.id,
                    name: function.name,
                    arguments_delta: function.arguments,
                });
            }
        }
        events
    }
}

#[async_trait]
impl LLMProvider for OpenAICompatClient {
    async fn chat(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<serde_json::Value>>,
        model: Option<String>,
        max_tokens: u32,
        temperature: f32,
    ) -> ProviderResult<LLMResponse> {
        let model = model.unwrap_or_else(|| self.default_model.clone());
        let request = self.build_request(messages, tools, model, max_tokens, temperature, false);

        debug!(
            "Sending chat request to {} with model {}",
            self.api_base, request.model
        );

        let response = self.send(&request).await?;
        let body = response.text().await?;
        let parsed: ChatCompletionResponse = serde_json::from_str(&body)?;
        Self::parse_response(parsed)
    }

    async fn chat_stream(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<serde_json::Value>>,
        model: Option<String>,
        max_tokens: u32,
        temperature: f32,
    ) -> ProviderResult<ProviderEventStream> {
        let model = model.unwrap_or_else(|| self.default_model.clone());
        let request = self.build_request(messages, tools, model, max_tokens, temperature, true);

        debug!(
            "Sending streaming chat request to {} with model {}",
            self.api_base, request.model
        );

        let response = self.send(&request).await?;

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        tokio::spawn(async move {
            // Frames are decoded only once complete, so characters split
            // across network chunks survive
            let mut events = response.bytes_stream().eventsource();
            let mut finish_reason: Option<String> = None;

            while let Some(event) = events.next().await {
                let event = match event {
                    Ok(event) => event,
                    Err(EventStreamError::Transport(err)) => {
                        let _ = tx.send(Err(ProviderError::HttpError(err)));
                        return;
                    }
                    Err(err) => {
                        let _ = tx.send(Err(ProviderError::InvalidResponse(format!(
                            "malformed event stream: {}",
                            err
                        ))));
                        return;
                    }
                };

                let payload = event.data.trim();
                if payload.is_empty() {
                    continue;
                }
                if payload == "[DONE]" {
                    let _ = tx.send(Ok(LLMStreamEvent::Finished {
                        finish_reason: finish_reason
                            .take()
                            .unwrap_or_else(|| "stop".to_string()),
                    }));
                    return;
                }

                let parsed = match serde_json::from_str::<StreamChunk>(payload) {
                    Ok(chunk) => chunk,
                    Err(err) => {
                        let _ = tx.send(Err(ProviderError::JsonError(err)));
                        return;
                    }
                };

                for event in Self::chunk_events(parsed, &mut finish_reason) {
                    if tx.send(Ok(event)).is_err() {
                        // Receiver dropped; nobody is listening anymore
                        return;
                    }
                }
            }

            let _ = tx.send(Ok(LLMStreamEvent::Finished {
                finish_reason: finish_reason.unwrap_or_else(|| "stop".to_string()),
            }));
        });

        Ok(Box::pin(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })))
    }

    fn get_default_model(&self) -> String {
        self.default_model.clone()
    }
}

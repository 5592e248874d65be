use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use toolpilot_agent::ChatService;
use toolpilot_channels::{ChannelError, TelegramPoller};
use toolpilot_core::config::Config;
use toolpilot_providers::{Message, Role};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ChatService>,
    pub telegram: Arc<TelegramPoller>,
}

impl AppState {
    pub fn new(service: Arc<ChatService>, telegram: Arc<TelegramPoller>) -> Self {
        Self { service, telegram }
    }

    pub fn from_config(config: &Config) -> Self {
        let service = Arc::new(ChatService::from_config(config));
        let telegram = Arc::new(TelegramPoller::new(config.telegram.clone(), service.clone()));
        Self::new(service, telegram)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub model: Option<String>,
}

impl ChatRequest {
    /// Conversation history for the agent. System and tool messages from
    /// the client are dropped; the server owns the instructions.
    pub fn history(&self) -> Result<Vec<Message>, ApiError> {
        let history: Vec<Message> = self
            .messages
            .iter()
            .filter_map(|m| {
                let content = m.content.clone().unwrap_or_default();
                match m.role {
                    Role::User => Some(Message::user(content)),
                    Role::Assistant => Some(Message::assistant(content)),
                    Role::System | Role::Tool => None,
                }
            })
            .collect();

        match history.last() {
            Some(last) if last.role == Role::User && !last.text().trim().is_empty() => Ok(history),
            _ => Err(ApiError::bad_request(
                "messages must end with a non-empty user message",
            )),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelegramStartRequest {
    #[serde(default)]
    pub token: Option<String>,
}

/// JSON error body `{"error": "..."}` with a status code
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub error: String,
}

impl ApiError {
    pub fn bad_request(error: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: error.into(),
        }
    }
}

impl From<ChannelError> for ApiError {
    fn from(e: ChannelError) -> Self {
        let status = match e {
            ChannelError::NotConfigured(_) | ChannelError::AuthError(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::BAD_GATEWAY,
        };
        Self {
            status,
            error: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

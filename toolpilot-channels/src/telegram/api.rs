//! Minimal Telegram Bot API client

use crate::base::{ChannelError, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Extra time on top of the long-poll timeout before the HTTP client gives up
const HTTP_GRACE_SECS: u64 = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

impl User {
    /// `id|username` when a username is set, otherwise the numeric id
    pub fn sender_id(&self) -> String {
        match &self.username {
            Some(username) => format!("{}|{}", self.id, username),
            None => self.id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

#[derive(Deserialize)]
struct Envelope<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<u16>,
}

/// Client bound to one bot token
pub struct TelegramApi {
    client: Client,
    base: String,
}

impl TelegramApi {
    pub fn new(api_base: &str, token: &str, poll_timeout_secs: u64) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(poll_timeout_secs + HTTP_GRACE_SECS))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base: format!("{}/bot{}", api_base.trim_end_matches('/'), token),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: &Value) -> Result<T> {
        let response = self
            .client
            .post(format!("{}/{}", self.base, method))
            .json(body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        let envelope: Envelope<T> = serde_json::from_str(&text).map_err(|e| {
            ChannelError::ApiError(format!("{} returned HTTP {}: {}", method, status, e))
        })?;

        if !envelope.ok {
            let description = envelope
                .description
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(match envelope.error_code {
                Some(401) | Some(404) => ChannelError::AuthError(description),
                _ => ChannelError::ApiError(format!("{}: {}", method, description)),
            });
        }

        envelope
            .result
            .ok_or_else(|| ChannelError::ApiError(format!("{}: missing result", method)))
    }

    /// Identify the bot; fails with `AuthError` for a bad token
    pub async fn get_me(&self) -> Result<User> {
        self.call("getMe", &json!({})).await
    }

    /// Long-poll for updates after `offset`
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        let updates: Vec<Update> = self
            .call(
                "getUpdates",
                &json!({
                    "offset": offset,
                    "timeout": timeout_secs,
                    "allowed_updates": ["message"]
                }),
            )
            .await?;
        if !updates.is_empty() {
            debug!("Received {} Telegram update(s)", updates.len());
        }
        Ok(updates)
    }

    pub async fn send_message(&self, chat_id: i64, text: &str, html: bool) -> Result<()> {
        let mut body = json!({ "chat_id": chat_id, "text": text });
        if html {
            body["parse_mode"] = json!("HTML");
        }
        self.call::<Value>("sendMessage", &body)
            .await
            .map(|_| ())
            .map_err(|e| ChannelError::SendFailed(e.to_string()))
    }

    pub async fn send_typing(&self, chat_id: i64) -> Result<()> {
        self.call::<Value>(
            "sendChatAction",
            &json!({ "chat_id": chat_id, "action": "typing" }),
        )
        .await
        .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_id() {
        let user = User {
            id: 42,
            first_name: "Ada".to_string(),
            username: Some("ada".to_string()),
        };
        assert_eq!(user.sender_id(), "42|ada");
        let anonymous = User {
            username: None,
            ..user
        };
        assert_eq!(anonymous.sender_id(), "42");
    }

    #[test]
    fn test_update_deserializes_with_missing_fields() {
        let update: Update = serde_json::from_value(json!({
            "update_id": 7,
            "message": {"message_id": 1, "chat": {"id": -100}, "text": "hi"}
        }))
        .unwrap();
        let message = update.message.unwrap();
        assert_eq!(message.chat.id, -100);
        assert!(message.from.is_none());
        assert_eq!(message.text.as_deref(), Some("hi"));
    }
}

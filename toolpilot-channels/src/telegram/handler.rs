//! Turns incoming Telegram messages into chat-service requests

use super::api::{IncomingMessage, TelegramApi, Update};
use super::format::{markdown_to_html, split_message, MAX_MESSAGE_CHARS};
use crate::base::{AllowList, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use toolpilot_agent::{ChatService, LoopStatus, NO_ANSWER_MESSAGE};
use toolpilot_core::AgentEvent;
use toolpilot_providers::Message;
use tracing::{debug, error, info, warn};

const HELP_TEXT: &str = "<b>toolpilot commands</b>\n\n\
/start - Start the bot\n\
/reset - Reset conversation history\n\
/help - Show this help message\n\n\
Just send me a text message to chat!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Start,
    Reset,
    Help,
}

/// Recognize `/cmd` and `/cmd@botname`; anything else is chat text
fn parse_command(text: &str) -> Option<Command> {
    let first = text.split_whitespace().next()?;
    let name = first.strip_prefix('/')?;
    let name = name.split('@').next().unwrap_or(name);
    match name.to_ascii_lowercase().as_str() {
        "start" => Some(Command::Start),
        "reset" => Some(Command::Reset),
        "help" => Some(Command::Help),
        _ => None,
    }
}

/// Per-bot message handling with in-memory conversation history per chat
pub struct ConversationHandler {
    api: Arc<TelegramApi>,
    service: Arc<ChatService>,
    allow: AllowList,
    max_history: usize,
    histories: Mutex<HashMap<i64, Vec<Message>>>,
}

impl ConversationHandler {
    pub fn new(
        api: Arc<TelegramApi>,
        service: Arc<ChatService>,
        allow: AllowList,
        max_history: usize,
    ) -> Self {
        Self {
            api,
            service,
            allow,
            max_history: max_history.max(2),
            histories: Mutex::new(HashMap::new()),
        }
    }

    /// Number of messages remembered for `chat_id`
    pub async fn history_len(&self, chat_id: i64) -> usize {
        self.histories
            .lock()
            .await
            .get(&chat_id)
            .map_or(0, Vec::len)
    }

    /// Handle one update; returns the reply that was sent, if any
    pub async fn handle_update(&self, update: Update) -> Option<String> {
        let message = update.message?;
        let reply = self.reply_to(&message).await?;
        if let Err(e) = self.send(message.chat.id, &reply).await {
            error!("Failed to reply in chat {}: {}", message.chat.id, e);
        }
        Some(reply)
    }

    async fn reply_to(&self, message: &IncomingMessage) -> Option<String> {
        let text = message.text.as_deref().map(str::trim).filter(|t| !t.is_empty())?;
        let user = message.from.as_ref()?;
        let sender_id = user.sender_id();

        if !self.allow.is_allowed(&sender_id) {
            warn!(
                "Access denied for sender {} on channel telegram. Add them to allow_from in config to grant access.",
                sender_id
            );
            return None;
        }

        let chat_id = message.chat.id;
        let reply = match parse_command(text) {
            Some(Command::Start) => format!(
                "Hi {}! I'm toolpilot.\n\nSend me a message and I'll get it done.\nType /help to see available commands.",
                user.first_name
            ),
            Some(Command::Reset) => {
                self.histories.lock().await.remove(&chat_id);
                info!("Cleared history for chat {}", chat_id);
                "Conversation history cleared. Let's start fresh!".to_string()
            }
            Some(Command::Help) => HELP_TEXT.to_string(),
            None => self.converse(chat_id, text).await,
        };
        Some(reply)
    }

    /// Run the text through the chat service and remember the exchange
    async fn converse(&self, chat_id: i64, text: &str) -> String {
        let mut history = self
            .histories
            .lock()
            .await
            .get(&chat_id)
            .cloned()
            .unwrap_or_default();
        history.push(Message::user(text));

        if let Err(e) = self.api.send_typing(chat_id).await {
            debug!("Typing indicator failed: {}", e);
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let outcome = self.service.handle(&history, None, &tx).await;
        drop(tx);

        let mut streamed = String::new();
        let mut error = None;
        while let Ok(event) = rx.try_recv() {
            match event {
                AgentEvent::Content { content } => streamed.push_str(&content),
                AgentEvent::Error { error: e } => error = Some(e),
                _ => {}
            }
        }

        let reply = match (&outcome.status, outcome.final_content) {
            (LoopStatus::Completed, Some(answer)) => {
                history.push(Message::assistant(answer.clone()));
                answer
            }
            (LoopStatus::NoAnswer, _) => NO_ANSWER_MESSAGE.to_string(),
            _ => {
                // Failed turns are not remembered so the user can simply retry
                let message = error.unwrap_or(streamed);
                return format!("Error: {}", message);
            }
        };

        let excess = history.len().saturating_sub(self.max_history);
        history.drain(..excess);
        self.histories.lock().await.insert(chat_id, history);
        reply
    }

    /// Send as HTML, falling back to plain text when Telegram rejects the markup
    async fn send(&self, chat_id: i64, text: &str) -> Result<()> {
        for chunk in split_message(text, MAX_MESSAGE_CHARS) {
            let html = markdown_to_html(&chunk);
            if let Err(e) = self.api.send_message(chat_id, &html, true).await {
                warn!("HTML send failed, falling back to plain text: {}", e);
                self.api.send_message(chat_id, &chunk, false).await?;
            }
        }
        Ok(())
    }
}

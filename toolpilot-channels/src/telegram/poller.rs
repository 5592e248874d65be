//! Restartable long-polling loop
//!
//! The poller moves through `Stopped -> Starting -> Polling -> Stopping ->
//! Stopped`. Start and stop are serialized by a mutex, and starting while
//! running always stops and awaits the previous instance first, so two
//! loops never poll with the same token.

use super::api::TelegramApi;
use super::handler::ConversationHandler;
use crate::base::{AllowList, ChannelError, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use toolpilot_agent::ChatService;
use toolpilot_core::config::TelegramConfig;
use tracing::{debug, error, info, warn};

/// Added to the long-poll timeout when waiting for the loop to exit
const STOP_GRACE_SECS: u64 = 5;
const RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PollerState {
    Stopped,
    Starting,
    Polling,
    Stopping,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollerStatus {
    pub state: PollerState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_username: Option<String>,
}

#[derive(Debug)]
struct Shared {
    state: PollerState,
    bot_username: Option<String>,
    /// Next update offset per bot token, kept across restarts so a handled
    /// update is never delivered to a new instance again
    offsets: HashMap<String, i64>,
}

#[derive(Default)]
struct Running {
    cancel: Option<CancellationToken>,
    handle: Option<JoinHandle<()>>,
}

pub struct TelegramPoller {
    config: TelegramConfig,
    service: Arc<ChatService>,
    running: Mutex<Running>,
    shared: Arc<StdMutex<Shared>>,
}

impl TelegramPoller {
    pub fn new(config: TelegramConfig, service: Arc<ChatService>) -> Self {
        Self {
            config,
            service,
            running: Mutex::new(Running::default()),
            shared: Arc::new(StdMutex::new(Shared {
                state: PollerState::Stopped,
                bot_username: None,
                offsets: HashMap::new(),
            })),
        }
    }

    pub fn status(&self) -> PollerStatus {
        let shared = lock(&self.shared);
        PollerStatus {
            state: shared.state,
            bot_username: shared.bot_username.clone(),
        }
    }

    fn set_state(&self, state: PollerState, bot_username: Option<String>) {
        let mut shared = lock(&self.shared);
        shared.state = state;
        shared.bot_username = bot_username;
    }

    /// Start polling with `token`, or the configured token when `None`
    pub async fn start(&self, token: Option<String>) -> Result<PollerStatus> {
        let mut running = self.running.lock().await;
        if self.status().state != PollerState::Stopped || running.handle.is_some() {
            info!("Restarting Telegram bot");
            self.shutdown(&mut running).await;
        }

        let token = token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| self.config.token.trim().to_string());
        if token.is_empty() {
            return Err(ChannelError::NotConfigured(
                "Telegram token not configured".to_string(),
            ));
        }

        info!("Starting Telegram bot (polling mode)...");
        self.set_state(PollerState::Starting, None);

        let api = Arc::new(TelegramApi::new(
            &self.config.api_base,
            &token,
            self.config.poll_timeout_secs,
        ));
        let me = match api.get_me().await {
            Ok(me) => me,
            Err(e) => {
                self.set_state(PollerState::Stopped, None);
                return Err(e);
            }
        };
        let username = me.username.unwrap_or_else(|| me.id.to_string());
        info!("Telegram bot @{} connected", username);

        let handler = Arc::new(ConversationHandler::new(
            api.clone(),
            self.service.clone(),
            AllowList::new(self.config.allow_from.clone()),
            self.config.max_history,
        ));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(poll_loop(
            api,
            handler,
            token,
            cancel.clone(),
            self.config.poll_timeout_secs,
            self.shared.clone(),
        ));

        running.cancel = Some(cancel);
        running.handle = Some(handle);
        self.set_state(PollerState::Polling, Some(username));
        Ok(self.status())
    }

    /// Stop polling and wait for the loop to exit
    pub async fn stop(&self) -> PollerStatus {
        let mut running = self.running.lock().await;
        self.shutdown(&mut running).await;
        self.status()
    }

    async fn shutdown(&self, running: &mut Running) {
        let username = self.status().bot_username;
        self.set_state(PollerState::Stopping, username);

        if let Some(cancel) = running.cancel.take() {
            cancel.cancel();
        }
        if let Some(mut handle) = running.handle.take() {
            let wait = Duration::from_secs(self.config.poll_timeout_secs + STOP_GRACE_SECS);
            match tokio::time::timeout(wait, &mut handle).await {
                Ok(Ok(())) => debug!("Telegram poll loop exited"),
                Ok(Err(e)) => warn!("Telegram poll loop ended abnormally: {}", e),
                Err(_) => {
                    warn!("Telegram poll loop did not stop in {:?}, aborting", wait);
                    handle.abort();
                }
            }
        }

        self.set_state(PollerState::Stopped, None);
        info!("Telegram bot stopped");
    }
}

fn lock(shared: &StdMutex<Shared>) -> std::sync::MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn poll_loop(
    api: Arc<TelegramApi>,
    handler: Arc<ConversationHandler>,
    token: String,
    cancel: CancellationToken,
    timeout_secs: u64,
    shared: Arc<StdMutex<Shared>>,
) {
    let mut offset = lock(&shared).offsets.get(&token).copied().unwrap_or(0);
    // Highest offset Telegram has been told about; it confirms every update
    // below the offset passed to getUpdates
    let mut acknowledged = offset;

    loop {
        let updates = tokio::select! {
            _ = cancel.cancelled() => break,
            result = api.get_updates(offset, timeout_secs) => result,
        };

        match updates {
            Ok(updates) => {
                acknowledged = offset;
                for update in updates {
                    // Recorded before handling: a restart never replays it
                    offset = offset.max(update.update_id + 1);
                    lock(&shared).offsets.insert(token.clone(), offset);
                    handler.handle_update(update).await;
                    if cancel.is_cancelled() {
                        break;
                    }
                }
            }
            Err(ChannelError::AuthError(e)) => {
                error!("Telegram rejected the bot token, stopping: {}", e);
                let mut shared = lock(&shared);
                if shared.state == PollerState::Polling {
                    shared.state = PollerState::Stopped;
                    shared.bot_username = None;
                }
                return;
            }
            Err(e) => {
                warn!("Telegram getUpdates failed: {}", e);
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(RETRY_DELAY) => {}
                }
            }
        }
    }

    if offset > acknowledged {
        debug!("Acknowledging Telegram updates below {}", offset);
        if let Err(e) = api.get_updates(offset, 0).await {
            warn!("Failed to acknowledge Telegram updates: {}", e);
        }
    }
}

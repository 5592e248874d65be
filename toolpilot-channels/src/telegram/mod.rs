//! Telegram bot over the Bot API's long-polling `getUpdates`

pub mod api;
pub mod format;
pub mod handler;
pub mod poller;

pub use api::TelegramApi;
pub use handler::ConversationHandler;
pub use poller::{PollerState, PollerStatus, TelegramPoller};

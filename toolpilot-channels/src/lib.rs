//! Chat platform integrations for toolpilot
//!
//! Currently a Telegram bot that answers messages through the chat service.

pub mod base;
pub mod telegram;

pub use base::{AllowList, ChannelError, Result};
pub use telegram::{PollerState, PollerStatus, TelegramPoller};

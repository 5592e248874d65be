//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root configuration for toolpilot
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Agent loop and routing settings
    #[serde(default)]
    pub agent: AgentConfig,
    /// Model provider settings
    #[serde(default)]
    pub provider: ProviderConfig,
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Telegram bot settings
    #[serde(default)]
    pub telegram: TelegramConfig,
    /// Tool connector settings
    #[serde(default)]
    pub tools: ToolsConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Directory for log files
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// Module-specific overrides
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            dir: default_log_dir(),
            overrides: HashMap::new(),
        }
    }
}

/// Agent loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model used for the main loop
    #[serde(default = "default_model")]
    pub model: String,
    /// Model used by the skill router (falls back to `model`)
    #[serde(default)]
    pub router_model: Option<String>,
    /// Maximum model round-trips per request
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Maximum completion tokens per model call
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Override for the base instruction prompt
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Directory of extra `<id>/SKILL.md` skill definitions
    #[serde(default)]
    pub skills_dir: Option<String>,
    /// Number of recent user messages handed to the skill router
    #[serde(default = "default_router_history")]
    pub router_history: usize,
    /// Whether to route skills per request (false = always inject all)
    #[serde(default = "default_true")]
    pub routing_enabled: bool,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_iterations() -> usize {
    10
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.7
}

fn default_router_history() -> usize {
    3
}

fn default_true() -> bool {
    true
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            router_model: None,
            max_iterations: default_max_iterations(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            system_prompt: None,
            skills_dir: None,
            router_history: default_router_history(),
            routing_enabled: true,
        }
    }
}

/// OpenAI-compatible provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: String::new(),
            extra_headers: HashMap::new(),
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Telegram bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub allow_from: Vec<String>,
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,
    /// Long-poll timeout passed to getUpdates
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
    /// Messages of per-chat history kept in memory
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout() -> u64 {
    25
}

fn default_max_history() -> usize {
    40
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            token: String::new(),
            allow_from: Vec::new(),
            api_base: default_telegram_api_base(),
            poll_timeout_secs: default_poll_timeout(),
            max_history: default_max_history(),
        }
    }
}

/// Tool connector configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolsConfig {
    #[serde(default)]
    pub exec: ExecToolConfig,
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default)]
    pub notion: NotionConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
}

/// Shell tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecToolConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub working_dir: Option<String>,
}

fn default_timeout() -> u64 {
    60
}

impl Default for ExecToolConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: default_timeout(),
            working_dir: None,
        }
    }
}

/// Google Workspace connectors (Gmail, Calendar, Sheets, Docs)
///
/// The access token is obtained out of band; token refresh is not handled
/// here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    #[serde(default)]
    pub access_token: String,
    #[serde(default = "default_gmail_base")]
    pub gmail_base: String,
    #[serde(default = "default_calendar_base")]
    pub calendar_base: String,
    #[serde(default = "default_sheets_base")]
    pub sheets_base: String,
    #[serde(default = "default_docs_base")]
    pub docs_base: String,
    #[serde(default = "default_drive_base")]
    pub drive_base: String,
}

fn default_gmail_base() -> String {
    "https://gmail.googleapis.com/gmail/v1".to_string()
}

fn default_calendar_base() -> String {
    "https://www.googleapis.com/calendar/v3".to_string()
}

fn default_sheets_base() -> String {
    "https://sheets.googleapis.com/v4".to_string()
}

fn default_docs_base() -> String {
    "https://docs.googleapis.com/v1".to_string()
}

fn default_drive_base() -> String {
    "https://www.googleapis.com/drive/v3".to_string()
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            gmail_base: default_gmail_base(),
            calendar_base: default_calendar_base(),
            sheets_base: default_sheets_base(),
            docs_base: default_docs_base(),
            drive_base: default_drive_base(),
        }
    }
}

impl GoogleConfig {
    /// Whether the Google connectors have credentials to work with
    pub fn is_configured(&self) -> bool {
        !self.access_token.trim().is_empty()
    }
}

/// Notion knowledge-base connector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_notion_base")]
    pub base_url: String,
}

fn default_notion_base() -> String {
    "https://api.notion.com/v1".to_string()
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_notion_base(),
        }
    }
}

impl NotionConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// Browser automation sidecar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_browser_endpoint")]
    pub endpoint: String,
}

fn default_browser_endpoint() -> String {
    "http://127.0.0.1:9333".to_string()
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_browser_endpoint(),
        }
    }
}

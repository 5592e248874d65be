//! Browser automation tools
//!
//! The tools talk to a [`BrowserDriver`]; the bundled [`HttpBrowserDriver`]
//! forwards every call to a headless-browser sidecar over HTTP. A single
//! session is shared by all three tools and used by one call at a time.

use crate::base::{require_str, Result, Tool, ToolError, ToolResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use toolpilot_core::config::BrowserConfig;
use tracing::debug;

const MAX_SNAPSHOT_CHARS: usize = 30000;

/// Where the page ended up after a navigation or action
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageState {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
}

/// An interaction with the current page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BrowserAction {
    Click { selector: String },
    Type { selector: String, text: String },
    Press { key: String },
    Scroll { direction: String },
}

impl BrowserAction {
    fn from_args(args: &Value) -> Result<Self> {
        serde_json::from_value(args.clone())
            .map_err(|e| ToolError::InvalidParams(format!("Invalid browser action: {}", e)))
    }
}

/// Narrow interface to whatever drives the browser
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<PageState>;

    /// Text rendering of the current page
    async fn snapshot(&self) -> Result<String>;

    async fn act(&self, action: &BrowserAction) -> Result<PageState>;
}

/// Driver backed by an HTTP sidecar exposing `/navigate`, `/snapshot`, `/act`
pub struct HttpBrowserDriver {
    client: Client,
    endpoint: String,
}

impl HttpBrowserDriver {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_else(|_| Client::new()),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    async fn call(&self, request: reqwest::RequestBuilder) -> Result<Value> {
        let response = request.send().await?;
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            let message = body
                .get("error")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(ToolError::ExecutionFailed(message));
        }
        Ok(body)
    }

    fn page_state(body: Value) -> PageState {
        serde_json::from_value(body).unwrap_or_default()
    }
}

#[async_trait]
impl BrowserDriver for HttpBrowserDriver {
    async fn navigate(&self, url: &str) -> Result<PageState> {
        let body = self
            .call(
                self.client
                    .post(format!("{}/navigate", self.endpoint))
                    .json(&json!({ "url": url })),
            )
            .await?;
        Ok(Self::page_state(body))
    }

    async fn snapshot(&self) -> Result<String> {
        let body = self
            .call(self.client.get(format!("{}/snapshot", self.endpoint)))
            .await?;
        Ok(body
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string())
    }

    async fn act(&self, action: &BrowserAction) -> Result<PageState> {
        let body = self
            .call(
                self.client
                    .post(format!("{}/act", self.endpoint))
                    .json(action),
            )
            .await?;
        Ok(Self::page_state(body))
    }
}

/// One browser session, serialized behind a mutex
pub struct BrowserSession {
    driver: Mutex<Box<dyn BrowserDriver>>,
}

impl BrowserSession {
    pub fn new(driver: impl BrowserDriver + 'static) -> Arc<Self> {
        Arc::new(Self {
            driver: Mutex::new(Box::new(driver)),
        })
    }
}

fn describe_page(prefix: &str, page: &PageState) -> ToolResult {
    let result = ToolResult::ok(format!("{}: {} ({})", prefix, page.title, page.url));
    if page.url.is_empty() {
        result
    } else {
        result.with_url(page.url.clone())
    }
}

pub struct BrowserNavigateTool {
    session: Arc<BrowserSession>,
}

#[async_trait]
impl Tool for BrowserNavigateTool {
    fn name(&self) -> &str {
        "browser_navigate"
    }

    fn description(&self) -> &str {
        "Open a URL in the browser."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"url": {"type": "string", "description": "http(s) URL"}},
            "required": ["url"]
        })
    }

    fn icon(&self) -> Option<&str> {
        Some("globe")
    }

    fn label(&self) -> Option<&str> {
        Some("Browser")
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let url = require_str(&args, "url")?;
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| ToolError::InvalidParams(format!("Invalid URL: {}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ToolError::InvalidParams(format!(
                "Only http/https allowed, got '{}'",
                parsed.scheme()
            )));
        }

        let driver = self.session.driver.lock().await;
        debug!("Browser navigating to {}", url);
        let page = driver.navigate(url).await?;
        Ok(describe_page("Opened", &page))
    }
}

/// Page text for the model; too bulky for the event stream
pub struct BrowserSnapshotTool {
    session: Arc<BrowserSession>,
}

#[async_trait]
impl Tool for BrowserSnapshotTool {
    fn name(&self) -> &str {
        "browser_snapshot"
    }

    fn description(&self) -> &str {
        "Get a text snapshot of the current browser page, including element selectors."
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    fn icon(&self) -> Option<&str> {
        Some("camera")
    }

    fn label(&self) -> Option<&str> {
        Some("Browser")
    }

    fn suppress_output(&self) -> bool {
        true
    }

    async fn execute(&self, _args: Value) -> Result<ToolResult> {
        let driver = self.session.driver.lock().await;
        let snapshot = driver.snapshot().await?;
        Ok(ToolResult::ok(toolpilot_core::utils::preview(
            &snapshot,
            MAX_SNAPSHOT_CHARS,
        )))
    }
}

pub struct BrowserActTool {
    session: Arc<BrowserSession>,
}

#[async_trait]
impl Tool for BrowserActTool {
    fn name(&self) -> &str {
        "browser_act"
    }

    fn description(&self) -> &str {
        "Interact with the current page: click, type, press a key, or scroll."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {"type": "string", "enum": ["click", "type", "press", "scroll"]},
                "selector": {"type": "string", "description": "Target element (click, type)"},
                "text": {"type": "string", "description": "Text to type"},
                "key": {"type": "string", "description": "Key to press, e.g. Enter"},
                "direction": {"type": "string", "enum": ["up", "down"]}
            },
            "required": ["action"]
        })
    }

    fn icon(&self) -> Option<&str> {
        Some("mouse-pointer")
    }

    fn label(&self) -> Option<&str> {
        Some("Browser")
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let action = BrowserAction::from_args(&args)?;
        let driver = self.session.driver.lock().await;
        let page = driver.act(&action).await?;
        let verb = match &action {
            BrowserAction::Click { selector } => format!("Clicked {}", selector),
            BrowserAction::Type { selector, .. } => format!("Typed into {}", selector),
            BrowserAction::Press { key } => format!("Pressed {}", key),
            BrowserAction::Scroll { direction } => format!("Scrolled {}", direction),
        };
        Ok(describe_page(&verb, &page))
    }
}

/// The three browser tools over one shared session
pub fn browser_tools(session: Arc<BrowserSession>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(BrowserNavigateTool {
            session: session.clone(),
        }),
        Arc::new(BrowserSnapshotTool {
            session: session.clone(),
        }),
        Arc::new(BrowserActTool { session }),
    ]
}

pub fn browser_tools_from_config(config: &BrowserConfig) -> Vec<Arc<dyn Tool>> {
    browser_tools(BrowserSession::new(HttpBrowserDriver::new(&config.endpoint)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct FakeDriver {
        calls: Arc<StdMutex<Vec<String>>>,
    }

    #[async_trait]
    impl BrowserDriver for FakeDriver {
        async fn navigate(&self, url: &str) -> Result<PageState> {
            self.calls.lock().unwrap().push(format!("navigate {}", url));
            Ok(PageState {
                url: url.to_string(),
                title: "Example".to_string(),
            })
        }

        async fn snapshot(&self) -> Result<String> {
            self.calls.lock().unwrap().push("snapshot".to_string());
            Ok("button#go Go".to_string())
        }

        async fn act(&self, action: &BrowserAction) -> Result<PageState> {
            self.calls.lock().unwrap().push(format!("{:?}", action));
            Ok(PageState::default())
        }
    }

    #[test]
    fn test_action_from_args() {
        let action = BrowserAction::from_args(&json!({"action": "type", "selector": "#q", "text": "rust"}))
            .unwrap();
        assert_eq!(
            action,
            BrowserAction::Type {
                selector: "#q".to_string(),
                text: "rust".to_string()
            }
        );
        assert!(BrowserAction::from_args(&json!({"action": "click"})).is_err());
    }

    #[tokio::test]
    async fn test_tools_share_session() {
        let driver = FakeDriver::default();
        let calls = driver.calls.clone();
        let tools = browser_tools(BrowserSession::new(driver));

        let nav = tools[0]
            .execute(json!({"url": "https://example.com"}))
            .await
            .unwrap();
        assert_eq!(nav.url.as_deref(), Some("https://example.com"));
        assert!(nav.output.contains("Example"));

        assert!(tools[1].suppress_output());
        let snap = tools[1].execute(json!({})).await.unwrap();
        assert_eq!(snap.output, "button#go Go");

        let act = tools[2]
            .execute(json!({"action": "press", "key": "Enter"}))
            .await
            .unwrap();
        assert!(act.output.starts_with("Pressed Enter"));
        assert!(act.url.is_none());

        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_navigate_rejects_non_http() {
        let tools = browser_tools(BrowserSession::new(FakeDriver::default()));
        assert!(matches!(
            tools[0].execute(json!({"url": "file:///etc/passwd"})).await,
            Err(ToolError::InvalidParams(_))
        ));
    }
}

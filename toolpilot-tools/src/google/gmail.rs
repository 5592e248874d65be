//! Gmail tools: gmail_list, gmail_get, gmail_send

use crate::base::{bounded_u64, optional_str, require_str, Result, Tool, ToolResult};
use crate::http::{str_at, ApiClient};
use async_trait::async_trait;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use serde_json::{json, Value};

const MAX_BODY_CHARS: usize = 8000;

fn header<'a>(message: &'a Value, name: &str) -> &'a str {
    message
        .pointer("/payload/headers")
        .and_then(Value::as_array)
        .and_then(|headers| {
            headers
                .iter()
                .find(|h| str_at(h, "/name").eq_ignore_ascii_case(name))
        })
        .map(|h| str_at(h, "/value"))
        .unwrap_or("")
}

fn decode_body(data: &str) -> Option<String> {
    let trimmed = data.trim_end_matches('=');
    URL_SAFE_NO_PAD
        .decode(trimmed)
        .ok()
        .map(|bytes| String::from_utf8_lossy(&bytes).to_string())
}

/// Find the first `text/plain` part (falling back to `text/html`) and decode it
fn extract_text(payload: &Value) -> Option<String> {
    fn find(part: &Value, mime: &str) -> Option<String> {
        if str_at(part, "/mimeType") == mime {
            if let Some(text) = part.pointer("/body/data").and_then(Value::as_str) {
                return decode_body(text);
            }
        }
        part.get("parts")
            .and_then(Value::as_array)?
            .iter()
            .find_map(|p| find(p, mime))
    }

    find(payload, "text/plain").or_else(|| find(payload, "text/html"))
}

/// Build the base64url-encoded RFC 822 message Gmail expects in `raw`
pub(crate) fn encode_message(to: &str, cc: Option<&str>, subject: &str, body: &str) -> String {
    let mut message = format!("To: {}\r\n", to);
    if let Some(cc) = cc {
        message.push_str(&format!("Cc: {}\r\n", cc));
    }
    message.push_str(&format!("Subject: {}\r\n", subject));
    message.push_str("MIME-Version: 1.0\r\n");
    message.push_str("Content-Type: text/plain; charset=\"UTF-8\"\r\n\r\n");
    message.push_str(body);
    URL_SAFE.encode(message.as_bytes())
}

/// List recent messages matching a Gmail search query
pub struct GmailListTool {
    api: ApiClient,
}

impl GmailListTool {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Tool for GmailListTool {
    fn name(&self) -> &str {
        "gmail_list"
    }

    fn description(&self) -> &str {
        "List emails in the user's Gmail inbox. Supports Gmail search syntax (e.g. 'from:alice is:unread')."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Gmail search query"},
                "max_results": {"type": "integer", "description": "Number of messages (1-25)", "minimum": 1, "maximum": 25}
            }
        })
    }

    fn icon(&self) -> Option<&str> {
        Some("mail")
    }

    fn label(&self) -> Option<&str> {
        Some("Gmail")
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let max_results = bounded_u64(&args, "max_results", 10, 1, 25);
        let mut query = vec![("maxResults", max_results.to_string())];
        if let Some(q) = optional_str(&args, "query") {
            query.push(("q", q.to_string()));
        }

        let listing = self.api.get(&["users", "me", "messages"], &query).await?;
        let ids: Vec<String> = listing
            .get("messages")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|m| str_at(m, "/id").to_string())
                    .filter(|id| !id.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        if ids.is_empty() {
            return Ok(ToolResult::ok("No messages found."));
        }

        let metadata_query = [
            ("format", "metadata".to_string()),
            ("metadataHeaders", "From".to_string()),
            ("metadataHeaders", "Subject".to_string()),
            ("metadataHeaders", "Date".to_string()),
        ];

        let mut lines = vec![format!("Found {} message(s):", ids.len())];
        for id in &ids {
            let message = self
                .api
                .get(&["users", "me", "messages", id], &metadata_query)
                .await?;
            lines.push(format!(
                "- [{}] {} | from {} | {}",
                id,
                header(&message, "Subject"),
                header(&message, "From"),
                header(&message, "Date"),
            ));
            let snippet = str_at(&message, "/snippet");
            if !snippet.is_empty() {
                lines.push(format!("  {}", snippet));
            }
        }

        Ok(ToolResult::ok(lines.join("\n")))
    }
}

/// Read one message in full
pub struct GmailGetTool {
    api: ApiClient,
}

impl GmailGetTool {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Tool for GmailGetTool {
    fn name(&self) -> &str {
        "gmail_get"
    }

    fn description(&self) -> &str {
        "Read the full content of one Gmail message by id."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": {"type": "string", "description": "Message id from gmail_list"}
            },
            "required": ["id"]
        })
    }

    fn icon(&self) -> Option<&str> {
        Some("mail")
    }

    fn label(&self) -> Option<&str> {
        Some("Gmail")
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let id = require_str(&args, "id")?;
        let message = self
            .api
            .get(&["users", "me", "messages", id], &[("format", "full".to_string())])
            .await?;

        let body = message
            .get("payload")
            .and_then(extract_text)
            .unwrap_or_else(|| str_at(&message, "/snippet").to_string());
        let body = toolpilot_core::utils::preview(body.trim(), MAX_BODY_CHARS);

        let output = format!(
            "From: {}\nTo: {}\nSubject: {}\nDate: {}\n\n{}",
            header(&message, "From"),
            header(&message, "To"),
            header(&message, "Subject"),
            header(&message, "Date"),
            body
        );
        Ok(ToolResult::ok(output)
            .with_url(format!("https://mail.google.com/mail/u/0/#inbox/{}", id)))
    }
}

/// Send a plain-text email
pub struct GmailSendTool {
    api: ApiClient,
}

impl GmailSendTool {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Tool for GmailSendTool {
    fn name(&self) -> &str {
        "gmail_send"
    }

    fn description(&self) -> &str {
        "Send a plain-text email from the user's Gmail account."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "to": {"type": "string", "description": "Recipient address(es), comma separated"},
                "subject": {"type": "string"},
                "body": {"type": "string", "description": "Plain-text body"},
                "cc": {"type": "string"}
            },
            "required": ["to", "subject", "body"]
        })
    }

    fn icon(&self) -> Option<&str> {
        Some("send")
    }

    fn label(&self) -> Option<&str> {
        Some("Gmail")
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let to = require_str(&args, "to")?;
        let subject = require_str(&args, "subject")?;
        let body = args.get("body").and_then(Value::as_str).unwrap_or("");
        let raw = encode_message(to, optional_str(&args, "cc"), subject, body);

        let sent = self
            .api
            .post(
                &["users", "me", "messages", "send"],
                &[],
                &json!({ "raw": raw }),
            )
            .await?;

        Ok(ToolResult::ok(format!(
            "Email sent to {} (id: {})",
            to,
            str_at(&sent, "/id")
        )))
    }
}

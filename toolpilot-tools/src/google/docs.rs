//! Google Docs tools

use crate::base::{optional_str, require_str, Result, Tool, ToolResult};
use crate::http::{str_at, ApiClient};
use async_trait::async_trait;
use serde_json::{json, Value};

const DEFAULT_EXPORT_MIME: &str = "text/plain";
const MAX_TEXT_CHARS: usize = 20000;

pub(crate) fn document_url(id: &str) -> String {
    format!("https://docs.google.com/document/d/{}/edit", id)
}

/// Concatenate the text runs of a document body
fn document_text(document: &Value) -> String {
    let mut text = String::new();
    let content = document
        .pointer("/body/content")
        .and_then(Value::as_array)
        .into_iter()
        .flatten();
    for element in content {
        let runs = element
            .pointer("/paragraph/elements")
            .and_then(Value::as_array)
            .into_iter()
            .flatten();
        for run in runs {
            text.push_str(str_at(run, "/textRun/content"));
        }
    }
    text
}

fn is_textual(mime: &str) -> bool {
    mime.starts_with("text/") || mime.ends_with("json") || mime.ends_with("xml")
}

/// Create a document, optionally with initial text
pub struct DocsCreateTool {
    api: ApiClient,
}

impl DocsCreateTool {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Tool for DocsCreateTool {
    fn name(&self) -> &str {
        "docs_create"
    }

    fn description(&self) -> &str {
        "Create a new Google Doc with a title and optional initial text."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": {"type": "string"},
                "content": {"type": "string", "description": "Initial plain-text content"}
            },
            "required": ["title"]
        })
    }

    fn icon(&self) -> Option<&str> {
        Some("file-text")
    }

    fn label(&self) -> Option<&str> {
        Some("Docs")
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let title = require_str(&args, "title")?;
        let created = self
            .api
            .post(&["documents"], &[], &json!({ "title": title }))
            .await?;
        let id = str_at(&created, "/documentId").to_string();

        if let Some(content) = optional_str(&args, "content") {
            let batch = format!("{}:batchUpdate", id);
            self.api
                .post(
                    &["documents", &batch],
                    &[],
                    &json!({
                        "requests": [{
                            "insertText": {"location": {"index": 1}, "text": content}
                        }]
                    }),
                )
                .await?;
        }

        Ok(ToolResult::ok(format!("Created document '{}' (id: {})", title, id))
            .with_url(document_url(&id)))
    }
}

/// Read a document's text
pub struct DocsReadTool {
    api: ApiClient,
}

impl DocsReadTool {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Tool for DocsReadTool {
    fn name(&self) -> &str {
        "docs_read"
    }

    fn description(&self) -> &str {
        "Read the title and text content of a Google Doc."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"document_id": {"type": "string"}},
            "required": ["document_id"]
        })
    }

    fn icon(&self) -> Option<&str> {
        Some("file-text")
    }

    fn label(&self) -> Option<&str> {
        Some("Docs")
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let id = require_str(&args, "document_id")?;
        let document = self.api.get(&["documents", id], &[]).await?;
        let text = document_text(&document);

        Ok(ToolResult::ok(format!(
            "Title: {}\n\n{}",
            str_at(&document, "/title"),
            toolpilot_core::utils::preview(text.trim_end(), MAX_TEXT_CHARS)
        ))
        .with_url(document_url(id)))
    }
}

/// Export a document through Drive
///
/// Exports can be large, so the output is kept out of `tool_result` events.
pub struct DocsExportTool {
    drive: ApiClient,
}

impl DocsExportTool {
    pub fn new(drive: ApiClient) -> Self {
        Self { drive }
    }
}

#[async_trait]
impl Tool for DocsExportTool {
    fn name(&self) -> &str {
        "docs_export"
    }

    fn description(&self) -> &str {
        "Export a Google Doc to another format (text/plain, text/html, text/markdown, application/pdf, ...)."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "document_id": {"type": "string"},
                "mime_type": {"type": "string", "description": "Target MIME type, default text/plain"}
            },
            "required": ["document_id"]
        })
    }

    fn icon(&self) -> Option<&str> {
        Some("download")
    }

    fn label(&self) -> Option<&str> {
        Some("Docs")
    }

    fn suppress_output(&self) -> bool {
        true
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let id = require_str(&args, "document_id")?;
        let mime = optional_str(&args, "mime_type").unwrap_or(DEFAULT_EXPORT_MIME);
        let bytes = self
            .drive
            .get_bytes(&["files", id, "export"], &[("mimeType", mime.to_string())])
            .await?;

        let output = if is_textual(mime) {
            String::from_utf8_lossy(&bytes).to_string()
        } else {
            format!("Exported document {} as {} ({} bytes)", id, mime, bytes.len())
        };
        Ok(ToolResult::ok(output).with_url(document_url(id)))
    }
}

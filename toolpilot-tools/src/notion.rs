//! Knowledge-base tools backed by Notion

use crate::base::{bounded_u64, optional_str, require_str, Result, StaticToken, Tool, ToolResult};
use crate::http::{str_at, ApiClient};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use toolpilot_core::config::NotionConfig;

const NOTION_VERSION: &str = "2022-06-28";
const MAX_BLOCK_TEXT: usize = 2000;

/// Concatenate a rich-text array into plain text
fn plain_text(rich_text: Option<&Value>) -> String {
    rich_text
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .map(|p| str_at(p, "/plain_text"))
                .collect::<String>()
        })
        .unwrap_or_default()
}

/// Title of a page, whichever property holds it
fn page_title(page: &Value) -> String {
    page.get("properties")
        .and_then(Value::as_object)
        .and_then(|props| {
            props
                .values()
                .find(|p| str_at(p, "/type") == "title")
                .map(|p| plain_text(p.get("title")))
        })
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "(untitled)".to_string())
}

/// Plain text of one block, prefixed by a marker for its type
fn block_text(block: &Value) -> Option<String> {
    let kind = str_at(block, "/type");
    let text = plain_text(block.get(kind).and_then(|b| b.get("rich_text")));
    if text.is_empty() {
        return None;
    }
    let line = match kind {
        "heading_1" => format!("# {}", text),
        "heading_2" => format!("## {}", text),
        "heading_3" => format!("### {}", text),
        "bulleted_list_item" => format!("- {}", text),
        "numbered_list_item" => format!("1. {}", text),
        "to_do" => {
            let checked = block
                .pointer("/to_do/checked")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            format!("[{}] {}", if checked { "x" } else { " " }, text)
        }
        "quote" => format!("> {}", text),
        _ => text,
    };
    Some(line)
}

/// Split text into paragraph blocks (Notion caps rich text at 2000 chars)
pub(crate) fn paragraph_blocks(content: &str) -> Vec<Value> {
    content
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .flat_map(|paragraph| {
            let chars: Vec<char> = paragraph.chars().collect();
            chars
                .chunks(MAX_BLOCK_TEXT)
                .map(|chunk| chunk.iter().collect::<String>())
                .collect::<Vec<_>>()
        })
        .map(|text| {
            json!({
                "object": "block",
                "type": "paragraph",
                "paragraph": {"rich_text": [{"type": "text", "text": {"content": text}}]}
            })
        })
        .collect()
}

fn page_url(page: &Value) -> Option<String> {
    page.get("url").and_then(Value::as_str).map(str::to_string)
}

/// Search pages by title
pub struct KbSearchTool {
    api: ApiClient,
}

#[async_trait]
impl Tool for KbSearchTool {
    fn name(&self) -> &str {
        "kb_search"
    }

    fn description(&self) -> &str {
        "Search the knowledge base for pages whose title matches a query."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "max_results": {"type": "integer", "minimum": 1, "maximum": 50}
            },
            "required": ["query"]
        })
    }

    fn icon(&self) -> Option<&str> {
        Some("search")
    }

    fn label(&self) -> Option<&str> {
        Some("Knowledge base")
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let query = require_str(&args, "query")?;
        let page_size = bounded_u64(&args, "max_results", 10, 1, 50);
        let data = self
            .api
            .post(
                &["search"],
                &[],
                &json!({
                    "query": query,
                    "page_size": page_size,
                    "filter": {"property": "object", "value": "page"}
                }),
            )
            .await?;

        let pages = data
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        if pages.is_empty() {
            return Ok(ToolResult::ok(format!("No pages found for: {}", query)));
        }

        let mut lines = vec![format!("Found {} page(s):", pages.len())];
        for page in &pages {
            lines.push(format!(
                "- {} [id: {}] {}",
                page_title(page),
                str_at(page, "/id"),
                str_at(page, "/url")
            ));
        }
        Ok(ToolResult::ok(lines.join("\n")))
    }
}

/// Read a page's title and top-level blocks
pub struct KbGetPageTool {
    api: ApiClient,
}

#[async_trait]
impl Tool for KbGetPageTool {
    fn name(&self) -> &str {
        "kb_get_page"
    }

    fn description(&self) -> &str {
        "Read the content of a knowledge-base page by id."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"page_id": {"type": "string"}},
            "required": ["page_id"]
        })
    }

    fn icon(&self) -> Option<&str> {
        Some("book-open")
    }

    fn label(&self) -> Option<&str> {
        Some("Knowledge base")
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let page_id = require_str(&args, "page_id")?;
        let page = self.api.get(&["pages", page_id], &[]).await?;
        let blocks = self
            .api
            .get(
                &["blocks", page_id, "children"],
                &[("page_size", "100".to_string())],
            )
            .await?;

        let body: Vec<String> = blocks
            .get("results")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(block_text)
            .collect();

        let output = format!("# {}\n\n{}", page_title(&page), body.join("\n"));
        let mut result = ToolResult::ok(output.trim_end());
        if let Some(url) = page_url(&page) {
            result = result.with_url(url);
        }
        Ok(result)
    }
}

/// Create a page under a parent page or database
pub struct KbCreatePageTool {
    api: ApiClient,
}

#[async_trait]
impl Tool for KbCreatePageTool {
    fn name(&self) -> &str {
        "kb_create_page"
    }

    fn description(&self) -> &str {
        "Create a knowledge-base page under a parent page (or database) with optional text content."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "parent_id": {"type": "string"},
                "parent_type": {"type": "string", "enum": ["page", "database"], "description": "Default 'page'"},
                "title": {"type": "string"},
                "content": {"type": "string", "description": "Plain text; blank lines separate paragraphs"}
            },
            "required": ["parent_id", "title"]
        })
    }

    fn icon(&self) -> Option<&str> {
        Some("file-plus")
    }

    fn label(&self) -> Option<&str> {
        Some("Knowledge base")
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let parent_id = require_str(&args, "parent_id")?;
        let title = require_str(&args, "title")?;
        let title_value = json!({"title": [{"type": "text", "text": {"content": title}}]});

        let (parent, properties) = match optional_str(&args, "parent_type") {
            Some("database") => (
                json!({ "database_id": parent_id }),
                json!({ "Name": title_value }),
            ),
            _ => (
                json!({ "page_id": parent_id }),
                json!({ "title": title_value }),
            ),
        };

        let mut body = json!({ "parent": parent, "properties": properties });
        if let Some(content) = optional_str(&args, "content") {
            body["children"] = Value::Array(paragraph_blocks(content));
        }

        let page = self.api.post(&["pages"], &[], &body).await?;
        let mut result = ToolResult::ok(format!(
            "Created page '{}' (id: {})",
            title,
            str_at(&page, "/id")
        ));
        if let Some(url) = page_url(&page) {
            result = result.with_url(url);
        }
        Ok(result)
    }
}

/// Append paragraphs to a page
pub struct KbAppendTool {
    api: ApiClient,
}

#[async_trait]
impl Tool for KbAppendTool {
    fn name(&self) -> &str {
        "kb_append"
    }

    fn description(&self) -> &str {
        "Append text paragraphs to the end of a knowledge-base page."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "page_id": {"type": "string"},
                "content": {"type": "string"}
            },
            "required": ["page_id", "content"]
        })
    }

    fn icon(&self) -> Option<&str> {
        Some("file-plus")
    }

    fn label(&self) -> Option<&str> {
        Some("Knowledge base")
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let page_id = require_str(&args, "page_id")?;
        let blocks = paragraph_blocks(require_str(&args, "content")?);
        let count = blocks.len();
        self.api
            .patch(
                &["blocks", page_id, "children"],
                &json!({ "children": blocks }),
            )
            .await?;
        Ok(ToolResult::ok(format!(
            "Appended {} paragraph(s) to page {}",
            count, page_id
        )))
    }
}

/// Move a page to the trash
pub struct KbArchivePageTool {
    api: ApiClient,
}

#[async_trait]
impl Tool for KbArchivePageTool {
    fn name(&self) -> &str {
        "kb_archive_page"
    }

    fn description(&self) -> &str {
        "Archive (delete) a knowledge-base page by id."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"page_id": {"type": "string"}},
            "required": ["page_id"]
        })
    }

    fn icon(&self) -> Option<&str> {
        Some("archive")
    }

    fn label(&self) -> Option<&str> {
        Some("Knowledge base")
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let page_id = require_str(&args, "page_id")?;
        self.api
            .patch(&["pages", page_id], &json!({ "archived": true }))
            .await?;
        Ok(ToolResult::ok(format!("Archived page {}", page_id)))
    }
}

/// Client for the Notion API with its version header applied
pub fn notion_client(base_url: &str, api_key: &str) -> ApiClient {
    ApiClient::new(base_url, Arc::new(StaticToken::new(api_key, "Notion")))
        .with_header("Notion-Version", NOTION_VERSION)
}

/// All knowledge-base tools over one client
pub fn notion_tools(api: ApiClient) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(KbSearchTool { api: api.clone() }),
        Arc::new(KbGetPageTool { api: api.clone() }),
        Arc::new(KbCreatePageTool { api: api.clone() }),
        Arc::new(KbAppendTool { api: api.clone() }),
        Arc::new(KbArchivePageTool { api }),
    ]
}

pub fn notion_tools_from_config(config: &NotionConfig) -> Vec<Arc<dyn Tool>> {
    notion_tools(notion_client(&config.base_url, &config.api_key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_title_from_any_title_property() {
        let page = json!({
            "properties": {
                "Status": {"type": "select"},
                "Name": {"type": "title", "title": [{"plain_text": "Road"}, {"plain_text": "map"}]}
            }
        });
        assert_eq!(page_title(&page), "Roadmap");
        assert_eq!(page_title(&json!({})), "(untitled)");
    }

    #[test]
    fn test_block_text_markers() {
        let block = json!({
            "type": "to_do",
            "to_do": {"checked": true, "rich_text": [{"plain_text": "ship"}]}
        });
        assert_eq!(block_text(&block).as_deref(), Some("[x] ship"));
        let empty = json!({"type": "divider", "divider": {}});
        assert!(block_text(&empty).is_none());
    }

    #[test]
    fn test_paragraph_blocks_split_and_chunk() {
        let long = "a".repeat(MAX_BLOCK_TEXT + 10);
        let blocks = paragraph_blocks(&format!("first\n\n\n\n{}", long));
        assert_eq!(blocks.len(), 3);
        assert_eq!(
            blocks[0]["paragraph"]["rich_text"][0]["text"]["content"],
            "first"
        );
    }
}

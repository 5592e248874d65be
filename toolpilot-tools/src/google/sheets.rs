//! Google Sheets tools

use crate::base::{require_str, Result, Tool, ToolError, ToolResult};
use crate::http::{str_at, ApiClient};
use async_trait::async_trait;
use serde_json::{json, Value};

const MAX_ROWS_SHOWN: usize = 200;

pub(crate) fn spreadsheet_url(id: &str) -> String {
    format!("https://docs.google.com/spreadsheets/d/{}/edit", id)
}

fn cell_text(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Render a values grid as tab-separated rows
fn render_rows(values: &[Value]) -> String {
    let mut lines: Vec<String> = values
        .iter()
        .take(MAX_ROWS_SHOWN)
        .map(|row| {
            row.as_array()
                .map(|cells| cells.iter().map(cell_text).collect::<Vec<_>>().join("\t"))
                .unwrap_or_default()
        })
        .collect();
    if values.len() > MAX_ROWS_SHOWN {
        lines.push(format!("... ({} more rows)", values.len() - MAX_ROWS_SHOWN));
    }
    lines.join("\n")
}

fn values_arg(args: &Value) -> Result<Value> {
    let values = args
        .get("values")
        .and_then(Value::as_array)
        .ok_or_else(|| ToolError::InvalidParams("'values' must be an array of rows".to_string()))?;
    if values.iter().any(|row| !row.is_array()) {
        return Err(ToolError::InvalidParams(
            "'values' must be an array of rows (arrays)".to_string(),
        ));
    }
    Ok(Value::Array(values.clone()))
}

fn id_and_range(args: &Value) -> Result<(&str, &str)> {
    Ok((
        require_str(args, "spreadsheet_id")?,
        require_str(args, "range")?,
    ))
}

fn range_schema(with_values: bool) -> Value {
    let mut properties = json!({
        "spreadsheet_id": {"type": "string"},
        "range": {"type": "string", "description": "A1 notation, e.g. 'Sheet1!A1:C10'"}
    });
    let mut required = vec!["spreadsheet_id", "range"];
    if with_values {
        properties["values"] = json!({
            "type": "array",
            "items": {"type": "array", "items": {}},
            "description": "Rows of cell values"
        });
        required.push("values");
    }
    json!({"type": "object", "properties": properties, "required": required})
}

/// Spreadsheet title and tab list
pub struct SheetsMetadataTool {
    api: ApiClient,
}

impl SheetsMetadataTool {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Tool for SheetsMetadataTool {
    fn name(&self) -> &str {
        "sheets_metadata"
    }

    fn description(&self) -> &str {
        "Get a spreadsheet's title and the names and sizes of its sheets."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"spreadsheet_id": {"type": "string"}},
            "required": ["spreadsheet_id"]
        })
    }

    fn icon(&self) -> Option<&str> {
        Some("table")
    }

    fn label(&self) -> Option<&str> {
        Some("Sheets")
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let id = require_str(&args, "spreadsheet_id")?;
        let data = self
            .api
            .get(
                &["spreadsheets", id],
                &[("fields", "properties.title,sheets.properties".to_string())],
            )
            .await?;

        let mut lines = vec![format!("Spreadsheet: {}", str_at(&data, "/properties/title"))];
        for sheet in data
            .get("sheets")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            let props = sheet.get("properties").cloned().unwrap_or(Value::Null);
            lines.push(format!(
                "- {} ({} rows x {} cols)",
                str_at(&props, "/title"),
                props
                    .pointer("/gridProperties/rowCount")
                    .and_then(Value::as_u64)
                    .unwrap_or(0),
                props
                    .pointer("/gridProperties/columnCount")
                    .and_then(Value::as_u64)
                    .unwrap_or(0),
            ));
        }

        Ok(ToolResult::ok(lines.join("\n")).with_url(spreadsheet_url(id)))
    }
}

/// Read a range of cells
pub struct SheetsReadTool {
    api: ApiClient,
}

impl SheetsReadTool {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Tool for SheetsReadTool {
    fn name(&self) -> &str {
        "sheets_read"
    }

    fn description(&self) -> &str {
        "Read cell values from a spreadsheet range."
    }

    fn parameters(&self) -> Value {
        range_schema(false)
    }

    fn icon(&self) -> Option<&str> {
        Some("table")
    }

    fn label(&self) -> Option<&str> {
        Some("Sheets")
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let (id, range) = id_and_range(&args)?;
        let data = self
            .api
            .get(&["spreadsheets", id, "values", range], &[])
            .await?;

        let rows = data
            .get("values")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let output = if rows.is_empty() {
            format!("Range {} is empty.", range)
        } else {
            format!(
                "{} ({} row(s)):\n{}",
                match str_at(&data, "/range") {
                    "" => range,
                    r => r,
                },
                rows.len(),
                render_rows(&rows)
            )
        };

        Ok(ToolResult::ok(output).with_url(spreadsheet_url(id)))
    }
}

/// Overwrite a range of cells
pub struct SheetsWriteTool {
    api: ApiClient,
}

impl SheetsWriteTool {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Tool for SheetsWriteTool {
    fn name(&self) -> &str {
        "sheets_write"
    }

    fn description(&self) -> &str {
        "Write rows of values into a spreadsheet range, overwriting existing cells."
    }

    fn parameters(&self) -> Value {
        range_schema(true)
    }

    fn icon(&self) -> Option<&str> {
        Some("table")
    }

    fn label(&self) -> Option<&str> {
        Some("Sheets")
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let (id, range) = id_and_range(&args)?;
        let values = values_arg(&args)?;
        let data = self
            .api
            .put(
                &["spreadsheets", id, "values", range],
                &[("valueInputOption", "USER_ENTERED".to_string())],
                &json!({ "range": range, "values": values }),
            )
            .await?;

        Ok(ToolResult::ok(format!(
            "Updated {} cell(s) in {}",
            data.get("updatedCells").and_then(Value::as_u64).unwrap_or(0),
            match str_at(&data, "/updatedRange") {
                "" => range,
                r => r,
            }
        ))
        .with_url(spreadsheet_url(id)))
    }
}

/// Append rows after the last row of a table
pub struct SheetsAppendTool {
    api: ApiClient,
}

impl SheetsAppendTool {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Tool for SheetsAppendTool {
    fn name(&self) -> &str {
        "sheets_append"
    }

    fn description(&self) -> &str {
        "Append rows to the table found in a spreadsheet range."
    }

    fn parameters(&self) -> Value {
        range_schema(true)
    }

    fn icon(&self) -> Option<&str> {
        Some("table")
    }

    fn label(&self) -> Option<&str> {
        Some("Sheets")
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let (id, range) = id_and_range(&args)?;
        let values = values_arg(&args)?;
        let appended = format!("{}:append", range);
        let data = self
            .api
            .post(
                &["spreadsheets", id, "values", &appended],
                &[
                    ("valueInputOption", "USER_ENTERED".to_string()),
                    ("insertDataOption", "INSERT_ROWS".to_string()),
                ],
                &json!({ "values": values }),
            )
            .await?;

        Ok(ToolResult::ok(format!(
            "Appended {} row(s) to {}",
            data.pointer("/updates/updatedRows")
                .and_then(Value::as_u64)
                .unwrap_or(0),
            match str_at(&data, "/updates/updatedRange") {
                "" => range,
                r => r,
            }
        ))
        .with_url(spreadsheet_url(id)))
    }
}

/// Clear values in a range, keeping formatting
pub struct SheetsClearTool {
    api: ApiClient,
}

impl SheetsClearTool {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Tool for SheetsClearTool {
    fn name(&self) -> &str {
        "sheets_clear"
    }

    fn description(&self) -> &str {
        "Clear all values in a spreadsheet range."
    }

    fn parameters(&self) -> Value {
        range_schema(false)
    }

    fn icon(&self) -> Option<&str> {
        Some("eraser")
    }

    fn label(&self) -> Option<&str> {
        Some("Sheets")
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let (id, range) = id_and_range(&args)?;
        let cleared = format!("{}:clear", range);
        let data = self
            .api
            .post(&["spreadsheets", id, "values", &cleared], &[], &json!({}))
            .await?;

        Ok(ToolResult::ok(format!(
            "Cleared {}",
            match str_at(&data, "/clearedRange") {
                "" => range,
                r => r,
            }
        ))
        .with_url(spreadsheet_url(id)))
    }
}

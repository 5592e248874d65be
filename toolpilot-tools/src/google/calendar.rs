//! Google Calendar tools

use crate::base::{bounded_u64, optional_str, require_str, Result, Tool, ToolError, ToolResult};
use crate::http::{str_at, ApiClient};
use async_trait::async_trait;
use chrono::{Duration, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

const DEFAULT_CALENDAR: &str = "primary";

fn calendar_id(args: &Value) -> &str {
    optional_str(args, "calendar_id").unwrap_or(DEFAULT_CALENDAR)
}

/// Calendar accepts either `{date}` for all-day events or `{dateTime}`
fn event_time(value: &str) -> Value {
    if value.len() == 10 && !value.contains('T') {
        json!({ "date": value })
    } else {
        json!({ "dateTime": value })
    }
}

fn event_when(event: &Value, key: &str) -> String {
    let when = event.get(key).cloned().unwrap_or(Value::Null);
    let date_time = str_at(&when, "/dateTime");
    if date_time.is_empty() {
        str_at(&when, "/date").to_string()
    } else {
        date_time.to_string()
    }
}

fn describe_event(event: &Value) -> String {
    let summary = match str_at(event, "/summary") {
        "" => "(no title)",
        s => s,
    };
    let mut line = format!(
        "- {} ({} to {}) [id: {}]",
        summary,
        event_when(event, "start"),
        event_when(event, "end"),
        str_at(event, "/id")
    );
    let location = str_at(event, "/location");
    if !location.is_empty() {
        line.push_str(&format!(" @ {}", location));
    }
    line
}

fn html_link(event: &Value) -> Option<String> {
    event
        .get("htmlLink")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// List upcoming events
pub struct CalendarListTool {
    api: ApiClient,
}

impl CalendarListTool {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Tool for CalendarListTool {
    fn name(&self) -> &str {
        "calendar_list"
    }

    fn description(&self) -> &str {
        "List calendar events in a time window. Defaults to the next 7 days. Times are RFC 3339."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "time_min": {"type": "string", "description": "Window start (RFC 3339), default now"},
                "time_max": {"type": "string", "description": "Window end (RFC 3339), default now + 7 days"},
                "max_results": {"type": "integer", "minimum": 1, "maximum": 50},
                "calendar_id": {"type": "string", "description": "Calendar id, default 'primary'"}
            }
        })
    }

    fn icon(&self) -> Option<&str> {
        Some("calendar")
    }

    fn label(&self) -> Option<&str> {
        Some("Calendar")
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let now = Utc::now();
        let time_min = optional_str(&args, "time_min")
            .map(str::to_string)
            .unwrap_or_else(|| now.to_rfc3339_opts(SecondsFormat::Secs, true));
        let time_max = optional_str(&args, "time_max")
            .map(str::to_string)
            .unwrap_or_else(|| (now + Duration::days(7)).to_rfc3339_opts(SecondsFormat::Secs, true));
        let max_results = bounded_u64(&args, "max_results", 20, 1, 50);

        let query = [
            ("timeMin", time_min.clone()),
            ("timeMax", time_max.clone()),
            ("maxResults", max_results.to_string()),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
        ];
        let data = self
            .api
            .get(&["calendars", calendar_id(&args), "events"], &query)
            .await?;

        let events = data
            .get("items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        if events.is_empty() {
            return Ok(ToolResult::ok(format!(
                "No events found between {} and {}.",
                time_min, time_max
            )));
        }

        let mut lines = vec![format!("Found {} event(s):", events.len())];
        lines.extend(events.iter().map(describe_event));
        Ok(ToolResult::ok(lines.join("\n")))
    }
}

/// Create an event
pub struct CalendarCreateTool {
    api: ApiClient,
}

impl CalendarCreateTool {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Tool for CalendarCreateTool {
    fn name(&self) -> &str {
        "calendar_create"
    }

    fn description(&self) -> &str {
        "Create a calendar event. Use RFC 3339 date-times, or YYYY-MM-DD for all-day events."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "summary": {"type": "string", "description": "Event title"},
                "start": {"type": "string"},
                "end": {"type": "string"},
                "description": {"type": "string"},
                "location": {"type": "string"},
                "attendees": {"type": "array", "items": {"type": "string"}, "description": "Attendee emails"},
                "calendar_id": {"type": "string"}
            },
            "required": ["summary", "start", "end"]
        })
    }

    fn icon(&self) -> Option<&str> {
        Some("calendar-plus")
    }

    fn label(&self) -> Option<&str> {
        Some("Calendar")
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let summary = require_str(&args, "summary")?;
        let mut body = json!({
            "summary": summary,
            "start": event_time(require_str(&args, "start")?),
            "end": event_time(require_str(&args, "end")?),
        });
        if let Some(description) = optional_str(&args, "description") {
            body["description"] = json!(description);
        }
        if let Some(location) = optional_str(&args, "location") {
            body["location"] = json!(location);
        }
        if let Some(attendees) = args.get("attendees").and_then(Value::as_array) {
            let list: Vec<Value> = attendees
                .iter()
                .filter_map(Value::as_str)
                .map(|email| json!({ "email": email }))
                .collect();
            body["attendees"] = Value::Array(list);
        }

        let event = self
            .api
            .post(&["calendars", calendar_id(&args), "events"], &[], &body)
            .await?;

        let mut result = ToolResult::ok(format!("Created event:\n{}", describe_event(&event)));
        if let Some(link) = html_link(&event) {
            result = result.with_url(link);
        }
        Ok(result)
    }
}

/// Patch fields of an existing event
pub struct CalendarUpdateTool {
    api: ApiClient,
}

impl CalendarUpdateTool {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Tool for CalendarUpdateTool {
    fn name(&self) -> &str {
        "calendar_update"
    }

    fn description(&self) -> &str {
        "Update an existing calendar event. Only the given fields change."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "event_id": {"type": "string"},
                "summary": {"type": "string"},
                "start": {"type": "string"},
                "end": {"type": "string"},
                "description": {"type": "string"},
                "location": {"type": "string"},
                "calendar_id": {"type": "string"}
            },
            "required": ["event_id"]
        })
    }

    fn icon(&self) -> Option<&str> {
        Some("calendar")
    }

    fn label(&self) -> Option<&str> {
        Some("Calendar")
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let event_id = require_str(&args, "event_id")?;

        let mut patch = Map::new();
        for key in ["summary", "description", "location"] {
            if let Some(value) = optional_str(&args, key) {
                patch.insert(key.to_string(), json!(value));
            }
        }
        for key in ["start", "end"] {
            if let Some(value) = optional_str(&args, key) {
                patch.insert(key.to_string(), event_time(value));
            }
        }
        if patch.is_empty() {
            return Err(ToolError::InvalidParams(
                "Nothing to update: provide at least one field".to_string(),
            ));
        }

        let event = self
            .api
            .patch(
                &["calendars", calendar_id(&args), "events", event_id],
                &Value::Object(patch),
            )
            .await?;

        let mut result = ToolResult::ok(format!("Updated event:\n{}", describe_event(&event)));
        if let Some(link) = html_link(&event) {
            result = result.with_url(link);
        }
        Ok(result)
    }
}

/// Delete an event
pub struct CalendarDeleteTool {
    api: ApiClient,
}

impl CalendarDeleteTool {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Tool for CalendarDeleteTool {
    fn name(&self) -> &str {
        "calendar_delete"
    }

    fn description(&self) -> &str {
        "Delete a calendar event by id."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "event_id": {"type": "string"},
                "calendar_id": {"type": "string"}
            },
            "required": ["event_id"]
        })
    }

    fn icon(&self) -> Option<&str> {
        Some("calendar-x")
    }

    fn label(&self) -> Option<&str> {
        Some("Calendar")
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let event_id = require_str(&args, "event_id")?;
        self.api
            .delete(&["calendars", calendar_id(&args), "events", event_id])
            .await?;
        Ok(ToolResult::ok(format!("Deleted event {}", event_id)))
    }
}

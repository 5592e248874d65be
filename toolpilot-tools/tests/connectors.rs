use serde_json::json;
use std::sync::Arc;
use toolpilot_core::config::GoogleConfig;
use toolpilot_tools::google::google_tools;
use toolpilot_tools::notion::{notion_client, notion_tools};
use toolpilot_tools::{StaticToken, ToolRegistry};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn google_registry(server: &MockServer, token: &str) -> ToolRegistry {
    let base = server.uri();
    let config = GoogleConfig {
        access_token: token.to_string(),
        gmail_base: format!("{}/gmail/v1", base),
        calendar_base: format!("{}/calendar/v3", base),
        sheets_base: format!("{}/v4", base),
        docs_base: format!("{}/v1", base),
        drive_base: format!("{}/drive/v3", base),
    };
    ToolRegistry::builder()
        .extend(google_tools(
            &config,
            Arc::new(StaticToken::new(token, "Google")),
        ))
        .build()
}

#[tokio::test]
async fn calendar_list_formats_events() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/calendar/v3/calendars/primary/events"))
        .and(header("Authorization", "Bearer tok"))
        .and(query_param("singleEvents", "true"))
        .and(query_param("timeMin", "2024-05-01T00:00:00Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {
                    "id": "ev1",
                    "summary": "Design review",
                    "start": {"dateTime": "2024-05-01T10:00:00Z"},
                    "end": {"dateTime": "2024-05-01T11:00:00Z"}
                },
                {
                    "id": "ev2",
                    "summary": "Offsite",
                    "start": {"date": "2024-05-03"},
                    "end": {"date": "2024-05-04"}
                }
            ]
        })))
        .mount(&server)
        .await;

    let registry = google_registry(&server, "tok");
    let result = registry
        .execute(
            "calendar_list",
            json!({"time_min": "2024-05-01T00:00:00Z", "time_max": "2024-05-08T00:00:00Z"}),
        )
        .await;

    assert!(result.success, "{:?}", result.error);
    assert!(result.output.starts_with("Found 2 event(s):"));
    assert!(result.output.contains("Design review (2024-05-01T10:00:00Z"));
    assert!(result.output.contains("Offsite (2024-05-03 to 2024-05-04)"));
}

#[tokio::test]
async fn calendar_create_returns_html_link() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/calendar/v3/calendars/primary/events"))
        .and(body_partial_json(json!({
            "summary": "Lunch",
            "start": {"dateTime": "2024-05-02T12:00:00Z"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "new1",
            "summary": "Lunch",
            "htmlLink": "https://calendar.google.com/event?eid=new1",
            "start": {"dateTime": "2024-05-02T12:00:00Z"},
            "end": {"dateTime": "2024-05-02T13:00:00Z"}
        })))
        .mount(&server)
        .await;

    let registry = google_registry(&server, "tok");
    let result = registry
        .execute(
            "calendar_create",
            json!({
                "summary": "Lunch",
                "start": "2024-05-02T12:00:00Z",
                "end": "2024-05-02T13:00:00Z"
            }),
        )
        .await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(
        result.url.as_deref(),
        Some("https://calendar.google.com/event?eid=new1")
    );
}

#[tokio::test]
async fn missing_token_fails_without_request() {
    let server = MockServer::start().await;
    let registry = google_registry(&server, "");

    let result = registry
        .execute("gmail_list", json!({"query": "is:unread"}))
        .await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("not connected"));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn gmail_send_posts_raw_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/gmail/v1/users/me/messages/send"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "m42"})))
        .expect(1)
        .mount(&server)
        .await;

    let registry = google_registry(&server, "tok");
    let result = registry
        .execute(
            "gmail_send",
            json!({"to": "bob@example.com", "subject": "Hi", "body": "See you"}),
        )
        .await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.output, "Email sent to bob@example.com (id: m42)");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body["raw"].as_str().is_some_and(|raw| !raw.is_empty()));
}

#[tokio::test]
async fn sheets_read_renders_rows_and_url() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/sheet1/values/Budget!A1:B2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "range": "Budget!A1:B2",
            "values": [["Item", "Cost"], ["Coffee", "3"]]
        })))
        .mount(&server)
        .await;

    let registry = google_registry(&server, "tok");
    let result = registry
        .execute(
            "sheets_read",
            json!({"spreadsheet_id": "sheet1", "range": "Budget!A1:B2"}),
        )
        .await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(
        result.output,
        "Budget!A1:B2 (2 row(s)):\nItem\tCost\nCoffee\t3"
    );
    assert_eq!(
        result.url.as_deref(),
        Some("https://docs.google.com/spreadsheets/d/sheet1/edit")
    );
}

#[tokio::test]
async fn api_error_becomes_failed_result() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/documents/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Requested entity was not found."))
        .mount(&server)
        .await;

    let registry = google_registry(&server, "tok");
    let result = registry
        .execute("docs_read", json!({"document_id": "missing"}))
        .await;

    assert!(!result.success);
    let error = result.error.unwrap();
    assert!(error.contains("404"));
    assert!(error.contains("not found"));
}

#[tokio::test]
async fn docs_export_returns_text() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files/doc9/export"))
        .and(query_param("mimeType", "text/plain"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Exported body"))
        .mount(&server)
        .await;

    let registry = google_registry(&server, "tok");
    assert!(registry.get("docs_export").unwrap().suppress_output());

    let result = registry
        .execute("docs_export", json!({"document_id": "doc9"}))
        .await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.output, "Exported body");
}

#[tokio::test]
async fn kb_search_sends_notion_version() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/search"))
        .and(header("Notion-Version", "2022-06-28"))
        .and(header("Authorization", "Bearer secret"))
        .and(body_partial_json(json!({"query": "roadmap"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{
                "id": "p1",
                "url": "https://notion.so/p1",
                "properties": {"title": {"type": "title", "title": [{"plain_text": "Roadmap"}]}}
            }]
        })))
        .mount(&server)
        .await;

    let registry = ToolRegistry::builder()
        .extend(notion_tools(notion_client(
            &format!("{}/v1", server.uri()),
            "secret",
        )))
        .build();
    let result = registry.execute("kb_search", json!({"query": "roadmap"})).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(
        result.output,
        "Found 1 page(s):\n- Roadmap [id: p1] https://notion.so/p1"
    );
}

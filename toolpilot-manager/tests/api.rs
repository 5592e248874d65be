use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use toolpilot_agent::testing::{ScriptedProvider, Turn};
use toolpilot_agent::{ChatService, SkillCatalog};
use toolpilot_channels::TelegramPoller;
use toolpilot_core::config::{AgentConfig, GoogleConfig, TelegramConfig};
use toolpilot_manager::{build_router, AppState};
use toolpilot_providers::Role;
use toolpilot_tools::google::google_tools;
use toolpilot_tools::{ExecTool, StaticToken, ToolRegistry};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn app(provider: Arc<ScriptedProvider>, tools: ToolRegistry) -> Router {
    let service = Arc::new(ChatService::new(
        provider,
        Arc::new(tools),
        Arc::new(SkillCatalog::bundled()),
        &AgentConfig::default(),
    ));
    let telegram = Arc::new(TelegramPoller::new(
        TelegramConfig::default(),
        service.clone(),
    ));
    build_router(AppState::new(service, telegram))
}

fn default_app() -> Router {
    app(
        Arc::new(ScriptedProvider::new()),
        ToolRegistry::builder().tool(ExecTool::new()).build(),
    )
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn chat_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Payloads of the `data:` lines of an SSE body
fn sse_data(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.trim_start().to_string())
        .collect()
}

#[tokio::test]
async fn health_reports_ok() {
    let response = default_app()
        .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"status": "ok"}));
}

#[tokio::test]
async fn lists_tools_and_skills() {
    let response = default_app()
        .oneshot(Request::get("/api/tools").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let tools = body_json(response).await;
    assert_eq!(tools[0]["function"]["name"], "exec");

    let response = default_app()
        .oneshot(Request::get("/api/skills").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let skills = body_json(response).await;
    let ids: Vec<&str> = skills
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|s| s["id"].as_str())
        .collect();
    assert!(ids.contains(&"calendar"));
    assert!(skills[0]["description"].is_string());
    assert!(skills[0].get("body").is_none());
}

#[tokio::test]
async fn chat_rejects_history_without_user_turn() {
    let response = default_app()
        .oneshot(chat_request(json!({"messages": []})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"]
        .as_str()
        .unwrap()
        .contains("user message"));
}

#[tokio::test]
async fn telegram_status_and_start_without_token() {
    let response = default_app()
        .oneshot(
            Request::get("/api/telegram/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_json(response).await, json!({"state": "stopped"}));

    let response = default_app()
        .oneshot(
            Request::post("/api/telegram/start")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"]
        .as_str()
        .unwrap()
        .contains("not configured"));
}

#[tokio::test]
async fn chat_streams_calendar_lookup_and_done() {
    let google = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/calendar/v3/calendars/primary/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{
                "id": "ev1",
                "summary": "Dentist",
                "start": {"dateTime": "2024-05-02T09:00:00Z"},
                "end": {"dateTime": "2024-05-02T10:00:00Z"}
            }]
        })))
        .expect(1)
        .mount(&google)
        .await;

    let config = GoogleConfig {
        access_token: "tok".to_string(),
        calendar_base: format!("{}/calendar/v3", google.uri()),
        ..GoogleConfig::default()
    };
    let tools = ToolRegistry::builder()
        .extend(google_tools(
            &config,
            Arc::new(StaticToken::new("tok", "Google")),
        ))
        .build();

    let provider = Arc::new(
        ScriptedProvider::new()
            .with_reply(r#"["calendar"]"#)
            .with_turn(Turn::tool_calls(&[(
                "call_1",
                "calendar_list",
                r#"{"time_min":"2024-05-02T00:00:00Z","time_max":"2024-05-03T00:00:00Z"}"#,
            )]))
            .with_turn(Turn::text(&["Tomorrow you have the dentist at 9:00."])),
    );

    let response = app(provider.clone(), tools)
        .oneshot(chat_request(json!({
            "messages": [{"role": "user", "content": "What's on my calendar tomorrow?"}]
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let data = sse_data(&String::from_utf8(bytes.to_vec()).unwrap());
    assert_eq!(data.last().map(String::as_str), Some("[DONE]"));

    let events: Vec<Value> = data[..data.len() - 1]
        .iter()
        .map(|d| serde_json::from_str(d).unwrap())
        .collect();
    let kinds: Vec<&str> = events.iter().filter_map(|e| e["type"].as_str()).collect();
    assert_eq!(
        kinds,
        vec!["iteration", "tool_call", "tool_result", "iteration", "content"]
    );

    assert_eq!(events[1]["toolCallId"], "call_1");
    assert_eq!(events[1]["label"], "Calendar");
    assert_eq!(events[2]["success"], true);
    assert!(events[2]["output"].as_str().unwrap().contains("Dentist"));
    assert_eq!(
        events[4],
        json!({"type": "content", "content": "Tomorrow you have the dentist at 9:00."})
    );

    // The routed calendar skill was injected ahead of the conversation
    let first = &provider.stream_requests()[0];
    assert!(first
        .iter()
        .any(|m| m.role == Role::System && m.text().contains("## calendar")));
    assert_eq!(first.last().unwrap().text(), "What's on my calendar tomorrow?");
}

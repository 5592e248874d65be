use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::{self, Stream, StreamExt};
use serde_json::{json, Value};
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use toolpilot_agent::Skill;
use toolpilot_channels::PollerStatus;
use toolpilot_core::events::DONE_SENTINEL;
use tracing::{debug, info};

use crate::state::{ApiError, AppState, ChatRequest, TelegramStartRequest};

/// Stream the agent's events as SSE `data:` lines, then `[DONE]`
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let history = payload.history()?;
    let model = payload.model.clone();
    info!("Chat request with {} message(s)", history.len());

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let service = state.service.clone();
    tokio::spawn(async move {
        // Runs to completion even if the client disconnects
        let outcome = service.handle(&history, model, &event_tx).await;
        debug!("Chat request finished: {:?}", outcome.status);
    });

    let events = UnboundedReceiverStream::new(event_rx)
        .map(|event| Ok::<_, Infallible>(Event::default().data(event.to_json())))
        .chain(stream::once(async {
            Ok(Event::default().data(DONE_SENTINEL))
        }));

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

pub async fn tools_handler(State(state): State<AppState>) -> Json<Vec<Value>> {
    Json(state.service.tools().list_schemas())
}

pub async fn skills_handler(State(state): State<AppState>) -> Json<Vec<Skill>> {
    Json(state.service.catalog().iter().cloned().collect())
}

pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn telegram_start_handler(
    State(state): State<AppState>,
    payload: Option<Json<TelegramStartRequest>>,
) -> Result<Json<PollerStatus>, ApiError> {
    let token = payload.and_then(|Json(req)| req.token);
    let status = state.telegram.start(token).await?;
    Ok(Json(status))
}

pub async fn telegram_stop_handler(State(state): State<AppState>) -> Json<PollerStatus> {
    Json(state.telegram.stop().await)
}

pub async fn telegram_status_handler(State(state): State<AppState>) -> Json<PollerStatus> {
    Json(state.telegram.status())
}

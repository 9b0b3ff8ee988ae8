//! HTTP trigger endpoints and WebSocket observer channels.
//!
//! Runs are fire-and-forget: the trigger endpoints validate, spawn the
//! run, and return immediately. Observers follow along over WebSocket -
//! the first frame is always the history replay, then live events until
//! either side disconnects.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use pipeline::{BotStatus, BotStore, BusMessage};

use crate::state::AppState;

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/bots/:id/run", post(run_bot))
        .route("/bots/run-all", post(run_all))
        .route("/ws", get(ws_global))
        .route("/ws/bots/:id", get(ws_bot))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Trigger one bot run. Responds 202 once the run is spawned; progress
/// is observable on `/ws/bots/:id`.
async fn run_bot(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let bot = match state.store.get(id).await {
        Ok(Some(bot)) => bot,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": format!("bot not found: {id}") })),
            )
                .into_response();
        }
        Err(e) => {
            error!(error = %e, "bot lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    if bot.status == BotStatus::Running {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "error": format!("bot {id} is already running") })),
        )
            .into_response();
    }

    let runner = state.runner.clone();
    tokio::spawn(async move {
        if let Err(e) = runner.run_bot(id).await {
            // Already recorded on the bot and the bus; this is the
            // operator-log copy.
            error!(bot_id = %id, error = %e, "spawned run failed");
        }
    });

    info!(bot_id = %id, bot = %bot.name, "run triggered");
    (
        StatusCode::ACCEPTED,
        Json(json!({ "id": id, "name": bot.name, "status": "started" })),
    )
        .into_response()
}

/// Trigger a batch run over every active bot.
async fn run_all(State(state): State<AppState>) -> Response {
    let active = match state.store.list_active().await {
        Ok(bots) => bots,
        Err(e) => {
            error!(error = %e, "active bot listing failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    let count = active.len();
    let runner = state.runner.clone();
    tokio::spawn(async move {
        match runner.run_all_active().await {
            Ok(outcomes) => {
                let failed = outcomes.iter().filter(|(_, r)| r.is_err()).count();
                info!(total = outcomes.len(), failed, "batch run finished");
            }
            Err(e) => error!(error = %e, "batch run failed to start"),
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(json!({ "active_bots": count, "status": "started" })),
    )
        .into_response()
}

/// Observe all jobs.
async fn ws_global(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| stream_events(socket, state, None))
}

/// Observe one job.
async fn ws_bot(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| stream_events(socket, state, Some(id)))
}

/// Replay history, then forward live events until disconnect.
async fn stream_events(mut socket: WebSocket, state: AppState, bot_id: Option<Uuid>) {
    let (history, mut rx) = match bot_id {
        Some(id) => state.bus().subscribe_bot(id).await,
        None => state.bus().subscribe_global().await,
    };

    if send_message(&mut socket, &history).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(message) => {
                    if send_message(&mut socket, &message).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "observer fell behind, events dropped");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                // Observers only listen; anything but a close is ignored.
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

async fn send_message(socket: &mut WebSocket, message: &BusMessage) -> Result<(), ()> {
    let text = serde_json::to_string(message).map_err(|e| {
        error!(error = %e, "event serialization failed");
    })?;
    socket.send(Message::Text(text)).await.map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use pipeline::testing::{listing_page_html, FixturePageSource};
    use pipeline::{Bot, MemoryStore, PipelineConfig, Runner};
    use tower::ServiceExt;

    fn test_state(store: Arc<MemoryStore>) -> AppState {
        let runner = Runner::with_parts(
            store.clone(),
            store.clone(),
            Arc::new(FixturePageSource::new(listing_page_html())),
            Arc::new(pipeline::extract::MockModel::new()),
            PipelineConfig::default().with_mock_mode(true),
        );
        AppState::new(runner, store)
    }

    #[tokio::test]
    async fn test_run_unknown_bot_is_404() {
        let app = build_router(test_state(Arc::new(MemoryStore::new())));
        let response = app
            .oneshot(
                Request::post(format!("/bots/{}/run", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_run_known_bot_is_accepted() {
        let store = Arc::new(MemoryStore::new());
        let bot = Bot::new("portal", "https://example.com/listings");
        let bot_id = bot.id;
        store.add_bot(bot);

        let app = build_router(test_state(store));
        let response = app
            .oneshot(
                Request::post(format!("/bots/{bot_id}/run"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_running_bot_is_conflict() {
        let store = Arc::new(MemoryStore::new());
        let mut bot = Bot::new("busy", "https://example.com/listings");
        bot.mark_running();
        let bot_id = bot.id;
        store.add_bot(bot);

        let app = build_router(test_state(store));
        let response = app
            .oneshot(
                Request::post(format!("/bots/{bot_id}/run"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_run_all_reports_active_count() {
        let store = Arc::new(MemoryStore::new());
        store.add_bot(Bot::new("a", "https://example.com/a"));
        store.add_bot(Bot::new("b", "https://example.com/b").inactive());

        let app = build_router(test_state(store));
        let response = app
            .oneshot(Request::post("/bots/run-all").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["active_bots"], 1);
    }
}

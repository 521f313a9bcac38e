// SPDX-License-Identifier: MIT

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::time::Duration;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::flow::events::StreamEvent;
use crate::studio::config::ServerConfig;
use crate::studio::workflow::{Engine, RunRequest, StreamingRun};

const DEFAULT_LIST_LIMIT: usize = 20;
const MAX_LIST_LIMIT: usize = 200;

pub fn router(engine: Engine) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/runs", post(create_run).get(list_runs))
        .route("/api/runs/stream", post(stream_run))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
        .with_state(engine)
}

pub async fn serve(
    config: &ServerConfig,
    engine: Engine,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(engine)).await?;
    Ok(())
}

async fn health_check(State(engine): State<Engine>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "graph": engine.graph().name(),
        "nodes": engine.graph().node_names(),
    }))
}

async fn create_run(State(engine): State<Engine>, Json(payload): Json<RunRequest>) -> Json<Value> {
    log::info!("Starting run for user {}", payload.user_id);
    let state = engine.run(payload).await;
    Json(json!(state.summary()))
}

#[derive(Debug, Deserialize)]
struct ListParams {
    limit: Option<usize>,
}

async fn list_runs(
    State(engine): State<Engine>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .min(MAX_LIST_LIMIT);
    match engine.collaborators().store.recent(limit).await {
        Ok(runs) => Ok(Json(json!(runs))),
        Err(e) => {
            log::error!("Failed to list runs: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            ))
        }
    }
}

async fn stream_run(
    State(engine): State<Engine>,
    Json(payload): Json<RunRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let StreamingRun { events, outcome } = engine.stream(payload);

    tokio::spawn(async move {
        match outcome.await {
            Ok(state) => log::info!(
                "Streamed run {} ended with {:?}",
                state.run_id(),
                state.status()
            ),
            Err(e) => log::error!("Streamed run task failed: {}", e),
        }
    });

    Sse::new(events.map(|event| Ok(sse_frame(&event))))
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

/// `event: <type>` plus the JSON record as data
fn sse_frame(event: &StreamEvent) -> Event {
    let frame = Event::default().event(event.kind.as_str());
    match frame.clone().json_data(event) {
        Ok(frame) => frame,
        Err(e) => {
            log::error!("Failed to encode '{}' event: {}", event.kind, e);
            frame.data(json!({ "type": event.kind, "payload": null }).to_string())
        }
    }
}


use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{
        IntoResponse, Json, Redirect,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::{Stream, StreamExt};
use serde_json::json;
use tokio_stream::wrappers::WatchStream;
use tower_http::cors::CorsLayer;

use crate::coordinator::CycleOutcome;
use crate::panel::Panel;
use crate::state::LifecycleAction;

#[derive(Clone)]
struct AppState {
    panel: Arc<Panel>,
}

pub fn router(panel: Arc<Panel>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/refresh", post(refresh))
        .route("/actions/{action}", post(run_action))
        .route("/events", get(events))
        .route("/web-ui", get(web_ui))
        .layer(CorsLayer::permissive())
        .with_state(AppState { panel })
}

pub async fn run(panel: Arc<Panel>, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(
        service = panel.service(),
        "svcpanel listening on http://{}",
        listener.local_addr().unwrap_or(addr)
    );

    axum::serve(listener, router(panel))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.panel.snapshot())
}

async fn refresh(State(state): State<AppState>) -> impl IntoResponse {
    state.panel.refresh().await;
    Json(state.panel.snapshot())
}

async fn run_action(
    State(state): State<AppState>,
    Path(action): Path<String>,
) -> impl IntoResponse {
    let action: LifecycleAction = match action.parse() {
        Ok(action) => action,
        Err(err) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response();
        }
    };

    let outcome = state.panel.trigger(action).await;
    let code = match outcome {
        CycleOutcome::Rejected { .. } => StatusCode::CONFLICT,
        _ => StatusCode::OK,
    };
    (
        code,
        Json(json!({
            "result": outcome,
            "converged": outcome.converged(),
            "panel": state.panel.snapshot(),
        })),
    )
        .into_response()
}

async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let stream = WatchStream::new(state.panel.subscribe()).filter_map(|snapshot| async move {
        match serde_json::to_string(&snapshot) {
            Ok(payload) => Some(Ok(Event::default().event("panel").data(payload))),
            Err(err) => {
                tracing::error!(?err, "failed to serialize panel snapshot");
                None
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text(":svcpanel keep-alive"),
    )
}

async fn web_ui(State(state): State<AppState>) -> impl IntoResponse {
    match state.panel.web_ui_url() {
        Some(url) => Redirect::temporary(url.as_str()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "web ui location unknown" })),
        )
            .into_response(),
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("shutdown signal received");
    }
}

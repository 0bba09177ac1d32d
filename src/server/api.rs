use anyhow::{Context as _, Result};
use axum::{
    body::Bytes,
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::{Path, State},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use super::error::{ApiError, ApiResult};
use crate::config::Config;
use crate::ingest::{Ack, Tracker};
use crate::location::UpdateEvent;
use crate::sync::{StreamMessage, SubscriberHandle};

#[derive(Clone)]
pub struct AppState {
    pub tracker: Tracker,
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    devices: usize,
    subscribers: usize,
    published: u64,
    dropped: u64,
}

pub fn router(tracker: Tracker) -> Router {
    let state = AppState { tracker };

    Router::new()
        .route("/", get(|| async { "LiveTrack Server" }))
        .route("/health", get(health))
        .route("/update_location", post(update_location))
        .route("/locations", get(list_locations))
        .route("/locations/{device_id}", get(get_location))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(config: &Config) -> Result<()> {
    let tracker = Tracker::new(config.hub.clone());

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!(
        addr = %addr,
        subscriber_capacity = config.hub.subscriber_capacity,
        max_subscribers = config.hub.max_subscribers,
        "Server listening"
    );

    axum::serve(listener, router(tracker))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Serve on an already bound listener until the task is dropped
pub async fn serve_listener(listener: tokio::net::TcpListener, tracker: Tracker) -> Result<()> {
    axum::serve(listener, router(tracker)).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    let stats = state.tracker.hub().stats();
    Json(Health {
        status: "ok",
        devices: state.tracker.registry().len(),
        subscribers: stats.subscribers,
        published: stats.published,
        dropped: stats.dropped,
    })
}

async fn update_location(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<Ack>> {
    match state.tracker.ingest(&body) {
        Ok(_) => Ok(Json(Ack::success())),
        Err(err) => {
            tracing::warn!(error = %err, "Rejected location update");
            Err(err.into())
        }
    }
}

async fn list_locations(State(state): State<AppState>) -> Json<Vec<UpdateEvent>> {
    Json(state.tracker.registry().snapshot().into_events())
}

async fn get_location(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> ApiResult<Json<UpdateEvent>> {
    state
        .tracker
        .registry()
        .get(&device_id)
        .map(|location| Json(UpdateEvent::new(device_id.clone(), location)))
        .ok_or_else(|| ApiError::not_found(format!("unknown device: {device_id}")))
}

async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> ApiResult<Response> {
    // Attach before upgrading so a refused subscription is a plain HTTP error
    let handle = state.tracker.hub().attach().map_err(|err| {
        tracing::warn!(error = %err, "Refused viewer connection");
        ApiError::from(err)
    })?;

    Ok(ws.on_upgrade(move |socket| handle_ws(socket, handle)))
}

async fn handle_ws(socket: WebSocket, mut handle: SubscriberHandle) {
    let subscriber = handle.id();
    let (mut sender, mut receiver) = socket.split();

    tracing::info!(
        subscriber = %subscriber,
        replayed = handle.replayed(),
        "Viewer connected"
    );

    // Forward replay and live events to this client; dropping the handle detaches it
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = handle.recv().await {
            let text = match StreamMessage::new_location(&event).to_json() {
                Ok(text) => text,
                Err(err) => {
                    tracing::warn!(error = %err, "Failed to encode stream message");
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Viewers only listen; drain until they close
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    tracing::info!(subscriber = %subscriber, "Viewer disconnected");
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::location::Location;

    async fn call(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    fn post_update(body: &'static str) -> Request<Body> {
        Request::post("/update_location")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_ingest_ack() {
        let tracker = Tracker::default();
        let (status, body) = call(
            router(tracker.clone()),
            post_update(r#"{"device_id":"tracker01","lat":24.58,"lng":73.71}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "status": "success" }));
        assert_eq!(
            tracker.registry().get("tracker01"),
            Some(Location::new(24.58, 73.71))
        );
    }

    #[tokio::test]
    async fn test_ingest_malformed() {
        let tracker = Tracker::default();
        let (status, body) = call(
            router(tracker.clone()),
            post_update(r#"{"device_id":"tracker01","lat":24.58}"#),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"]["kind"], "malformed_request");
        assert!(tracker.registry().is_empty());
    }

    #[tokio::test]
    async fn test_ingest_out_of_range() {
        let tracker = Tracker::default();
        let (status, body) = call(
            router(tracker.clone()),
            post_update(r#"{"device_id":"tracker01","lat":95.0,"lng":73.71}"#),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["kind"], "validation_error");
        assert!(tracker.registry().is_empty());
    }

    #[tokio::test]
    async fn test_locations_endpoints() {
        let tracker = Tracker::default();
        tracker.hub().commit("truck42", Location::new(24.575, 73.69)).unwrap();
        tracker.hub().commit("tracker01", Location::new(24.58, 73.71)).unwrap();

        let (status, body) = call(
            router(tracker.clone()),
            Request::get("/locations").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            serde_json::json!([
                { "device_id": "tracker01", "location": { "lat": 24.58, "lng": 73.71 } },
                { "device_id": "truck42", "location": { "lat": 24.575, "lng": 73.69 } },
            ])
        );

        let (status, body) = call(
            router(tracker.clone()),
            Request::get("/locations/truck42").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["location"]["lat"], 24.575);

        let (status, body) = call(
            router(tracker),
            Request::get("/locations/ghost").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["kind"], "not_found");
    }

    #[tokio::test]
    async fn test_health() {
        let tracker = Tracker::default();
        tracker.hub().commit("d1", Location::new(1.0, 2.0)).unwrap();
        let _viewer = tracker.hub().attach().unwrap();

        let (status, body) = call(
            router(tracker),
            Request::get("/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["devices"], 1);
        assert_eq!(body["subscribers"], 1);
        assert_eq!(body["published"], 1);
    }
}

//! Axum service using ETag lookups for conditional GET and guarded PUT.
//!
//! ```text
//! cargo run --example axum
//! curl -i localhost:3000/widgets/7
//! curl -i -H 'If-None-Match: "widget-7-r1"' localhost:3000/widgets/7      # 304
//! curl -i -X PUT -H 'If-None-Match: "widget-7-r1"' \
//!      -H 'content-type: application/json' -d '{"name":"renamed"}' \
//!      localhost:3000/widgets/7                                           # 200
//! curl -i -X PUT -H 'If-None-Match: "stale"' \
//!      -H 'content-type: application/json' -d '{"name":"x"}' \
//!      localhost:3000/widgets/7                                           # 412
//! ```

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use etag_kit::{
    backend::InMemoryBackend, CacheLookup, ETagConfig, ETagLookup, EntityRef, KeyIdentity,
    VersionedEntity,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Widget entity
#[derive(Clone, Serialize, Deserialize, Debug)]
struct Widget {
    id: u64,
    name: String,
    revision: u32,
    etag: String,
}

impl Widget {
    fn new(id: u64, name: &str, revision: u32) -> Self {
        Widget {
            id,
            name: name.to_string(),
            revision,
            etag: format!("\"widget-{}-r{}\"", id, revision),
        }
    }
}

impl VersionedEntity for Widget {}

#[derive(Deserialize)]
struct UpdateWidget {
    name: String,
}

/// Application state
#[derive(Clone)]
struct AppState {
    lookup: ETagLookup<InMemoryBackend>,
    widgets: Arc<RwLock<HashMap<u64, Widget>>>,
}

fn error_response(err: etag_kit::Error) -> Response {
    (err.status_code(), Json(json!({ "error": err.to_string() }))).into_response()
}

fn with_headers(widget: Widget, headers: etag_kit::ResponseHeaders) -> Response {
    let mut response = (StatusCode::OK, Json(widget)).into_response();
    match headers.apply_to(response.headers_mut()) {
        Ok(()) => response,
        Err(e) => error_response(e),
    }
}

/// Get widget by ID, answering 304 when the client's copy is current
async fn get_widget(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let key = state
        .lookup
        .get_cache_key(EntityRef::<Widget>::of_type(), id);
    if state.lookup.resource_unchanged(&headers, &key).await {
        return StatusCode::NOT_MODIFIED.into_response();
    }

    let widget = match state.widgets.read().await.get(&id).cloned() {
        Some(widget) => widget,
        None => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({"error": "Widget not found"})),
            )
                .into_response()
        }
    };

    match state.lookup.get_header(&widget).await {
        Ok(etag_headers) => with_headers(widget, etag_headers),
        Err(e) => error_response(e),
    }
}

/// Update a widget; the client must present its current ETag
async fn update_widget(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(update): Json<UpdateWidget>,
) -> Response {
    let mut widgets = state.widgets.write().await;
    let current = match widgets.get(&id) {
        Some(widget) => widget.clone(),
        None => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({"error": "Widget not found"})),
            )
                .into_response()
        }
    };

    if let Err(e) = state.lookup.precondition_check(&current, &headers) {
        return error_response(e);
    }

    let updated = Widget::new(id, &update.name, current.revision + 1);
    widgets.insert(id, updated.clone());
    drop(widgets);

    match state.lookup.get_header(&updated).await {
        Ok(etag_headers) => with_headers(updated, etag_headers),
        Err(e) => error_response(e),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = ETagConfig {
        key_identity: KeyIdentity::Field("id".to_string()),
        ..ETagConfig::from_env()?
    };
    let lookup = ETagLookup::new(InMemoryBackend::new()).with_config(config)?;

    let widgets = (1..=10)
        .map(|id| (id, Widget::new(id, &format!("Widget {}", id), 1)))
        .collect();

    let state = AppState {
        lookup,
        widgets: Arc::new(RwLock::new(widgets)),
    };

    let app = Router::new()
        .route("/widgets/{id}", get(get_widget).put(update_widget))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
    println!("Listening on http://127.0.0.1:3000");
    axum::serve(listener, app).await?;
    Ok(())
}

use std::path::PathBuf;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use artiview_core::artifacts::list_artifacts as collect_artifacts;
use artiview_core::recents::now_ms;

use super::ServerState;
use crate::apps::AppsManager;

#[derive(Serialize)]
struct ActionResult {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn apps_disabled() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "error": "Apps Manager not enabled" })),
    )
        .into_response()
}

fn manager(state: &ServerState) -> Result<&Arc<AppsManager>, Response> {
    state.apps.as_ref().ok_or_else(apps_disabled)
}

pub(super) async fn list_artifacts(State(state): State<Arc<ServerState>>) -> Response {
    let folders = state.folders.clone();
    let root = state.workspace_root.clone();
    let port = state.port;
    match tokio::task::spawn_blocking(move || collect_artifacts(&folders, &root, port)).await {
        Ok(files) => Json(files).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("Failed to list artifacts: {e}") })),
        )
            .into_response(),
    }
}

pub(super) async fn identity(State(state): State<Arc<ServerState>>) -> Response {
    Json(json!({ "workspace": state.workspace_name })).into_response()
}

pub(super) async fn list_recents(State(state): State<Arc<ServerState>>) -> Response {
    let store = state.recents.lock().await.clone();
    let root = state.workspace_root.clone();
    match tokio::task::spawn_blocking(move || store.view(&root, now_ms())).await {
        Ok(items) => Json(items).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("Failed to read recents: {e}") })),
        )
            .into_response(),
    }
}

#[derive(Deserialize)]
pub(super) struct RecentsQuery {
    path: Option<PathBuf>,
}

/// `DELETE /api/recents?path=<fsPath>` drops one entry; without `path` the list is cleared
pub(super) async fn delete_recents(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<RecentsQuery>,
) -> Response {
    let snapshot = {
        let mut recents = state.recents.lock().await;
        match &query.path {
            Some(path) => recents.remove(path),
            None => Some(recents.clear()),
        }
    };
    let Some(snapshot) = snapshot else {
        return (
            StatusCode::NOT_FOUND,
            Json(ActionResult {
                success: false,
                error: Some("not in recents".into()),
            }),
        )
            .into_response();
    };
    match state.persist_recents(snapshot).await {
        Ok(()) => Json(ActionResult { success: true, error: None }).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ActionResult {
                success: false,
                error: Some(e.to_string()),
            }),
        )
            .into_response(),
    }
}

pub(super) async fn list_apps(State(state): State<Arc<ServerState>>) -> Response {
    match manager(&state) {
        Ok(apps) => Json(apps.status().await).into_response(),
        Err(resp) => resp,
    }
}

pub(super) async fn discover_apps(State(state): State<Arc<ServerState>>) -> Response {
    match manager(&state) {
        Ok(apps) => Json(apps.discover().await).into_response(),
        Err(resp) => resp,
    }
}

pub(super) async fn list_ports(State(state): State<Arc<ServerState>>) -> Response {
    match manager(&state) {
        Ok(apps) => Json(apps.ports().await).into_response(),
        Err(resp) => resp,
    }
}

pub(super) async fn start_app(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Response {
    let apps = match manager(&state) {
        Ok(apps) => apps,
        Err(resp) => return resp,
    };
    let result = match apps.start(&id).await {
        Ok(_) => ActionResult { success: true, error: None },
        Err(e) => {
            warn!(app = %id, error = %e, "start failed");
            ActionResult {
                success: false,
                error: Some(e.to_string()),
            }
        }
    };
    Json(result).into_response()
}

pub(super) async fn stop_app(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Response {
    let apps = match manager(&state) {
        Ok(apps) => apps,
        Err(resp) => return resp,
    };
    let result = match apps.stop(&id).await {
        Ok(_) => ActionResult { success: true, error: None },
        Err(e) => {
            warn!(app = %id, error = %e, "stop failed");
            ActionResult {
                success: false,
                error: Some(e.to_string()),
            }
        }
    };
    Json(result).into_response()
}

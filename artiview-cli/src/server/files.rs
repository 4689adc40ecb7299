//! Workspace file serving. Markdown is rendered to a full HTML page.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use percent_encoding::percent_decode_str;
use tracing::{debug, warn};

use artiview_core::markdown::{render_document, title_from_file_name};
use artiview_core::recents::now_ms;

use super::ServerState;

const HTML: &str = "text/html; charset=utf-8";

pub(super) async fn redirect_home(State(state): State<Arc<ServerState>>) -> Response {
    let location = format!("/{}", state.home_page);
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

#[derive(Debug, PartialEq, Eq)]
enum Rejection {
    Forbidden,
    BadRequest,
}

/// Map a request path onto the workspace, refusing traversal after decoding
fn safe_join(root: &Path, request_path: &str) -> Result<PathBuf, Rejection> {
    let mut out = root.to_path_buf();
    for part in request_path.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        let decoded = percent_decode_str(part)
            .decode_utf8()
            .map_err(|_| Rejection::BadRequest)?;
        if decoded == ".." || decoded.contains('/') || decoded.contains('\\') {
            return Err(Rejection::Forbidden);
        }
        if decoded.is_empty() || decoded == "." {
            continue;
        }
        out.push(&*decoded);
    }
    Ok(out)
}

fn is_markdown(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("md" | "markdown")
    )
}

pub(super) async fn serve_file(State(state): State<Arc<ServerState>>, uri: Uri) -> Response {
    let path = match safe_join(&state.workspace_root, uri.path()) {
        Ok(path) => path,
        Err(Rejection::Forbidden) => return StatusCode::FORBIDDEN.into_response(),
        Err(Rejection::BadRequest) => return StatusCode::BAD_REQUEST.into_response(),
    };

    // symlinks may still point outside the workspace
    let (Ok(canonical), Ok(root)) = (
        tokio::fs::canonicalize(&path).await,
        tokio::fs::canonicalize(&state.workspace_root).await,
    ) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if !canonical.starts_with(&root) {
        return StatusCode::FORBIDDEN.into_response();
    }
    match tokio::fs::metadata(&canonical).await {
        Ok(meta) if meta.is_file() => {}
        _ => return StatusCode::NOT_FOUND.into_response(),
    }

    let bytes = match tokio::fs::read(&canonical).await {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(path = %canonical.display(), error = %e, "read failed");
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    let snapshot = state.recents.lock().await.add(&path, now_ms());
    if let Some(snapshot) = snapshot {
        if let Err(e) = state.persist_recents(snapshot).await {
            warn!(error = %e, "failed to record recent file");
        }
    }

    if is_markdown(&path) {
        let markdown = String::from_utf8_lossy(&bytes);
        let page = render_document(&markdown, &title_from_file_name(&path));
        return ([(header::CONTENT_TYPE, HTML)], page).into_response();
    }

    let mime = mime_guess::from_path(&path)
        .first_or_octet_stream()
        .to_string();
    ([(header::CONTENT_TYPE, mime)], bytes).into_response()
}

//! Loopback HTTP server: workspace files, rendered Markdown and the JSON API

mod api;
mod files;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::http::Method;
use axum::routing::{get, post};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use artiview_core::config::{LOOPBACK, ResolvedFolder, ViewerConfig};
use artiview_core::recents::{RecentsError, RecentsStore, Snapshot};

use crate::apps::AppsManager;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("no free port in {first}..={last}")]
    NoFreePort { first: u16, last: u16 },
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything the handlers need, created once at startup
pub struct ServerState {
    pub workspace_root: PathBuf,
    pub workspace_name: String,
    pub home_page: String,
    pub folders: Vec<ResolvedFolder>,
    /// Port actually bound, used in artifact URLs
    pub port: u16,
    pub recents: Mutex<RecentsStore>,
    /// Generation of the last recents snapshot on disk
    recents_written: Mutex<u64>,
    /// `None` when apps are disabled in the config
    pub apps: Option<Arc<AppsManager>>,
}

impl ServerState {
    pub fn new(
        config: &ViewerConfig,
        workspace_root: PathBuf,
        port: u16,
        apps: Option<Arc<AppsManager>>,
    ) -> Self {
        Self {
            workspace_name: config.workspace_name(&workspace_root),
            home_page: config.server.home_page.trim_start_matches('/').to_string(),
            folders: config.resolve_folders(&workspace_root),
            port,
            recents: Mutex::new(RecentsStore::open(&workspace_root, config.recents.limit)),
            recents_written: Mutex::new(0),
            apps,
            workspace_root,
        }
    }

    /// Write a recents snapshot on the blocking pool. Snapshots older than
    /// the last one written are dropped.
    pub async fn persist_recents(&self, snapshot: Snapshot) -> Result<(), RecentsError> {
        let mut written = self.recents_written.lock().await;
        let generation = snapshot.generation();
        if generation <= *written {
            return Ok(());
        }
        tokio::task::spawn_blocking(move || snapshot.write())
            .await
            .map_err(|e| RecentsError::Io(std::io::Error::other(e)))??;
        *written = generation;
        Ok(())
    }
}

pub fn build_router(state: Arc<ServerState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/", get(files::redirect_home))
        .route("/api/artifacts", get(api::list_artifacts))
        .route("/api/identity", get(api::identity))
        .route("/api/recents", get(api::list_recents).delete(api::delete_recents))
        .route("/api/apps", get(api::list_apps))
        .route("/api/apps/discover", get(api::discover_apps))
        .route("/api/apps/{id}/start", post(api::start_app))
        .route("/api/apps/{id}/stop", post(api::stop_app))
        .route("/api/ports", get(api::list_ports))
        .fallback(get(files::serve_file))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the first free loopback port starting at `first`
pub async fn bind(first: u16, attempts: u16) -> Result<TcpListener, ServeError> {
    let attempts = attempts.max(1);
    let last = first.saturating_add(attempts - 1);

    for port in first..=last {
        let addr: SocketAddr = SocketAddr::from(([127, 0, 0, 1], port));
        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok(listener),
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                warn!(port, "port in use, trying next");
            }
            Err(source) => return Err(ServeError::Bind { addr, source }),
        }
    }

    Err(ServeError::NoFreePort { first, last })
}

/// Serve until the process is interrupted
pub async fn serve(listener: TcpListener, state: Arc<ServerState>) -> Result<(), ServeError> {
    let addr = listener.local_addr()?;
    info!("serving {} on http://{LOOPBACK}:{}", state.workspace_root.display(), addr.port());

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

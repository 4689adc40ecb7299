//! Apps lifecycle: status, start, stop and discovery of local web apps
//!
//! Whether an app is running is always read from the live listener table.
//! The only local state is when this process started each app, used for
//! uptime.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use artiview_core::app::{AppConfig, AppId, AppStatus, DiscoveredApp, PortEntry, default_health_url};
use artiview_core::config::{ViewerConfig, resolve_path};
use artiview_core::ports::DiscoveryFilter;

use crate::health::AppProber;
use crate::launcher::{KillOutcome, LaunchError, Launcher};
use crate::scanner::PortScanner;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("app not found: {0}")]
    NotFound(AppId),
    #[error("{name} is already running on port {port}")]
    AlreadyRunning { name: String, port: u16 },
    #[error("{name} has no start command configured")]
    MissingStartCommand { name: String },
    #[error("working directory not found: {}", .0.display())]
    WorkingDirNotFound(PathBuf),
    #[error(transparent)]
    Launch(#[from] LaunchError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartReport {
    pub pid: Option<u32>,
    /// The health URL answered before the timeout
    pub healthy: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReport {
    /// The configured stop command completed
    StopCommand,
    /// Listeners on the app port were killed
    Killed(Vec<u32>),
    /// Nothing was listening on the app port
    NotRunning,
}

pub struct AppsManager {
    scanner: Arc<dyn PortScanner>,
    prober: Arc<dyn AppProber>,
    launcher: Arc<dyn Launcher>,
    workspace_root: PathBuf,
    apps: Vec<AppConfig>,
    discovery: DiscoveryFilter,
    start_times: RwLock<HashMap<AppId, Instant>>,
    health_timeout: Duration,
    health_interval: Duration,
}

impl AppsManager {
    pub fn new(
        config: &ViewerConfig,
        workspace_root: PathBuf,
        scanner: Arc<dyn PortScanner>,
        prober: Arc<dyn AppProber>,
        launcher: Arc<dyn Launcher>,
    ) -> Self {
        Self {
            scanner,
            prober,
            launcher,
            workspace_root,
            apps: config.apps.list.clone(),
            discovery: config.discovery.clone(),
            start_times: RwLock::new(HashMap::new()),
            health_timeout: Duration::from_millis(config.apps.health_timeout_ms),
            health_interval: Duration::from_millis(config.apps.health_interval_ms.max(1)),
        }
    }

    pub fn scanner(&self) -> &Arc<dyn PortScanner> {
        &self.scanner
    }

    fn app(&self, id: &str) -> Result<AppConfig, AppError> {
        self.apps
            .iter()
            .find(|app| app.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(id.to_string()))
    }

    fn working_dir(&self, app: &AppConfig) -> PathBuf {
        resolve_path(&self.workspace_root, Path::new(&app.cwd))
    }

    /// Listening ports sorted by port
    pub async fn ports(&self) -> Vec<PortEntry> {
        let mut ports = self.scanner.list_listening_ports().await;
        ports.sort();
        ports
    }

    /// Every configured app with live running state
    pub async fn status(&self) -> Vec<AppStatus> {
        let ports = self.scanner.list_listening_ports().await;
        let start_times = self.start_times.read().await;

        self.apps
            .iter()
            .map(|app| {
                let listener = ports.iter().find(|entry| entry.port == app.port);
                let running = listener.is_some();
                let uptime = start_times
                    .get(&app.id)
                    .filter(|_| running)
                    .map(|started| started.elapsed().as_millis() as u64);
                AppStatus {
                    config: app.clone(),
                    running,
                    pid: listener.map(|entry| entry.pid),
                    uptime,
                }
            })
            .collect()
    }

    /// Launch an app and wait for its health URL.
    ///
    /// A spawned app counts as started even if the health check times out.
    pub async fn start(&self, id: &str) -> Result<StartReport, AppError> {
        let app = self.app(id)?;

        let ports = self.scanner.list_listening_ports().await;
        if ports.iter().any(|entry| entry.port == app.port) {
            return Err(AppError::AlreadyRunning {
                name: app.name.clone(),
                port: app.port,
            });
        }

        if !app.has_start_cmd() {
            return Err(AppError::MissingStartCommand {
                name: app.name.clone(),
            });
        }

        let cwd = self.working_dir(&app);
        let is_dir = tokio::fs::metadata(&cwd)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(AppError::WorkingDirNotFound(cwd));
        }

        info!(app = %app.id, command = %app.start_cmd, cwd = %cwd.display(), "starting app");
        let pid = self.launcher.spawn_detached(&app.start_cmd, &cwd).await?;
        self.start_times
            .write()
            .await
            .insert(app.id.clone(), Instant::now());

        let healthy = self.wait_for_health(&app.health_url()).await;
        if healthy {
            info!(app = %app.id, "{} started", app.name);
        } else {
            warn!(app = %app.id, "{} started but health check timed out", app.name);
        }

        Ok(StartReport { pid, healthy })
    }

    async fn wait_for_health(&self, url: &str) -> bool {
        let started = Instant::now();
        while started.elapsed() < self.health_timeout {
            if self.prober.check_health(url).await {
                return true;
            }
            tokio::time::sleep(self.health_interval).await;
        }
        false
    }

    /// Stop an app with its stop command, or kill whatever listens on its port
    pub async fn stop(&self, id: &str) -> Result<StopReport, AppError> {
        let app = self.app(id)?;

        let report = match app.stop_cmd() {
            Some(command) => {
                let cwd = self.working_dir(&app);
                info!(app = %app.id, command, "running stop command");
                self.launcher.run(command, &cwd).await?;
                StopReport::StopCommand
            }
            None => self.kill_port(app.port).await?,
        };

        self.start_times.write().await.remove(&app.id);
        info!(app = %app.id, "{} stopped", app.name);
        Ok(report)
    }

    async fn kill_port(&self, port: u16) -> Result<StopReport, AppError> {
        let mut pids: Vec<u32> = self
            .scanner
            .list_listening_ports()
            .await
            .into_iter()
            .filter(|entry| entry.port == port)
            .map(|entry| entry.pid)
            .collect();
        pids.sort_unstable();
        pids.dedup();

        let mut killed = Vec::new();
        for pid in pids {
            match self.launcher.kill(pid).await? {
                KillOutcome::Killed => killed.push(pid),
                KillOutcome::NoSuchProcess => debug!(pid, "process already gone"),
            }
        }

        if killed.is_empty() {
            Ok(StopReport::NotRunning)
        } else {
            Ok(StopReport::Killed(killed))
        }
    }

    /// Probe unconfigured listeners that look like local web apps
    pub async fn discover(&self) -> Vec<DiscoveredApp> {
        let ports = self.scanner.list_listening_ports().await;
        let configured: HashSet<u16> = self.apps.iter().map(|app| app.port).collect();

        let mut seen = HashSet::new();
        let candidates: Vec<PortEntry> = ports
            .into_iter()
            .filter(|entry| self.discovery.admits(entry.port, &configured))
            .filter(|entry| seen.insert(entry.port))
            .collect();

        let mut discovered = Vec::new();
        for entry in candidates {
            let health_url = default_health_url(entry.port);
            if !self.prober.check_health(&health_url).await {
                debug!(port = entry.port, "listener does not answer HTTP");
                continue;
            }

            let is_aimax_viewer = self.prober.is_viewer(entry.port).await;
            let title = self.prober.fetch_page_title(&health_url).await;
            let workspace_name = if is_aimax_viewer {
                self.prober.fetch_workspace_name(entry.port).await
            } else {
                None
            };

            discovered.push(DiscoveredApp {
                port: entry.port,
                pid: entry.pid,
                process: entry.process,
                health_url,
                is_aimax_viewer,
                title,
                workspace_name,
            });
        }

        discovered
    }
}

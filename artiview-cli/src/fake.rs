//! In-memory scanner, prober and launcher for tests

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use artiview_core::app::PortEntry;

use crate::health::AppProber;
use crate::launcher::{KillOutcome, LaunchError, Launcher};
use crate::scanner::PortScanner;

#[derive(Default)]
pub struct FakeScanner {
    ports: Mutex<Vec<PortEntry>>,
}

impl FakeScanner {
    pub fn with_ports(ports: &[(u16, u32, &str)]) -> Self {
        let scanner = Self::default();
        scanner.set(ports);
        scanner
    }

    pub fn set(&self, ports: &[(u16, u32, &str)]) {
        *self.ports.lock().unwrap() = ports
            .iter()
            .map(|(port, pid, process)| PortEntry {
                port: *port,
                pid: *pid,
                process: process.to_string(),
            })
            .collect();
    }
}

#[async_trait]
impl PortScanner for FakeScanner {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn list_listening_ports(&self) -> Vec<PortEntry> {
        self.ports.lock().unwrap().clone()
    }
}

/// Answers probes from fixed tables. Unknown URLs and ports are unreachable.
#[derive(Default)]
pub struct FakeProber {
    pub healthy: HashSet<String>,
    pub viewers: HashSet<u16>,
    pub titles: HashMap<String, String>,
    pub workspaces: HashMap<u16, String>,
    pub health_checks: Mutex<Vec<String>>,
}

impl FakeProber {
    pub fn healthy(urls: &[&str]) -> Self {
        Self {
            healthy: urls.iter().map(|url| url.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn checks(&self) -> Vec<String> {
        self.health_checks.lock().unwrap().clone()
    }
}

#[async_trait]
impl AppProber for FakeProber {
    async fn check_health(&self, url: &str) -> bool {
        self.health_checks.lock().unwrap().push(url.to_string());
        self.healthy.contains(url)
    }

    async fn is_viewer(&self, port: u16) -> bool {
        self.viewers.contains(&port)
    }

    async fn fetch_page_title(&self, url: &str) -> Option<String> {
        self.titles.get(url).cloned()
    }

    async fn fetch_workspace_name(&self, port: u16) -> Option<String> {
        self.workspaces.get(&port).cloned()
    }
}

/// Records launches instead of running anything
#[derive(Default)]
pub struct FakeLauncher {
    pub spawned: Mutex<Vec<(String, PathBuf)>>,
    pub ran: Mutex<Vec<(String, PathBuf)>>,
    pub killed: Mutex<Vec<u32>>,
    /// pids reported as already gone
    pub gone: HashSet<u32>,
    /// make `run` fail with this exit code
    pub run_exit_code: Option<i32>,
}

impl FakeLauncher {
    pub fn spawned(&self) -> Vec<(String, PathBuf)> {
        self.spawned.lock().unwrap().clone()
    }

    pub fn ran(&self) -> Vec<(String, PathBuf)> {
        self.ran.lock().unwrap().clone()
    }

    pub fn killed(&self) -> Vec<u32> {
        self.killed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Launcher for FakeLauncher {
    async fn spawn_detached(&self, command: &str, cwd: &Path) -> Result<Option<u32>, LaunchError> {
        self.spawned
            .lock()
            .unwrap()
            .push((command.to_string(), cwd.to_path_buf()));
        Ok(Some(4242))
    }

    async fn run(&self, command: &str, cwd: &Path) -> Result<(), LaunchError> {
        self.ran
            .lock()
            .unwrap()
            .push((command.to_string(), cwd.to_path_buf()));
        match self.run_exit_code {
            Some(code) => Err(LaunchError::CommandFailed {
                command: command.to_string(),
                code: Some(code),
                stderr: "failed".into(),
            }),
            None => Ok(()),
        }
    }

    async fn kill(&self, pid: u32) -> Result<KillOutcome, LaunchError> {
        if self.gone.contains(&pid) {
            return Ok(KillOutcome::NoSuchProcess);
        }
        self.killed.lock().unwrap().push(pid);
        Ok(KillOutcome::Killed)
    }
}

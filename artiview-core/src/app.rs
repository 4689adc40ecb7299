//! App model
//!
//! Configured local web apps, their live status, and the unconfigured
//! listeners found by discovery. Field names on the wire are camelCase; the
//! config file also accepts snake_case.

use serde::{Deserialize, Serialize};

pub type AppId = String;

/// A configured auxiliary web app
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub id: AppId,
    pub name: String,
    pub port: u16,

    /// Shell command that launches the app
    #[serde(default, alias = "start_cmd")]
    pub start_cmd: String,

    /// Shell command that stops the app. When unset the listener on `port` is killed.
    #[serde(default, alias = "stop_cmd", skip_serializing_if = "Option::is_none")]
    pub stop_cmd: Option<String>,

    /// Working directory, absolute or relative to the workspace root
    #[serde(default)]
    pub cwd: String,

    #[serde(default, alias = "health_url")]
    pub health_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl AppConfig {
    pub fn has_start_cmd(&self) -> bool {
        !self.start_cmd.trim().is_empty()
    }

    pub fn stop_cmd(&self) -> Option<&str> {
        self.stop_cmd.as_deref().filter(|cmd| !cmd.trim().is_empty())
    }

    /// Health URL, defaulting to the app root on loopback
    pub fn health_url(&self) -> String {
        if self.health_url.trim().is_empty() {
            default_health_url(self.port)
        } else {
            self.health_url.clone()
        }
    }
}

pub fn default_health_url(port: u16) -> String {
    format!("http://127.0.0.1:{port}/")
}

/// A configured app with state derived from the live listener table
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStatus {
    #[serde(flatten)]
    pub config: AppConfig,
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// Milliseconds since this process started the app
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime: Option<u64>,
}

/// A listening local service that is not in the configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredApp {
    pub port: u16,
    pub pid: u32,
    pub process: String,
    pub health_url: String,
    /// The listener is another artifact viewer instance
    pub is_aimax_viewer: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_name: Option<String>,
}

impl DiscoveredApp {
    /// Display name: page title, then workspace name, then process name
    pub fn display_name(&self) -> String {
        self.title
            .clone()
            .or_else(|| self.workspace_name.clone())
            .unwrap_or_else(|| format!("{} :{}", self.process, self.port))
    }
}

/// A TCP listener attributed to a process
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortEntry {
    pub port: u16,
    pub pid: u32,
    pub process: String,
}

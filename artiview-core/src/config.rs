use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app::{AppConfig, DiscoveredApp};
use crate::ports::DiscoveryFilter;

pub const DEFAULT_PORT: u16 = 3124;
pub const LOOPBACK: &str = "127.0.0.1";
pub const CONFIG_ENV: &str = "ARTIVIEW_CONFIG";
pub const CONFIG_NAMES: [&str; 4] = [
    "artiview.yaml",
    "artiview.yml",
    ".artiview.yaml",
    ".artiview.yml",
];

/// Directory whose presence marks a workspace root
pub const ARTIFACTS_DIR: &str = "Artifacts";
const WORKSPACE_SEARCH_DEPTH: usize = 10;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("duplicate app id '{0}'")]
    DuplicateAppId(String),
    #[error("app #{index} has an empty id")]
    EmptyAppId { index: usize },
    #[error("port {port} is already configured as app '{id}'")]
    PortConfigured { port: u16, id: String },
    #[error("no config file found, searched: {searched:?}")]
    NotFound { searched: Vec<PathBuf> },
}

/// Loopback file server settings
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 3124 means "derive from the workspace path"
    pub port: u16,
    /// Page `/` redirects to, relative to the workspace root
    pub home_page: String,
    /// Size of the port range derived ports fall into
    pub port_span: u16,
    /// Consecutive ports tried when the chosen one is taken
    pub bind_attempts: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            home_page: format!("{ARTIFACTS_DIR}/index.html"),
            port_span: 100,
            bind_attempts: 10,
        }
    }
}

/// A folder whose Markdown/HTML files are listed as artifacts
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct FolderConfig {
    pub label: String,
    /// Relative to the workspace root, or absolute
    pub path: PathBuf,
}

/// A folder with its path resolved against the workspace root
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedFolder {
    pub label: String,
    pub path: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppsConfig {
    pub enabled: bool,
    pub list: Vec<AppConfig>,
    /// How long `start` waits for the health URL
    pub health_timeout_ms: u64,
    pub health_interval_ms: u64,
}

impl Default for AppsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            list: Vec::new(),
            health_timeout_ms: 10_000,
            health_interval_ms: 500,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RecentsConfig {
    pub limit: usize,
}

impl Default for RecentsConfig {
    fn default() -> Self {
        Self { limit: 24 }
    }
}

/// Root configuration file structure
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Display name reported by `/api/identity`, defaults to the workspace directory name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    pub server: ServerConfig,
    pub folders: Vec<FolderConfig>,
    pub apps: AppsConfig,
    pub discovery: DiscoveryFilter,
    pub recents: RecentsConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            workspace: None,
            server: ServerConfig::default(),
            folders: vec![FolderConfig {
                label: ARTIFACTS_DIR.into(),
                path: PathBuf::from(ARTIFACTS_DIR),
            }],
            apps: AppsConfig::default(),
            discovery: DiscoveryFilter::default(),
            recents: RecentsConfig::default(),
        }
    }
}

impl ViewerConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a string (useful for testing)
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        // an empty file deserializes to unit, not to an empty mapping
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: ViewerConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Search for a config file in `start_dir` and its parents.
    ///
    /// `ARTIVIEW_CONFIG` takes precedence when it points at an existing file.
    pub fn discover(start_dir: &Path) -> Result<(PathBuf, Self), ConfigError> {
        let mut searched = Vec::new();

        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Ok((path.clone(), Self::load(&path)?));
            }
            searched.push(path);
        }

        let mut dir = Some(start_dir);
        while let Some(current) = dir {
            for name in &CONFIG_NAMES {
                let path = current.join(name);
                if path.exists() {
                    return Ok((path.clone(), Self::load(&path)?));
                }
                searched.push(path);
            }
            dir = current.parent();
        }

        Err(ConfigError::NotFound { searched })
    }

    /// Like [`ViewerConfig::discover`], but a missing file yields the defaults
    pub fn discover_or_default(start_dir: &Path) -> Result<(Option<PathBuf>, Self), ConfigError> {
        match Self::discover(start_dir) {
            Ok((path, config)) => Ok((Some(path), config)),
            Err(ConfigError::NotFound { .. }) => Ok((None, Self::default())),
            Err(e) => Err(e),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut ids = HashSet::new();
        for (index, app) in self.apps.list.iter().enumerate() {
            if app.id.trim().is_empty() {
                return Err(ConfigError::EmptyAppId { index });
            }
            if !ids.insert(app.id.as_str()) {
                return Err(ConfigError::DuplicateAppId(app.id.clone()));
            }
        }
        Ok(())
    }

    pub fn app(&self, id: &str) -> Option<&AppConfig> {
        self.apps.list.iter().find(|app| app.id == id)
    }

    /// Add a discovered listener as a configured app with no start command.
    pub fn adopt(&mut self, discovered: &DiscoveredApp, name: &str) -> Result<&AppConfig, ConfigError> {
        if let Some(existing) = self.apps.list.iter().find(|app| app.port == discovered.port) {
            return Err(ConfigError::PortConfigured {
                port: discovered.port,
                id: existing.id.clone(),
            });
        }

        let id = format!("app-{}", discovered.port);
        if self.app(&id).is_some() {
            return Err(ConfigError::DuplicateAppId(id));
        }

        self.apps.list.push(AppConfig {
            id,
            name: name.to_string(),
            port: discovered.port,
            start_cmd: String::new(),
            stop_cmd: None,
            cwd: String::new(),
            health_url: discovered.health_url.clone(),
            category: None,
        });
        Ok(&self.apps.list[self.apps.list.len() - 1])
    }

    pub fn resolve_folders(&self, workspace_root: &Path) -> Vec<ResolvedFolder> {
        self.folders
            .iter()
            .map(|folder| ResolvedFolder {
                label: folder.label.clone(),
                path: resolve_path(workspace_root, &folder.path),
            })
            .collect()
    }

    /// Workspace display name
    pub fn workspace_name(&self, workspace_root: &Path) -> String {
        self.workspace.clone().unwrap_or_else(|| {
            workspace_root
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| workspace_root.display().to_string())
        })
    }

    /// First port the server tries to bind for this workspace
    pub fn server_port(&self, workspace_root: &Path) -> u16 {
        workspace_port(
            self.server.port,
            &workspace_root.to_string_lossy(),
            self.server.port_span,
        )
    }
}

pub fn resolve_path(workspace_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace_root.join(path)
    }
}

/// `s[0]*31^(n-1) + ... + s[n-1]` over UTF-16 code units, where each step
/// truncates the running value to 32 bits before the multiply.
pub fn workspace_hash(workspace: &str) -> i64 {
    workspace.encode_utf16().fold(0i64, |hash, unit| {
        let shifted = (hash as i32).wrapping_shl(5) as i64;
        shifted - hash + i64::from(unit)
    })
}

/// A configured non-default port is used as-is. The default port is spread
/// over `span` ports by the workspace path so several workspaces can run
/// side by side.
pub fn workspace_port(configured: u16, workspace: &str, span: u16) -> u16 {
    if configured != DEFAULT_PORT || workspace.is_empty() || span == 0 {
        return configured;
    }
    let offset = workspace_hash(workspace).unsigned_abs() % u64::from(span);
    DEFAULT_PORT.saturating_add(offset as u16)
}

/// Nearest ancestor (up to ten levels) containing an `Artifacts` directory
pub fn find_workspace_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .take(WORKSPACE_SEARCH_DEPTH + 1)
        .find(|dir| dir.join(ARTIFACTS_DIR).is_dir())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discovered(port: u16) -> DiscoveredApp {
        DiscoveredApp {
            port,
            pid: 10,
            process: "node".into(),
            health_url: format!("http://127.0.0.1:{port}/"),
            is_aimax_viewer: false,
            title: None,
            workspace_name: None,
        }
    }

    #[test]
    fn test_defaults() {
        let config = ViewerConfig::from_str("").unwrap();
        assert_eq!(config.server.port, 3124);
        assert_eq!(config.server.home_page, "Artifacts/index.html");
        assert_eq!(config.folders.len(), 1);
        assert_eq!(config.folders[0].label, "Artifacts");
        assert!(config.apps.enabled);
        assert_eq!(config.apps.health_timeout_ms, 10_000);
        assert_eq!(config.discovery.max_port, 50000);
        assert_eq!(config.recents.limit, 24);
    }

    #[test]
    fn test_parse_config() {
        let yaml = r#"
workspace: notes
server:
  port: 4000
folders:
  - label: Docs
    path: docs
  - label: Shared
    path: /srv/shared
apps:
  list:
    - id: api
      name: API
      port: 8000
      startCmd: cargo run
      cwd: api
      healthUrl: http://127.0.0.1:8000/health
    - id: web
      name: Web
      port: 5173
      start_cmd: npm run dev
      stop_cmd: npm run stop
      cwd: web
      health_url: http://127.0.0.1:5173/
      category: frontend
"#;
        let config = ViewerConfig::from_str(yaml).unwrap();
        assert_eq!(config.workspace.as_deref(), Some("notes"));
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.port_span, 100);
        assert_eq!(config.apps.list.len(), 2);
        assert_eq!(config.app("web").unwrap().stop_cmd(), Some("npm run stop"));
        let ports: Vec<u16> = config.apps.list.iter().map(|app| app.port).collect();
        assert_eq!(ports, vec![8000, 5173]);

        let folders = config.resolve_folders(Path::new("/work"));
        assert_eq!(folders[0].path, PathBuf::from("/work/docs"));
        assert_eq!(folders[1].path, PathBuf::from("/srv/shared"));
    }

    #[test]
    fn test_duplicate_app_id() {
        let yaml = "apps:\n  list:\n    - {id: a, name: A, port: 1}\n    - {id: a, name: B, port: 2}\n";
        let err = ViewerConfig::from_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateAppId(id) if id == "a"));
    }

    #[test]
    fn test_empty_app_id() {
        let yaml = "apps:\n  list:\n    - {id: ' ', name: A, port: 1}\n";
        let err = ViewerConfig::from_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyAppId { index: 0 }));
    }

    #[test]
    fn test_adopt_discovered_app() {
        let mut config = ViewerConfig::default();
        let app = config.adopt(&discovered(9000), "Storybook").unwrap();
        assert_eq!(app.id, "app-9000");
        assert_eq!(app.name, "Storybook");
        assert!(!app.has_start_cmd());
        assert_eq!(app.health_url, "http://127.0.0.1:9000/");

        let err = config.adopt(&discovered(9000), "Again").unwrap_err();
        assert!(matches!(err, ConfigError::PortConfigured { port: 9000, .. }));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artiview.yaml");

        let mut config = ViewerConfig::default();
        config.adopt(&discovered(7000), "Seven").unwrap();
        config.save(&path).unwrap();

        let loaded = ViewerConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_discover_walks_parents() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join(".artiview.yml"), "workspace: found\n").unwrap();

        let (path, config) = ViewerConfig::discover(&nested).unwrap();
        assert_eq!(path, dir.path().join(".artiview.yml"));
        assert_eq!(config.workspace.as_deref(), Some("found"));
    }

    #[test]
    fn test_workspace_hash_matches_string_hash() {
        assert_eq!(workspace_hash(""), 0);
        assert_eq!(workspace_hash("a"), 97);
        assert_eq!(workspace_hash("ab"), 97 * 31 + 98);
        assert_eq!(workspace_hash("abc"), (97 * 31 + 98) * 31 + 99);
    }

    #[test]
    fn test_workspace_port() {
        assert_eq!(workspace_port(4000, "/any/where", 100), 4000);
        assert_eq!(workspace_port(3124, "", 100), 3124);
        // "abc" hashes to 96354
        assert_eq!(workspace_port(3124, "abc", 100), 3124 + 54);

        let port = workspace_port(3124, "/Users/someone/projects/a-rather-long-workspace-path", 100);
        assert!((3124..3224).contains(&port));
    }

    #[test]
    fn test_find_workspace_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Artifacts")).unwrap();
        let nested = dir.path().join("src/deep/er");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_workspace_root(&nested), Some(dir.path().to_path_buf()));
        assert_eq!(find_workspace_root(dir.path()), Some(dir.path().to_path_buf()));
    }

    #[test]
    fn test_workspace_name_defaults_to_dir_name() {
        let config = ViewerConfig::default();
        assert_eq!(config.workspace_name(Path::new("/home/me/notes")), "notes");
    }
}

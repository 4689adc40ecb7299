//! Recently viewed files, persisted per workspace
//!
//! Stored as JSON in `<workspace>/.artiview/recents.json`, newest first.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::artifacts::{ArtifactType, relative_url_path};

pub const STATE_DIR: &str = ".artiview";
const STORE_FILE: &str = "recents.json";

#[derive(Debug, Error)]
pub enum RecentsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentEntry {
    pub fs_path: PathBuf,
    /// Milliseconds since the epoch
    pub timestamp: u64,
}

/// A recent entry prepared for display
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentItem {
    pub fs_path: PathBuf,
    pub name: String,
    pub file_type: ArtifactType,
    /// Containing directory relative to the workspace root
    pub relative_path: String,
    pub time_ago: String,
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// `just now`, `5m ago`, `3h ago`, `2d ago`
pub fn time_ago(elapsed_ms: u64) -> String {
    let mins = elapsed_ms / 60_000;
    if mins < 1 {
        return "just now".into();
    }
    if mins < 60 {
        return format!("{mins}m ago");
    }
    let hours = mins / 60;
    if hours < 24 {
        return format!("{hours}h ago");
    }
    format!("{}d ago", hours / 24)
}

fn tracked_type(path: &Path) -> Option<ArtifactType> {
    match path.extension()?.to_str()? {
        "md" => Some(ArtifactType::Md),
        "html" => Some(ArtifactType::Html),
        _ => None,
    }
}

/// Store contents captured after a change, written to disk by the caller
#[derive(Debug)]
pub struct Snapshot {
    path: PathBuf,
    generation: u64,
    entries: Vec<RecentEntry>,
}

impl Snapshot {
    /// Increases with every change, so an older snapshot never overwrites a newer one
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Blocking write of the store file
    pub fn write(&self) -> Result<(), RecentsError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct RecentsStore {
    path: PathBuf,
    limit: usize,
    generation: u64,
    entries: Vec<RecentEntry>,
}

impl RecentsStore {
    pub fn store_path(workspace_root: &Path) -> PathBuf {
        workspace_root.join(STATE_DIR).join(STORE_FILE)
    }

    /// Open the workspace store. A missing or corrupt file starts empty.
    pub fn open(workspace_root: &Path, limit: usize) -> Self {
        let path = Self::store_path(workspace_root);
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "ignoring unreadable recents store");
                Vec::new()
            }),
            Err(_) => Vec::new(),
        };
        Self {
            path,
            limit,
            generation: 0,
            entries,
        }
    }

    pub fn entries(&self) -> &[RecentEntry] {
        &self.entries
    }

    /// Record a view of a file the caller has found on disk. Only `.md` and
    /// `.html` are tracked; other files leave the store untouched.
    pub fn add(&mut self, fs_path: &Path, now: u64) -> Option<Snapshot> {
        tracked_type(fs_path)?;
        self.entries.retain(|entry| entry.fs_path != fs_path);
        self.entries.insert(
            0,
            RecentEntry {
                fs_path: fs_path.to_path_buf(),
                timestamp: now,
            },
        );
        self.entries.truncate(self.limit);
        Some(self.snapshot())
    }

    /// `None` when the path was not in the list
    pub fn remove(&mut self, fs_path: &Path) -> Option<Snapshot> {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.fs_path != fs_path);
        (self.entries.len() != before).then(|| self.snapshot())
    }

    pub fn clear(&mut self) -> Snapshot {
        self.entries.clear();
        self.snapshot()
    }

    /// Entries whose files still exist, ready for display
    pub fn view(&self, workspace_root: &Path, now: u64) -> Vec<RecentItem> {
        self.entries
            .iter()
            .filter(|entry| entry.fs_path.is_file())
            .filter_map(|entry| {
                let file_type = tracked_type(&entry.fs_path)?;
                let name = entry
                    .fs_path
                    .file_stem()?
                    .to_string_lossy()
                    .replace('_', " ");
                let relative_path = entry
                    .fs_path
                    .parent()
                    .map(|dir| relative_url_path(workspace_root, dir))
                    .unwrap_or_default();
                Some(RecentItem {
                    fs_path: entry.fs_path.clone(),
                    name,
                    file_type,
                    relative_path,
                    time_ago: time_ago(now.saturating_sub(entry.timestamp)),
                })
            })
            .collect()
    }

    fn snapshot(&mut self) -> Snapshot {
        self.generation += 1;
        Snapshot {
            path: self.path.clone(),
            generation: self.generation,
            entries: self.entries.clone(),
        }
    }
}

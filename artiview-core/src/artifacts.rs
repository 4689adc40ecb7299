//! Artifact listing for `/api/artifacts`

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{LOOPBACK, ResolvedFolder};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactType {
    Html,
    Md,
}

impl ArtifactType {
    /// Listed file kinds. Folder landing pages (`index.html`) are skipped.
    pub fn of(file_name: &str) -> Option<Self> {
        if file_name.ends_with(".md") {
            Some(Self::Md)
        } else if file_name.ends_with(".html") && file_name != "index.html" {
            Some(Self::Html)
        } else {
            None
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Self::Html => ".html",
            Self::Md => ".md",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactFile {
    pub name: String,
    /// Workspace relative, `/` separated
    pub path: String,
    pub url: String,
    /// Modification time, milliseconds since the epoch
    pub modified: u64,
    #[serde(rename = "type")]
    pub kind: ArtifactType,
    pub folder_label: String,
}

/// Every listed file under the given folders, newest first.
///
/// Folders that do not exist or cannot be read contribute nothing.
pub fn list_artifacts(
    folders: &[ResolvedFolder],
    workspace_root: &Path,
    server_port: u16,
) -> Vec<ArtifactFile> {
    let mut files = Vec::new();
    for folder in folders {
        if !folder.path.is_dir() {
            debug!(folder = %folder.path.display(), "artifact folder missing");
            continue;
        }
        scan(&folder.path, folder, workspace_root, server_port, &mut files);
    }
    files.sort_by(|a, b| b.modified.cmp(&a.modified));
    files
}

fn scan(
    dir: &Path,
    folder: &ResolvedFolder,
    workspace_root: &Path,
    server_port: u16,
    out: &mut Vec<ArtifactFile>,
) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "skipping unreadable directory");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            scan(&path, folder, workspace_root, server_port, out);
            continue;
        }

        let file_name = entry.file_name().to_string_lossy().into_owned();
        let Some(kind) = ArtifactType::of(&file_name) else {
            continue;
        };
        let modified = entry
            .metadata()
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let relative = relative_url_path(workspace_root, &path);
        out.push(ArtifactFile {
            name: display_name(&file_name, kind),
            url: format!("http://{LOOPBACK}:{server_port}/{relative}"),
            path: relative,
            modified,
            kind,
            folder_label: folder.label.clone(),
        });
    }
}

fn display_name(file_name: &str, kind: ArtifactType) -> String {
    file_name
        .strip_suffix(kind.extension())
        .unwrap_or(file_name)
        .replace('_', " ")
}

/// Workspace relative path with `/` separators, or the full path for files
/// outside the workspace
pub fn relative_url_path(workspace_root: &Path, path: &Path) -> String {
    let relative: PathBuf = path
        .strip_prefix(workspace_root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf());
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .filter(|c| c != "/" && c != "\\")
        .collect::<Vec<_>>()
        .join("/")
}

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use artiview_core::app::PortEntry;
use artiview_core::ports::{parse_proc_net_tcp, socket_inode};

use super::{PortScanner, with_process_names};

const TABLES: [&str; 2] = ["net/tcp", "net/tcp6"];

/// Linux listener table from procfs.
///
/// Sockets are matched to processes through `/proc/<pid>/fd` links, which
/// only covers processes this user may inspect.
pub struct ProcfsScanner {
    root: std::path::PathBuf,
}

impl ProcfsScanner {
    pub fn new() -> Self {
        Self {
            root: "/proc".into(),
        }
    }

    pub fn supported() -> bool {
        Path::new("/proc").join(TABLES[0]).exists()
    }

    fn scan(&self) -> Vec<PortEntry> {
        let mut listeners: HashMap<u64, u16> = HashMap::new();
        for table in TABLES {
            match std::fs::read_to_string(self.root.join(table)) {
                Ok(content) => {
                    for (port, inode) in parse_proc_net_tcp(&content) {
                        listeners.insert(inode, port);
                    }
                }
                Err(e) => debug!(table, error = %e, "cannot read listener table"),
            }
        }
        if listeners.is_empty() {
            return Vec::new();
        }

        let mut pairs = Vec::new();
        let Ok(procs) = std::fs::read_dir(&self.root) else {
            return Vec::new();
        };
        for proc_entry in procs.flatten() {
            let Some(pid) = proc_entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<u32>().ok())
            else {
                continue;
            };
            let Ok(fds) = std::fs::read_dir(proc_entry.path().join("fd")) else {
                continue;
            };
            for fd in fds.flatten() {
                let Ok(target) = std::fs::read_link(fd.path()) else {
                    continue;
                };
                if let Some(port) = target
                    .to_str()
                    .and_then(socket_inode)
                    .and_then(|inode| listeners.get(&inode))
                {
                    pairs.push((*port, pid));
                }
            }
        }

        pairs.sort_unstable();
        with_process_names(pairs)
    }
}

impl Default for ProcfsScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PortScanner for ProcfsScanner {
    fn name(&self) -> &'static str {
        "procfs"
    }

    async fn is_available(&self) -> bool {
        self.root.join(TABLES[0]).exists()
    }

    async fn list_listening_ports(&self) -> Vec<PortEntry> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || ProcfsScanner { root }.scan())
            .await
            .unwrap_or_default()
    }
}

//! Listening TCP port enumeration
//!
//! One implementation per platform tool, all behind [`PortScanner`]. Scanners
//! fail soft: any error yields an empty list.

mod lsof;
#[cfg(windows)]
mod netstat;
#[cfg(target_os = "linux")]
mod procfs;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sysinfo::{Pid, ProcessesToUpdate, System};

use artiview_core::app::PortEntry;

pub use lsof::LsofScanner;
#[cfg(windows)]
pub use netstat::NetstatScanner;
#[cfg(target_os = "linux")]
pub use procfs::ProcfsScanner;

#[async_trait]
pub trait PortScanner: Send + Sync {
    /// Short name shown by `doctor`
    fn name(&self) -> &'static str;

    /// Whether the underlying OS facility can be used on this machine
    async fn is_available(&self) -> bool;

    async fn list_listening_ports(&self) -> Vec<PortEntry>;
}

pub struct SystemScanner;

impl SystemScanner {
    /// Pick the listener enumeration for this platform
    pub fn detect() -> Arc<dyn PortScanner> {
        #[cfg(target_os = "linux")]
        {
            if ProcfsScanner::supported() {
                return Arc::new(ProcfsScanner::new());
            }
            Arc::new(LsofScanner)
        }

        #[cfg(windows)]
        {
            Arc::new(NetstatScanner)
        }

        #[cfg(all(not(target_os = "linux"), not(windows)))]
        {
            Arc::new(LsofScanner)
        }
    }
}

/// Resolve process names for pids the listener table did not name
pub(crate) fn process_names(pids: &[u32]) -> HashMap<u32, String> {
    if pids.is_empty() {
        return HashMap::new();
    }

    let sys_pids: Vec<Pid> = pids.iter().map(|pid| Pid::from_u32(*pid)).collect();
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&sys_pids), true);

    pids.iter()
        .filter_map(|pid| {
            sys.process(Pid::from_u32(*pid))
                .map(|process| (*pid, process.name().to_string_lossy().into_owned()))
        })
        .collect()
}

/// Attach process names to `(port, pid)` pairs
pub(crate) fn with_process_names(pairs: Vec<(u16, u32)>) -> Vec<PortEntry> {
    let mut pids: Vec<u32> = pairs.iter().map(|(_, pid)| *pid).collect();
    pids.sort_unstable();
    pids.dedup();
    let names = process_names(&pids);

    let entries = pairs
        .into_iter()
        .map(|(port, pid)| PortEntry {
            port,
            pid,
            process: names.get(&pid).cloned().unwrap_or_else(|| "unknown".into()),
        })
        .collect();
    artiview_core::ports::dedupe(entries)
}

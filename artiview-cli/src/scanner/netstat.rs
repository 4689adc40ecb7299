use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use artiview_core::app::PortEntry;
use artiview_core::ports::parse_netstat_output;

use super::{PortScanner, with_process_names};

/// `netstat -ano -p TCP`, process names from sysinfo
pub struct NetstatScanner;

#[async_trait]
impl PortScanner for NetstatScanner {
    fn name(&self) -> &'static str {
        "netstat"
    }

    async fn is_available(&self) -> bool {
        Command::new("netstat")
            .arg("-?")
            .output()
            .await
            .is_ok()
    }

    async fn list_listening_ports(&self) -> Vec<PortEntry> {
        let output = match Command::new("netstat")
            .args(["-ano", "-p", "TCP"])
            .output()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                debug!(error = %e, "netstat unavailable");
                return Vec::new();
            }
        };

        let pairs = parse_netstat_output(&String::from_utf8_lossy(&output.stdout));
        tokio::task::spawn_blocking(move || with_process_names(pairs))
            .await
            .unwrap_or_default()
    }
}

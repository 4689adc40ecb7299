use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use artiview_core::app::PortEntry;
use artiview_core::ports::parse_lsof_output;

use super::PortScanner;

/// `lsof -iTCP -sTCP:LISTEN -P -n`
pub struct LsofScanner;

#[async_trait]
impl PortScanner for LsofScanner {
    fn name(&self) -> &'static str {
        "lsof"
    }

    async fn is_available(&self) -> bool {
        Command::new("lsof")
            .arg("-v")
            .output()
            .await
            .is_ok()
    }

    async fn list_listening_ports(&self) -> Vec<PortEntry> {
        // lsof exits 1 when nothing matches, so only stdout matters
        match Command::new("lsof")
            .args(["-iTCP", "-sTCP:LISTEN", "-P", "-n"])
            .output()
            .await
        {
            Ok(output) => parse_lsof_output(&String::from_utf8_lossy(&output.stdout)),
            Err(e) => {
                debug!(error = %e, "lsof unavailable");
                Vec::new()
            }
        }
    }
}

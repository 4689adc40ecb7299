//! Listener table parsing and the discovery port filter
//!
//! The platform scanners live in the binary; this module holds the pure
//! parsing of each tool's output so it can be tested anywhere.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::app::PortEntry;

static PORT_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":(\d+)$").expect("valid port suffix regex"));

/// TCP state code for LISTEN in `/proc/net/tcp`
const PROC_LISTEN_STATE: &str = "0A";

/// Port from a trailing `host:port` address (`*:3000`, `[::1]:3000`, `127.0.0.1:3000`)
pub fn port_from_address(address: &str) -> Option<u16> {
    PORT_SUFFIX_RE
        .captures(address)
        .and_then(|caps| caps[1].parse().ok())
}

/// Parse `lsof -iTCP -sTCP:LISTEN -P -n` output.
///
/// Columns: COMMAND PID USER FD TYPE DEVICE SIZE/OFF NODE NAME. The header
/// and short or unparseable rows are skipped.
pub fn parse_lsof_output(output: &str) -> Vec<PortEntry> {
    let entries = output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 9 {
                return None;
            }
            let pid = parts[1].parse().ok()?;
            let port = port_from_address(parts[8])?;
            Some(PortEntry {
                port,
                pid,
                process: parts[0].to_string(),
            })
        })
        .collect();

    dedupe(entries)
}

/// Parse `/proc/net/tcp` or `/proc/net/tcp6`, returning `(port, socket inode)`
/// for every socket in LISTEN state.
pub fn parse_proc_net_tcp(content: &str) -> Vec<(u16, u64)> {
    content
        .lines()
        .skip(1)
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 10 || parts[3] != PROC_LISTEN_STATE {
                return None;
            }
            let (_, port_hex) = parts[1].rsplit_once(':')?;
            let port = u16::from_str_radix(port_hex, 16).ok()?;
            let inode = parts[9].parse().ok()?;
            (inode != 0).then_some((port, inode))
        })
        .collect()
}

/// Inode from a `/proc/<pid>/fd/*` link target such as `socket:[12345]`
pub fn socket_inode(link: &str) -> Option<u64> {
    link.strip_prefix("socket:[")?.strip_suffix(']')?.parse().ok()
}

/// Parse `netstat -ano -p TCP` output, returning `(port, pid)` for LISTENING rows.
pub fn parse_netstat_output(output: &str) -> Vec<(u16, u32)> {
    let mut seen = HashSet::new();
    output
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 5 || !parts[0].eq_ignore_ascii_case("tcp") || parts[3] != "LISTENING" {
                return None;
            }
            let port = port_from_address(parts[1])?;
            let pid = parts[4].parse().ok()?;
            Some((port, pid))
        })
        .filter(|pair| seen.insert(*pair))
        .collect()
}

/// Drop repeated `(port, pid)` pairs, keeping first-seen order.
///
/// A process listening on both IPv4 and IPv6 shows up twice.
pub fn dedupe(entries: Vec<PortEntry>) -> Vec<PortEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| seen.insert((entry.port, entry.pid)))
        .collect()
}

/// Which listening ports are worth probing as unconfigured web apps
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryFilter {
    /// Ports above this are treated as ephemeral allocations
    pub max_port: u16,
    /// Privileged ports that are still commonly HTTP
    pub privileged_allow: Vec<u16>,
    /// Well known non-web services
    pub excluded_ports: Vec<u16>,
}

impl Default for DiscoveryFilter {
    fn default() -> Self {
        Self {
            max_port: 50000,
            privileged_allow: vec![80, 443, 8080],
            excluded_ports: vec![22, 25, 53, 110, 143, 993, 995],
        }
    }
}

impl DiscoveryFilter {
    pub fn admits(&self, port: u16, configured: &HashSet<u16>) -> bool {
        if configured.contains(&port) {
            return false;
        }
        if port < 1024 && !self.privileged_allow.contains(&port) {
            return false;
        }
        if self.excluded_ports.contains(&port) {
            return false;
        }
        port <= self.max_port
    }
}

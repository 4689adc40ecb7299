use std::net::TcpListener;
use std::path::Path;

use artiview_core::app::PortEntry;
use artiview_core::config::{ARTIFACTS_DIR, LOOPBACK, ViewerConfig, resolve_path};

use crate::scanner::{PortScanner, SystemScanner};

#[derive(Debug)]
pub struct Check {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub hint: Option<String>,
}

impl Check {
    fn ok(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            message: message.into(),
            hint: None,
        }
    }

    fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            message: message.into(),
            hint: None,
        }
    }

    fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

pub async fn run_doctor(workspace_root: &Path) -> Result<(), String> {
    println!("artiview doctor\n");
    println!("Workspace: {}\n", workspace_root.display());

    let mut failed: Vec<Check> = Vec::new();
    let scanner = SystemScanner::detect();

    println!("Environment:");
    for check in [
        check_scanner(scanner.as_ref()).await,
        check_workspace(workspace_root),
    ] {
        print_check(&check);
        if !check.passed {
            failed.push(check);
        }
    }
    println!();

    let config = match ViewerConfig::discover_or_default(workspace_root) {
        Ok((Some(path), config)) => {
            println!("Configuration: {}", path.display());
            config
        }
        Ok((None, config)) => {
            println!("Configuration: not found, using defaults");
            println!("  Run `artiview init` to create one");
            config
        }
        Err(e) => {
            let check = Check::fail("config", e.to_string())
                .with_hint("Fix the file or remove it to use the defaults");
            print_check(&check);
            failed.push(check);
            report(&failed);
            return Ok(());
        }
    };
    println!();

    println!("Server:");
    let server = check_server_port(&config, workspace_root);
    print_check(&server);
    if !server.passed {
        failed.push(server);
    }
    println!();

    if config.apps.enabled {
        let ports = scanner.list_listening_ports().await;
        let app_checks = check_apps(&config, workspace_root, &ports);
        if !app_checks.is_empty() {
            println!("Apps:");
            for check in app_checks {
                print_check(&check);
                if !check.passed {
                    failed.push(check);
                }
            }
            println!();
        }
    } else {
        println!("Apps: disabled\n");
    }

    report(&failed);
    Ok(())
}

fn report(failed: &[Check]) {
    if failed.is_empty() {
        println!("All checks passed!");
        return;
    }
    println!("Issues found:");
    for check in failed {
        println!("  - {}: {}", check.name, check.message);
        if let Some(hint) = &check.hint {
            println!("    Hint: {}", hint);
        }
    }
}

fn print_check(check: &Check) {
    let icon = if check.passed { "✓" } else { "✗" };
    let color = if check.passed { "\x1b[32m" } else { "\x1b[31m" };
    let reset = "\x1b[0m";

    println!("  {}{}{} {}: {}", color, icon, reset, check.name, check.message);

    if let Some(hint) = &check.hint {
        println!("    └─ {}", hint);
    }
}

async fn check_scanner(scanner: &dyn PortScanner) -> Check {
    if scanner.is_available().await {
        Check::ok("port scanner", format!("{} available", scanner.name()))
    } else {
        Check::fail("port scanner", format!("{} not available", scanner.name()))
            .with_hint(scanner_hint(scanner.name()))
    }
}

fn scanner_hint(name: &str) -> &'static str {
    match name {
        "lsof" => "Install lsof (e.g. `apt install lsof` or `brew install lsof`)",
        "netstat" => "netstat ships with Windows; check that it is on PATH",
        "procfs" => "/proc/net/tcp is not readable; check that /proc is mounted",
        _ => "Listener enumeration is unavailable on this system",
    }
}

fn check_workspace(workspace_root: &Path) -> Check {
    if workspace_root.join(ARTIFACTS_DIR).is_dir() {
        Check::ok("workspace", format!("{ARTIFACTS_DIR}/ found"))
    } else {
        Check::fail("workspace", format!("no {ARTIFACTS_DIR}/ directory"))
            .with_hint("Run `artiview init` or pass --workspace")
    }
}

fn check_server_port(config: &ViewerConfig, workspace_root: &Path) -> Check {
    let port = config.server_port(workspace_root);
    if is_port_available(port) {
        Check::ok("port", format!("{port} available"))
    } else {
        Check::fail("port", format!("{port} is in use"))
            .with_hint("Another viewer may be running; serve will try the next ports")
    }
}

fn check_apps(config: &ViewerConfig, workspace_root: &Path, ports: &[PortEntry]) -> Vec<Check> {
    config
        .apps
        .list
        .iter()
        .map(|app| {
            let mut issues = Vec::new();

            let cwd = resolve_path(workspace_root, Path::new(&app.cwd));
            if !cwd.is_dir() {
                issues.push(format!("cwd '{}' not found", cwd.display()));
            }
            if !app.has_start_cmd() {
                issues.push("no start command".to_string());
            }

            let state = match ports.iter().find(|entry| entry.port == app.port) {
                Some(entry) => format!("running :{} ({} pid {})", app.port, entry.process, entry.pid),
                None => format!("stopped :{}", app.port),
            };

            if issues.is_empty() {
                Check::ok(&app.id, state)
            } else {
                Check::fail(&app.id, format!("{}, {}", issues.join(", "), state))
            }
        })
        .collect()
}

fn is_port_available(port: u16) -> bool {
    TcpListener::bind((LOOPBACK, port)).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeScanner;
    use artiview_core::app::AppConfig;

    fn app(id: &str, port: u16, cwd: &str, start_cmd: &str) -> AppConfig {
        AppConfig {
            id: id.into(),
            name: id.into(),
            port,
            start_cmd: start_cmd.into(),
            stop_cmd: None,
            cwd: cwd.into(),
            health_url: String::new(),
            category: None,
        }
    }

    #[test]
    fn test_check_apps() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("web")).unwrap();

        let mut config = ViewerConfig::default();
        config.apps.list = vec![
            app("web", 5173, "web", "npm run dev"),
            app("api", 8000, "api", ""),
        ];
        let ports = vec![PortEntry {
            port: 5173,
            pid: 42,
            process: "node".into(),
        }];

        let checks = check_apps(&config, dir.path(), &ports);
        assert!(checks[0].passed);
        assert_eq!(checks[0].message, "running :5173 (node pid 42)");

        assert!(!checks[1].passed);
        assert!(checks[1].message.contains("not found"));
        assert!(checks[1].message.contains("no start command"));
        assert!(checks[1].message.ends_with("stopped :8000"));
    }

    #[test]
    fn test_check_workspace() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!check_workspace(dir.path()).passed);
        std::fs::create_dir(dir.path().join(ARTIFACTS_DIR)).unwrap();
        assert!(check_workspace(dir.path()).passed);
    }

    #[test]
    fn test_port_in_use() {
        let taken = TcpListener::bind((LOOPBACK, 0)).unwrap();
        let port = taken.local_addr().unwrap().port();
        assert!(!is_port_available(port));

        let mut config = ViewerConfig::default();
        config.server.port = port;
        let check = check_server_port(&config, Path::new("/tmp/ws"));
        assert!(!check.passed);
        assert!(check.hint.is_some());
    }

    #[tokio::test]
    async fn test_check_scanner() {
        let check = check_scanner(&FakeScanner::default()).await;
        assert!(check.passed);
        assert_eq!(check.message, "fake available");
    }

    #[test]
    fn test_scanner_hint_names_the_backend() {
        assert!(scanner_hint("lsof").contains("Install lsof"));
        assert!(scanner_hint("procfs").contains("/proc/net/tcp"));
        assert!(scanner_hint("netstat").contains("PATH"));
        assert!(!scanner_hint("procfs").contains("lsof"));
    }
}

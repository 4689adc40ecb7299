mod apps;
mod commands;
#[cfg(test)]
mod fake;
mod health;
mod launcher;
mod scanner;
mod server;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use artiview_core::config::{CONFIG_NAMES, ViewerConfig, find_workspace_root};
use artiview_core::{frontmatter, markdown};

use apps::{AppsManager, StopReport};
use health::HttpProber;
use launcher::ShellLauncher;
use scanner::SystemScanner;
use server::ServerState;

#[derive(Parser)]
#[command(name = "artiview")]
#[command(about = "Browse workspace artifacts and manage local web apps", long_about = None)]
struct Cli {
    /// Workspace root (default: nearest ancestor with an Artifacts/ directory)
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the workspace on a loopback port
    Serve,
    /// Render a Markdown file to HTML on stdout
    Render {
        file: PathBuf,
        /// Emit only the rendered body, without the page wrapper
        #[arg(long)]
        body_only: bool,
    },
    /// Print a document's frontmatter as JSON
    Frontmatter { file: PathBuf },
    /// List configured apps and whether they are running
    Apps,
    Start { id: String },
    Stop { id: String },
    /// List listening TCP ports
    Ports,
    /// Find unconfigured local web apps
    Discover,
    /// Add a discovered app to the config
    Adopt {
        port: u16,
        #[arg(short, long)]
        name: Option<String>,
    },
    Doctor,
    Init {
        #[arg(short, long)]
        yes: bool,
    },
}

/// Resolved workspace and configuration for a command
struct Context {
    workspace_root: PathBuf,
    config_path: Option<PathBuf>,
    config: ViewerConfig,
}

impl Context {
    fn load(workspace: Option<PathBuf>) -> Result<Self, String> {
        let cwd = std::env::current_dir()
            .map_err(|e| format!("Failed to get current directory: {}", e))?;
        let start = workspace.clone().unwrap_or_else(|| cwd.clone());

        let (config_path, config) = ViewerConfig::discover_or_default(&start)
            .map_err(|e| format!("Failed to load config: {}", e))?;

        // explicit flag, then an Artifacts/ ancestor, then the config's directory
        let workspace_root = workspace
            .or_else(|| find_workspace_root(&cwd))
            .or_else(|| config_path.as_deref().and_then(Path::parent).map(Path::to_path_buf))
            .unwrap_or(cwd);

        Ok(Self {
            workspace_root,
            config_path,
            config,
        })
    }

    fn manager(&self) -> AppsManager {
        AppsManager::new(
            &self.config,
            self.workspace_root.clone(),
            SystemScanner::detect(),
            Arc::new(HttpProber::new()),
            Arc::new(ShellLauncher),
        )
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // logs go to stderr so `render` and `frontmatter` output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Commands::Render { file, body_only } => render(&file, body_only),
        Commands::Frontmatter { file } => print_frontmatter(&file),
        Commands::Init { yes } => {
            let dir = match cli.workspace {
                Some(dir) => dir,
                None => std::env::current_dir()
                    .map_err(|e| format!("Failed to get current directory: {}", e))?,
            };
            commands::run_init(&dir, yes).map(|_| ())
        }
        Commands::Doctor => {
            let ctx = Context::load(cli.workspace)?;
            commands::run_doctor(&ctx.workspace_root).await
        }
        Commands::Serve => serve(Context::load(cli.workspace)?).await,
        Commands::Apps => list_apps(&Context::load(cli.workspace)?).await,
        Commands::Start { id } => start_app(&Context::load(cli.workspace)?, &id).await,
        Commands::Stop { id } => stop_app(&Context::load(cli.workspace)?, &id).await,
        Commands::Ports => list_ports(&Context::load(cli.workspace)?).await,
        Commands::Discover => discover(&Context::load(cli.workspace)?).await,
        Commands::Adopt { port, name } => adopt(Context::load(cli.workspace)?, port, name).await,
    }
}

fn read_document(file: &Path) -> Result<String, String> {
    std::fs::read_to_string(file).map_err(|e| format!("Failed to read {}: {}", file.display(), e))
}

fn render(file: &Path, body_only: bool) -> Result<(), String> {
    let content = read_document(file)?;
    if body_only {
        let extracted = frontmatter::extract(&content);
        println!("{}", markdown::render(&extracted.content));
    } else {
        let title = markdown::title_from_file_name(file);
        print!("{}", markdown::render_document(&content, &title));
    }
    Ok(())
}

fn print_frontmatter(file: &Path) -> Result<(), String> {
    let extracted = frontmatter::extract(&read_document(file)?);
    let out = json!({
        "metadata": extracted.metadata,
        "content": extracted.content,
    });
    let pretty = serde_json::to_string_pretty(&out).map_err(|e| e.to_string())?;
    println!("{}", pretty);
    Ok(())
}

async fn serve(ctx: Context) -> Result<(), String> {
    let config = &ctx.config;
    let first = config.server_port(&ctx.workspace_root);
    let listener = server::bind(first, config.server.bind_attempts)
        .await
        .map_err(|e| e.to_string())?;
    let port = listener
        .local_addr()
        .map_err(|e| e.to_string())?
        .port();

    let apps = config.apps.enabled.then(|| Arc::new(ctx.manager()));
    if let Some(path) = &ctx.config_path {
        info!("config: {}", path.display());
    }

    let state = Arc::new(ServerState::new(
        config,
        ctx.workspace_root.clone(),
        port,
        apps,
    ));
    server::serve(listener, state)
        .await
        .map_err(|e| e.to_string())
}

async fn list_apps(ctx: &Context) -> Result<(), String> {
    let status = ctx.manager().status().await;
    if status.is_empty() {
        println!("No apps configured");
        return Ok(());
    }
    for app in status {
        let state = match (app.running, app.pid) {
            (true, Some(pid)) => format!("running (pid {})", pid),
            (true, None) => "running".to_string(),
            (false, _) => "stopped".to_string(),
        };
        println!(
            "{:<16} {:<24} :{:<6} {}",
            app.config.id, app.config.name, app.config.port, state
        );
    }
    Ok(())
}

async fn start_app(ctx: &Context, id: &str) -> Result<(), String> {
    let report = ctx.manager().start(id).await.map_err(|e| e.to_string())?;
    let pid = report
        .pid
        .map(|pid| format!(" (pid {})", pid))
        .unwrap_or_default();
    if report.healthy {
        println!("Started {}{}", id, pid);
    } else {
        println!("Started {}{}, health check timed out", id, pid);
    }
    Ok(())
}

async fn stop_app(ctx: &Context, id: &str) -> Result<(), String> {
    match ctx.manager().stop(id).await.map_err(|e| e.to_string())? {
        StopReport::StopCommand => println!("Stopped {} with its stop command", id),
        StopReport::Killed(pids) => {
            let pids: Vec<String> = pids.iter().map(u32::to_string).collect();
            println!("Stopped {} (killed {})", id, pids.join(", "));
        }
        StopReport::NotRunning => println!("{} was not running", id),
    }
    Ok(())
}

async fn list_ports(ctx: &Context) -> Result<(), String> {
    let manager = ctx.manager();
    let ports = manager.ports().await;
    if ports.is_empty() {
        println!("No listening ports found ({})", manager.scanner().name());
        return Ok(());
    }
    for entry in ports {
        println!("{:<6} {:<8} {}", entry.port, entry.pid, entry.process);
    }
    Ok(())
}

async fn discover(ctx: &Context) -> Result<(), String> {
    let found = ctx.manager().discover().await;
    if found.is_empty() {
        println!("No unconfigured web apps found");
        return Ok(());
    }
    for app in found {
        let marker = if app.is_aimax_viewer { " [viewer]" } else { "" };
        println!(
            ":{:<6} {:<10} {}{}",
            app.port,
            app.process,
            app.display_name(),
            marker
        );
    }
    Ok(())
}

async fn adopt(mut ctx: Context, port: u16, name: Option<String>) -> Result<(), String> {
    let discovered = ctx
        .manager()
        .discover()
        .await
        .into_iter()
        .find(|app| app.port == port)
        .ok_or_else(|| format!("No unconfigured web app is listening on port {}", port))?;

    let name = name.unwrap_or_else(|| discovered.display_name());
    let id = ctx
        .config
        .adopt(&discovered, &name)
        .map_err(|e| e.to_string())?
        .id
        .clone();

    let path = ctx
        .config_path
        .clone()
        .unwrap_or_else(|| ctx.workspace_root.join(CONFIG_NAMES[0]));
    ctx.config.save(&path).map_err(|e| e.to_string())?;

    println!("Added {} ({}) to {}", id, name, path.display());
    Ok(())
}

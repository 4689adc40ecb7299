//! `artiview init` - writes a starter artiview.yaml

use std::fs;
use std::path::{Path, PathBuf};

use artiview_core::config::{ARTIFACTS_DIR, CONFIG_NAMES, DEFAULT_PORT};

fn starter_yaml() -> String {
    format!(
        r#"# artiview configuration
# workspace: my-project          # display name, defaults to the directory name

server:
  port: {DEFAULT_PORT}                     # {DEFAULT_PORT} picks a per-workspace port
  home_page: {ARTIFACTS_DIR}/index.html

folders:
  - label: {ARTIFACTS_DIR}
    path: {ARTIFACTS_DIR}

apps:
  enabled: true
  list: []
  # list:
  #   - id: web
  #     name: Web
  #     port: 5173
  #     startCmd: npm run dev
  #     cwd: web
  #     healthUrl: http://127.0.0.1:5173/

recents:
  limit: 24
"#
    )
}

/// Write the starter config into `dir` and make sure the artifacts folder exists.
pub fn run_init(dir: &Path, yes: bool) -> Result<PathBuf, String> {
    for name in &CONFIG_NAMES {
        let path = dir.join(name);
        if path.exists() {
            if !yes {
                return Err(format!(
                    "Config file {} already exists. Use --yes to overwrite.",
                    path.display()
                ));
            }
            println!("Overwriting existing config: {}", path.display());
        }
    }

    let output_path = dir.join(CONFIG_NAMES[0]);
    fs::write(&output_path, starter_yaml())
        .map_err(|e| format!("Failed to write config: {}", e))?;

    let artifacts = dir.join(ARTIFACTS_DIR);
    if !artifacts.is_dir() {
        fs::create_dir_all(&artifacts)
            .map_err(|e| format!("Failed to create {}: {}", artifacts.display(), e))?;
        println!("Created: {}", artifacts.display());
    }

    println!("Created: {}\n", output_path.display());
    println!("Next steps:");
    println!("  1. Add apps under `apps.list`, or run `artiview discover`");
    println!("  2. Run `artiview serve`");

    Ok(output_path)
}

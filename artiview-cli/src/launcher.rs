use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` exited with code {code:?}: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("failed to kill pid {pid}: {message}")]
    Kill { pid: u32, message: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KillOutcome {
    Killed,
    /// The process was already gone
    NoSuchProcess,
}

/// Process side effects of the apps manager
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Start a shell command detached from this process with all output
    /// discarded. Returns the shell's pid.
    async fn spawn_detached(&self, command: &str, cwd: &Path) -> Result<Option<u32>, LaunchError>;

    /// Run a shell command to completion in `cwd`
    async fn run(&self, command: &str, cwd: &Path) -> Result<(), LaunchError>;

    /// Forcibly terminate a process
    async fn kill(&self, pid: u32) -> Result<KillOutcome, LaunchError>;
}

fn shell(command: &str) -> Command {
    #[cfg(unix)]
    let cmd = {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    };
    #[cfg(windows)]
    let cmd = {
        let mut c = Command::new("cmd");
        c.args(["/C", command]);
        c
    };
    cmd
}

/// Launches through `sh -c` (Windows: `cmd /C`)
pub struct ShellLauncher;

#[async_trait]
impl Launcher for ShellLauncher {
    async fn spawn_detached(&self, command: &str, cwd: &Path) -> Result<Option<u32>, LaunchError> {
        let mut cmd = shell(command);
        cmd.current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(false);

        // new session so the app survives this process and its terminal
        #[cfg(unix)]
        unsafe {
            cmd.pre_exec(|| {
                libc::setsid();
                Ok(())
            });
        }

        let mut child = cmd.spawn().map_err(|source| LaunchError::Spawn {
            command: command.to_string(),
            source,
        })?;
        let pid = child.id();

        // reap the shell when it exits, nothing else is observed
        tokio::spawn(async move {
            let _ = child.wait().await;
        });

        Ok(pid)
    }

    async fn run(&self, command: &str, cwd: &Path) -> Result<(), LaunchError> {
        let output = shell(command)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| LaunchError::Spawn {
                command: command.to_string(),
                source,
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(LaunchError::CommandFailed {
                command: command.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    #[cfg(unix)]
    async fn kill(&self, pid: u32) -> Result<KillOutcome, LaunchError> {
        let Ok(raw) = libc::pid_t::try_from(pid) else {
            return Ok(KillOutcome::NoSuchProcess);
        };
        let rc = unsafe { libc::kill(raw, libc::SIGKILL) };
        if rc == 0 {
            return Ok(KillOutcome::Killed);
        }
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            Ok(KillOutcome::NoSuchProcess)
        } else {
            Err(LaunchError::Kill {
                pid,
                message: err.to_string(),
            })
        }
    }

    #[cfg(windows)]
    async fn kill(&self, pid: u32) -> Result<KillOutcome, LaunchError> {
        let command = format!("taskkill /F /PID {pid}");
        let output = Command::new("taskkill")
            .args(["/F", "/PID", &pid.to_string()])
            .output()
            .await
            .map_err(|source| LaunchError::Spawn {
                command: command.clone(),
                source,
            })?;
        match output.status.code() {
            Some(0) => Ok(KillOutcome::Killed),
            // 128: process not found
            Some(128) => Ok(KillOutcome::NoSuchProcess),
            code => Err(LaunchError::CommandFailed {
                command,
                code,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }
}

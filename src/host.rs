use std::fs;
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use sysinfo::{System, SystemExt};
use thiserror::Error;
use tokio::process::Command;
use tokio::runtime::Handle;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("{program} is not installed")]
    NotFound { program: String },
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: io::Error,
    },
    #[error("{program} timed out after {after:?}")]
    Timeout { program: String, after: Duration },
    #[error("failed to read {path}: {source}")]
    Read { path: String, source: io::Error },
}

pub trait Host: Send + Sync {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, HostError>;
    fn read_file(&self, path: &str) -> Result<String, HostError>;
    fn has_program(&self, program: &str) -> bool;
    fn hostname(&self) -> Option<String>;
}

/// `run` blocks on `handle`; call it from a blocking thread, never from a task.
pub struct SystemHost {
    timeout: Duration,
    handle: Handle,
}

impl SystemHost {
    pub fn new(timeout: Duration, handle: Handle) -> Self {
        Self { timeout, handle }
    }
}

impl Host for SystemHost {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, HostError> {
        let result = self.handle.block_on(async {
            tokio::time::timeout(
                self.timeout,
                Command::new(program)
                    .args(args)
                    .stdin(Stdio::null())
                    .kill_on_drop(true)
                    .output(),
            )
            .await
        });

        let output = match result {
            Ok(Ok(output)) => output,
            Ok(Err(source)) if source.kind() == io::ErrorKind::NotFound => {
                return Err(HostError::NotFound {
                    program: program.to_string(),
                })
            }
            Ok(Err(source)) => {
                return Err(HostError::Spawn {
                    program: program.to_string(),
                    source,
                })
            }
            Err(_) => {
                debug!(program, args = ?args, "killed command after timeout");
                return Err(HostError::Timeout {
                    program: program.to_string(),
                    after: self.timeout,
                });
            }
        };

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn read_file(&self, path: &str) -> Result<String, HostError> {
        fs::read_to_string(path).map_err(|source| HostError::Read {
            path: path.to_string(),
            source,
        })
    }

    fn has_program(&self, program: &str) -> bool {
        let Some(paths) = std::env::var_os("PATH") else {
            return false;
        };
        std::env::split_paths(&paths).any(|dir| is_executable(&dir.join(program)))
    }

    fn hostname(&self) -> Option<String> {
        System::new()
            .host_name()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

//! Container runtime driver

use crate::error::{MaverickError, Result};
use crate::process::spawn_error;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Default compose binary
pub const DEFAULT_COMPOSE: &str = "docker-compose";

/// Runs one runtime command against a manifest
#[async_trait]
pub trait RuntimeDriver: Send + Sync {
    /// Run `args` (`up`, `stop`, `build`, ...) with `manifest` as the compose file
    async fn invoke(&self, args: &[String], manifest: &[u8]) -> Result<()>;
}

/// Drives a docker-compose compatible binary, piping the manifest on stdin
#[derive(Debug, Clone)]
pub struct ComposeBinary {
    program: String,
    /// Words after the program, e.g. `compose` in `docker compose`
    leading: Vec<String>,
    cwd: PathBuf,
}

impl ComposeBinary {
    /// `command` is split on whitespace into the program and its leading
    /// arguments. A blank command falls back to [`DEFAULT_COMPOSE`].
    pub fn new(command: impl AsRef<str>, cwd: PathBuf) -> Self {
        let mut words = command.as_ref().split_whitespace().map(str::to_string);
        let program = words.next().unwrap_or_else(|| DEFAULT_COMPOSE.to_string());
        Self {
            program,
            leading: words.collect(),
            cwd,
        }
    }
}

#[async_trait]
impl RuntimeDriver for ComposeBinary {
    async fn invoke(&self, args: &[String], manifest: &[u8]) -> Result<()> {
        let mut full_args = self.leading.clone();
        full_args.extend(["-f".to_string(), "-".to_string()]);
        full_args.extend(args.iter().cloned());
        let command = format!("{} {}", self.program, full_args.join(" "));
        tracing::info!("Running: {}", command);

        let mut child = Command::new(&self.program)
            .args(&full_args)
            .current_dir(&self.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| spawn_error(&self.program, e))?;

        if let Some(mut stdin) = child.stdin.take() {
            // the exit status reports a child that quit before reading
            if let Err(e) = stdin.write_all(manifest).await {
                if e.kind() != ErrorKind::BrokenPipe {
                    return Err(e.into());
                }
            }
        }

        let status = child.wait().await?;
        tracing::trace!("{} exited with {}", self.program, status);
        if !status.success() {
            return Err(MaverickError::CommandFailed {
                command,
                code: status.code(),
            });
        }
        Ok(())
    }
}

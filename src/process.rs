//! External process execution

use crate::error::{MaverickError, Result};
use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Captured output of a finished process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: Option<i32>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs helper programs (package tooling, git) and captures their output
#[derive(Debug, Clone, Default)]
pub struct Runner;

impl Runner {
    pub fn new() -> Self {
        Self
    }

    /// Run a program to completion in `cwd`, capturing stdout and stderr
    pub async fn exec(&self, program: &str, args: &[&str], cwd: &Path) -> Result<ProcessOutput> {
        tracing::trace!("Executing in {}: {} {}", cwd.display(), program, args.join(" "));

        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| spawn_error(program, e))?;

        Ok(ProcessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            code: output.status.code(),
        })
    }

    /// Like [`Runner::exec`] but a non-zero exit is an error
    pub async fn exec_checked(&self, program: &str, args: &[&str], cwd: &Path) -> Result<ProcessOutput> {
        let output = self.exec(program, args, cwd).await?;
        if !output.success() {
            tracing::error!("{}", output.stderr.trim_end());
            return Err(MaverickError::CommandFailed {
                command: format!("{} {}", program, args.join(" ")),
                code: output.code,
            });
        }
        Ok(output)
    }
}

/// Map a spawn failure, keeping a missing binary distinct from other IO errors
pub fn spawn_error(program: &str, err: std::io::Error) -> MaverickError {
    if err.kind() == ErrorKind::NotFound {
        MaverickError::CommandNotFound(program.to_string())
    } else {
        MaverickError::Io(err)
    }
}

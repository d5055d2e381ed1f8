use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use super::{GitRunner, RunError, TmuxRunner};

async fn execute(program: &str, dir: Option<&Path>, args: &[&str]) -> Result<String, RunError> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = dir {
        command.current_dir(dir);
    }

    let output = command.output().await.map_err(|source| RunError::Spawn {
        program: program.to_string(),
        source,
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(RunError::Failed {
            program: program.to_string(),
            args: args.join(" "),
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

#[derive(Debug, Clone)]
pub struct TmuxCommand {
    tmux_path: String,
}

impl TmuxCommand {
    pub fn new() -> Self {
        Self {
            tmux_path: "tmux".to_string(),
        }
    }
}

impl Default for TmuxCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TmuxRunner for TmuxCommand {
    async fn run(&self, args: &[&str]) -> Result<String, RunError> {
        tracing::trace!("tmux {}", args.join(" "));
        execute(&self.tmux_path, None, args).await
    }
}

#[derive(Debug, Clone)]
pub struct GitCommand {
    git_path: String,
}

impl GitCommand {
    pub fn new() -> Self {
        Self {
            git_path: "git".to_string(),
        }
    }
}

impl Default for GitCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GitRunner for GitCommand {
    async fn run(&self, dir: &Path, args: &[&str]) -> Result<String, RunError> {
        tracing::trace!("git -C {} {}", dir.display(), args.join(" "));
        execute(&self.git_path, Some(dir), args).await
    }
}

mod process;

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

pub use process::{GitCommand, TmuxCommand};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} {args} failed: {stderr}")]
    Failed {
        program: String,
        args: String,
        stderr: String,
    },
}

/// Runs tmux commands against the default server. No working directory.
#[async_trait]
pub trait TmuxRunner: Send + Sync {
    async fn run(&self, args: &[&str]) -> Result<String, RunError>;
}

/// Runs git commands inside an explicit directory.
#[async_trait]
pub trait GitRunner: Send + Sync {
    async fn run(&self, dir: &Path, args: &[&str]) -> Result<String, RunError>;
}

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{dashboard, kill, new, open, status, swap, watch};

#[derive(Parser)]
#[command(name = "treedeck")]
#[command(about = "Worktree deck - tmux layouts, agent status and branch renaming for git worktrees")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Switch to a worktree's session, creating its layout if needed
    Open(open::Args),

    /// Create a worktree and session, then rename the branch after the first prompt
    New(new::Args),

    /// Rename a worktree's branch once its first prompt appears
    Watch(watch::Args),

    /// Rotate hidden panes into the current session's view
    Swap(swap::Args),

    /// Display agent states of a session
    Status(status::Args),

    /// Kill a worktree's session
    Kill(kill::Args),

    /// Launch the interactive dashboard
    Dashboard(dashboard::Args),
}

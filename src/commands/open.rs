use anyhow::Result;
use clap::Args as ClapArgs;
use std::path::PathBuf;

use crate::commands::common;
use crate::config::Config;
use crate::session::SessionManager;

#[derive(ClapArgs)]
pub struct Args {
    /// Worktree directory (default: current directory)
    pub path: Option<PathBuf>,
}

pub async fn execute(args: Args, config: Config) -> Result<()> {
    let worktree = common::resolve_dir(args.path)?;
    let sessions = SessionManager::new();

    let layout = common::open_session(&sessions, &config, &worktree).await?;
    if layout.is_complete() {
        println!("Created session: {}", layout.name);
        for pane in &layout.panes {
            println!("  {:<14} {}", pane.label(), pane.pane_id);
        }
    } else {
        println!("Switched to session: {}", layout.name);
    }
    Ok(())
}

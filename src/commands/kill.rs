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

pub async fn execute(args: Args, _config: Config) -> Result<()> {
    let worktree = common::resolve_dir(args.path)?;
    let sessions = SessionManager::new();
    let lookup = common::head_lookup();

    let name = sessions.resolve_session_name(&worktree, Some(&lookup)).await;
    if !sessions.has_session(&name).await {
        println!("No session for {}", worktree.display());
        return Ok(());
    }

    sessions.kill_session(&name).await?;
    println!("Killed session: {}", name);
    Ok(())
}

use anyhow::{bail, Result};
use chrono::Utc;
use clap::Args as ClapArgs;

use crate::commands::common;
use crate::config::Config;
use crate::session::SessionManager;
use crate::utils::format_duration;

#[derive(ClapArgs)]
pub struct Args {
    /// Branch to check out in the new worktree (created if missing)
    pub branch: String,

    /// Do not rename the branch after the first prompt
    #[arg(long)]
    pub no_watch: bool,
}

pub async fn execute(args: Args, config: Config) -> Result<()> {
    let cwd = common::resolve_dir(None)?;
    let worktrees = common::worktree_manager(&config, &cwd).await?;

    if worktrees.worktree_exists(&args.branch) {
        bail!(
            "Worktree {} already exists",
            worktrees.worktree_path(&args.branch).display()
        );
    }

    let created_at = Utc::now();
    let path = worktrees.create_worktree(&args.branch).await?;
    println!("Created worktree: {}", path.display());

    let sessions = SessionManager::new();
    let layout = common::open_session(&sessions, &config, &path).await?;
    println!("Session: {}", layout.name);

    if args.no_watch || !config.rename.enabled {
        return Ok(());
    }

    println!(
        "Waiting up to {} for the first prompt in {}...",
        format_duration(config.rename.timeout),
        layout.name
    );
    let report = common::rename_watcher(&config, path, &args.branch, Some(layout.name), created_at)
        .run()
        .await;
    common::report_rename(report)
}

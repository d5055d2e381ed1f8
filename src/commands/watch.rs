use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args as ClapArgs;
use std::path::PathBuf;

use crate::commands::common;
use crate::config::Config;
use crate::session::SessionManager;

#[derive(ClapArgs)]
pub struct Args {
    /// Worktree directory (default: current directory)
    pub path: Option<PathBuf>,

    /// Branch to rename once a prompt is seen
    #[arg(short, long)]
    pub branch: String,

    /// Only consider prompts after this RFC 3339 time (default: now)
    #[arg(long)]
    pub since: Option<DateTime<Utc>>,
}

pub async fn execute(args: Args, config: Config) -> Result<()> {
    let worktree = common::resolve_dir(args.path)?;
    let since = args.since.unwrap_or_else(Utc::now);

    let sessions = SessionManager::new();
    let lookup = common::head_lookup();
    let name = sessions.resolve_session_name(&worktree, Some(&lookup)).await;
    let session = if sessions.has_session(&name).await {
        Some(name)
    } else {
        None
    };

    println!("Watching {} for branch {}...", worktree.display(), args.branch);
    let report = common::rename_watcher(&config, worktree, &args.branch, session, since)
        .run()
        .await;
    common::report_rename(report)
}

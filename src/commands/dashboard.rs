use anyhow::Result;
use clap::Args as ClapArgs;
use std::path::PathBuf;

use crate::commands::common;
use crate::config::Config;
use crate::tower::Dashboard;

#[derive(ClapArgs)]
pub struct Args {
    /// Repository directory (default: current directory)
    pub path: Option<PathBuf>,
}

pub async fn execute(args: Args, config: Config) -> Result<()> {
    let dir = common::resolve_dir(args.path)?;
    let worktrees = common::worktree_manager(&config, &dir).await?;

    let mut dashboard = Dashboard::new(config, worktrees);
    dashboard.run().await
}

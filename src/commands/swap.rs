use anyhow::Result;
use clap::{Args as ClapArgs, ValueEnum};

use crate::config::Config;
use crate::session::SessionManager;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Target {
    /// Rotate the centre pane with the two hidden centre panes
    Center,
    /// Rotate the bottom-right pane with its two hidden siblings
    Right,
}

#[derive(ClapArgs)]
pub struct Args {
    #[arg(value_enum)]
    pub target: Target,
}

pub async fn execute(args: Args, _config: Config) -> Result<()> {
    let sessions = SessionManager::new();
    match args.target {
        Target::Center => sessions.swap_center().await,
        Target::Right => sessions.swap_right_below().await,
    }
}

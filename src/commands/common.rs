use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::rename::{
    BranchRenameWatcher, CliNameGenerator, HistoryFile, WatchReport, WatcherConfig,
};
use crate::runner::{GitCommand, TmuxCommand};
use crate::session::{HeadBranch, SessionLayout, SessionManager, WorktreeManager};

pub type RenameWatcher = BranchRenameWatcher<GitCommand, HistoryFile, CliNameGenerator, TmuxCommand>;

/// Canonical directory for an optional CLI path argument (default: current directory).
pub fn resolve_dir(path: Option<PathBuf>) -> Result<PathBuf> {
    let path = path.unwrap_or_else(|| PathBuf::from("."));
    path.canonicalize()
        .with_context(|| format!("Failed to resolve path: {}", path.display()))
}

pub async fn worktree_manager(config: &Config, dir: &Path) -> Result<WorktreeManager> {
    WorktreeManager::resolve(GitCommand::new(), dir, &config.worktree_dir).await
}

pub fn head_lookup() -> HeadBranch {
    HeadBranch::new(GitCommand::new())
}

/// Switches to the worktree's session, creating it if needed.
pub async fn open_session(
    sessions: &SessionManager,
    config: &Config,
    worktree: &Path,
) -> Result<SessionLayout> {
    let lookup = head_lookup();
    sessions
        .open_worktree_session(
            worktree,
            config.startup_command().unwrap_or_default(),
            config.agent_command(),
            Some(&lookup),
        )
        .await
}

pub fn rename_watcher(
    config: &Config,
    worktree: PathBuf,
    branch: &str,
    session_name: Option<String>,
    created_at: DateTime<Utc>,
) -> RenameWatcher {
    let mut watch = WatcherConfig::new(worktree, branch)
        .with_created_at(created_at)
        .with_timing(config.rename.poll_interval, config.rename.timeout);
    if let Some(name) = session_name {
        watch = watch.with_session_name(name);
    }

    BranchRenameWatcher::new(
        watch,
        GitCommand::new(),
        HistoryFile::new(config.rename.history_path()),
        CliNameGenerator::new(
            config.rename.generator_command.clone(),
            config.rename.generator_args.clone(),
        ),
    )
    .with_sessions(SessionManager::new())
}

/// Prints a finished watch. Only generator and git failures are errors; a
/// timeout just means nobody typed a prompt.
pub fn report_rename(report: WatchReport) -> Result<()> {
    if report.succeeded() {
        println!(
            "Renamed {} -> {}",
            report.info.original_branch,
            report.info.new_branch.unwrap_or_default()
        );
        return Ok(());
    }

    match report.error {
        Some(e) if e.is_timeout() => {
            println!("Rename skipped: {}", e);
            Ok(())
        }
        Some(e) => Err(e.into()),
        None => {
            println!("Rename ended as {}", report.info.status.as_str());
            Ok(())
        }
    }
}

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::tmux::{path_to_str, BranchLookup};
use crate::rename::slug_from_branch;
use crate::runner::{GitCommand, GitRunner};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worktree {
    pub path: PathBuf,
    /// `None` for a detached HEAD.
    pub branch: Option<String>,
}

pub async fn current_branch<G: GitRunner + ?Sized>(git: &G, dir: &Path) -> Result<String> {
    let out = git
        .run(dir, &["symbolic-ref", "--short", "HEAD"])
        .await
        .with_context(|| format!("Failed to resolve current branch in {}", dir.display()))?;
    Ok(out.trim().to_string())
}

pub async fn rename_branch<G: GitRunner + ?Sized>(
    git: &G,
    dir: &Path,
    old: &str,
    new: &str,
) -> Result<()> {
    git.run(dir, &["branch", "-m", old, new])
        .await
        .with_context(|| format!("Failed to rename branch {} to {}", old, new))?;
    Ok(())
}

/// Parses `git worktree list --porcelain`.
pub fn parse_worktree_list(output: &str) -> Vec<Worktree> {
    let mut worktrees = Vec::new();
    let mut current: Option<Worktree> = None;

    for line in output.lines() {
        if let Some(path) = line.strip_prefix("worktree ") {
            if let Some(done) = current.take() {
                worktrees.push(done);
            }
            current = Some(Worktree {
                path: PathBuf::from(path),
                branch: None,
            });
        } else if let Some(reference) = line.strip_prefix("branch ") {
            if let Some(wt) = current.as_mut() {
                let name = reference.strip_prefix("refs/heads/").unwrap_or(reference);
                wt.branch = Some(name.to_string());
            }
        } else if line.trim().is_empty() {
            if let Some(done) = current.take() {
                worktrees.push(done);
            }
        }
    }

    if let Some(done) = current.take() {
        worktrees.push(done);
    }
    worktrees
}

async fn resolve_git_root<G: GitRunner>(git: &G, project_path: &Path) -> Result<PathBuf> {
    let out = git
        .run(
            project_path,
            &["rev-parse", "--path-format=absolute", "--git-common-dir"],
        )
        .await
        .context("Failed to resolve git root (not a git repository?)")?;

    let common_dir = PathBuf::from(out.trim());
    // --git-common-dir returns the .git directory; its parent is the main working tree
    Ok(common_dir
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| project_path.to_path_buf()))
}

#[derive(Clone)]
pub struct WorktreeManager<G: GitRunner = GitCommand> {
    git: G,
    git_root: PathBuf,
    worktree_dir: PathBuf,
}

impl<G: GitRunner> WorktreeManager<G> {
    pub fn new(git: G, git_root: PathBuf, worktree_dir: &Path) -> Self {
        let worktree_dir = git_root.join(worktree_dir);
        Self {
            git,
            git_root,
            worktree_dir,
        }
    }

    pub async fn resolve(git: G, project_path: &Path, worktree_dir: &Path) -> Result<Self> {
        let git_root = resolve_git_root(&git, project_path).await?;
        Ok(Self::new(git, git_root, worktree_dir))
    }

    pub fn git(&self) -> &G {
        &self.git
    }

    pub fn git_root(&self) -> &Path {
        &self.git_root
    }

    /// Directory for a branch: the branch slug, flattened to one path segment.
    pub fn worktree_path(&self, branch_name: &str) -> PathBuf {
        self.worktree_dir
            .join(slug_from_branch(branch_name).replace('/', "-"))
    }

    pub fn worktree_exists(&self, branch_name: &str) -> bool {
        self.worktree_path(branch_name).exists()
    }

    pub async fn create_worktree(&self, branch_name: &str) -> Result<PathBuf> {
        let wt_path = self.worktree_path(branch_name);

        tokio::fs::create_dir_all(&self.worktree_dir)
            .await
            .context("Failed to create worktrees directory")?;

        let wt_path_str = path_to_str(&wt_path)?;

        let attached = self
            .git
            .run(&self.git_root, &["worktree", "add", wt_path_str, branch_name])
            .await;
        if let Err(e) = attached {
            tracing::debug!("No existing branch {} to attach ({:#}), creating it", branch_name, e);
            self.git
                .run(
                    &self.git_root,
                    &["worktree", "add", "-b", branch_name, wt_path_str],
                )
                .await
                .context("git worktree add failed")?;
        }

        tracing::info!("Created worktree {} for {}", wt_path.display(), branch_name);
        Ok(wt_path)
    }

    pub async fn list_worktrees(&self) -> Result<Vec<Worktree>> {
        let out = self
            .git
            .run(&self.git_root, &["worktree", "list", "--porcelain"])
            .await
            .context("Failed to list worktrees")?;
        Ok(parse_worktree_list(&out))
    }

    pub async fn current_branch(&self, worktree: &Path) -> Result<String> {
        current_branch(&self.git, worktree).await
    }
}

/// Branch lookup that asks git for the worktree's checked-out branch.
#[derive(Clone)]
pub struct HeadBranch<G: GitRunner = GitCommand> {
    git: G,
}

impl<G: GitRunner> HeadBranch<G> {
    pub fn new(git: G) -> Self {
        Self { git }
    }
}

#[async_trait]
impl<G: GitRunner> BranchLookup for HeadBranch<G> {
    async fn current_branch(&self, worktree: &Path) -> Result<String> {
        current_branch(&self.git, worktree).await
    }
}

#[async_trait]
impl<G: GitRunner> BranchLookup for WorktreeManager<G> {
    async fn current_branch(&self, worktree: &Path) -> Result<String> {
        WorktreeManager::current_branch(self, worktree).await
    }
}

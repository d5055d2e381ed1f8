use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::Path;

use super::layout::{
    build_session_layout, rotation_swaps, Area, Ring, SessionLayout, BACKGROUND_PANE_COUNT,
    BACKGROUND_WINDOW, MAIN_WINDOW, RIGHT_COLUMN_PERCENT,
};
use crate::rename::slug_from_branch;
use crate::runner::{TmuxCommand, TmuxRunner};

/// Resolves the branch currently checked out in a worktree.
#[async_trait]
pub trait BranchLookup: Send + Sync {
    async fn current_branch(&self, worktree: &Path) -> Result<String>;
}

pub(crate) fn path_to_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| anyhow::anyhow!("Path contains non-UTF8 characters: {:?}", path))
}

/// Session name derived from a worktree directory. tmux rewrites `.` and `:`
/// in session names, so they are replaced up front.
pub fn session_name_for_dir(worktree: &Path) -> String {
    let base = worktree
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| worktree.to_string_lossy().to_string());
    base.replace(['.', ':'], "_")
}

/// Exact-match target; a bare name would also match by prefix.
fn exact(name: &str) -> String {
    format!("={}", name)
}

pub async fn has_session<T: TmuxRunner + ?Sized>(tmux: &T, name: &str) -> bool {
    tmux.run(&["has-session", "-t", &exact(name)]).await.is_ok()
}

#[derive(Clone)]
pub struct SessionManager<T: TmuxRunner = TmuxCommand> {
    tmux: T,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            tmux: TmuxCommand::new(),
        }
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TmuxRunner> SessionManager<T> {
    pub fn with_runner(tmux: T) -> Self {
        Self { tmux }
    }

    pub async fn has_session(&self, name: &str) -> bool {
        has_session(&self.tmux, name).await
    }

    /// Directory name first, then the slug of the checked-out branch, which is
    /// what a session is called after the rename watcher has run.
    pub async fn resolve_session_name(
        &self,
        worktree: &Path,
        branch_lookup: Option<&dyn BranchLookup>,
    ) -> String {
        let dir_name = session_name_for_dir(worktree);
        if self.has_session(&dir_name).await {
            return dir_name;
        }

        let Some(lookup) = branch_lookup else {
            return dir_name;
        };

        match lookup.current_branch(worktree).await {
            Ok(branch) => {
                let slug = slug_from_branch(&branch);
                if !slug.is_empty() && slug != dir_name && self.has_session(slug).await {
                    return slug.to_string();
                }
            }
            Err(e) => {
                tracing::debug!(
                    "Branch lookup failed for {}, using directory name: {}",
                    worktree.display(),
                    e
                );
            }
        }

        dir_name
    }

    pub async fn create_session_layout(
        &self,
        name: &str,
        start_dir: &Path,
        startup_command: &str,
    ) -> Result<SessionLayout> {
        let dir = path_to_str(start_dir)?;

        self.tmux
            .run(&["new-session", "-d", "-s", name, "-c", dir])
            .await
            .with_context(|| format!("Failed to create tmux session {}", name))?;

        if !startup_command.trim().is_empty() {
            if let Err(e) = self
                .tmux
                .run(&["run-shell", "-c", dir, startup_command])
                .await
            {
                tracing::warn!("Startup command for {} failed: {}", name, e);
            }
        }

        let session_target = format!("{}:", name);
        self.tmux
            .run(&["rename-window", "-t", &session_target, MAIN_WINDOW])
            .await
            .context("Failed to rename main window")?;

        let main = format!("{}:{}", name, MAIN_WINDOW);
        let percent = RIGHT_COLUMN_PERCENT.to_string();
        self.tmux
            .run(&["split-window", "-h", "-t", &main, "-c", dir, "-p", &percent])
            .await
            .context("Failed to split right column")?;
        self.tmux
            .run(&["split-window", "-v", "-t", &main, "-c", dir])
            .await
            .context("Failed to split right column vertically")?;
        let main_ids = self.list_pane_ids(&main).await?;

        self.tmux
            .run(&[
                "new-window",
                "-t",
                &session_target,
                "-n",
                BACKGROUND_WINDOW,
                "-c",
                dir,
            ])
            .await
            .context("Failed to create background window")?;

        let background = format!("{}:{}", name, BACKGROUND_WINDOW);
        for i in 1..BACKGROUND_PANE_COUNT {
            self.tmux
                .run(&["split-window", "-v", "-t", &background, "-c", dir])
                .await
                .with_context(|| format!("Failed to create background pane {}", i))?;
        }
        let background_ids = self.list_pane_ids(&background).await?;

        let layout = build_session_layout(name, &main_ids, &background_ids)?;

        self.tmux
            .run(&["select-window", "-t", &main])
            .await
            .context("Failed to select main window")?;
        if let Some(center) = layout.pane(Area::Center, 1) {
            self.tmux
                .run(&["select-pane", "-t", &center.pane_id])
                .await
                .context("Failed to focus center pane")?;
        }

        tracing::info!("Created session {} in {}", name, dir);
        Ok(layout)
    }

    pub async fn select_worktree_session(
        &self,
        worktree: &Path,
        startup_command: &str,
        branch_lookup: Option<&dyn BranchLookup>,
    ) -> Result<SessionLayout> {
        let name = self.resolve_session_name(worktree, branch_lookup).await;

        if self.has_session(&name).await {
            self.switch_client(&name).await?;
            let layout = SessionLayout::named(name);
            self.tmux
                .run(&["select-window", "-t", &layout.main_target()])
                .await
                .with_context(|| format!("Failed to select main window of {}", layout.name))?;
            return Ok(layout);
        }

        let layout = self
            .create_session_layout(&name, worktree, startup_command)
            .await?;
        self.switch_client(&name).await?;
        Ok(layout)
    }

    /// [`Self::select_worktree_session`], then types `agent_command` into the
    /// centre pane when the session was just created.
    pub async fn open_worktree_session(
        &self,
        worktree: &Path,
        startup_command: &str,
        agent_command: Option<&str>,
        branch_lookup: Option<&dyn BranchLookup>,
    ) -> Result<SessionLayout> {
        let layout = self
            .select_worktree_session(worktree, startup_command, branch_lookup)
            .await?;

        if let (Some(command), Some(center)) = (agent_command, layout.pane(Area::Center, 1)) {
            self.send_keys(&center.pane_id, command).await?;
        }
        Ok(layout)
    }

    pub async fn switch_client(&self, name: &str) -> Result<()> {
        self.tmux
            .run(&["switch-client", "-t", name])
            .await
            .with_context(|| format!("Failed to switch client to {}", name))?;
        Ok(())
    }

    pub async fn current_session(&self) -> Result<String> {
        let out = self
            .tmux
            .run(&["display-message", "-p", "#{session_name}"])
            .await
            .context("Failed to query current session")?;
        let name = out.trim();
        if name.is_empty() {
            bail!("No current tmux session");
        }
        Ok(name.to_string())
    }

    pub async fn list_pane_ids(&self, target: &str) -> Result<Vec<String>> {
        let out = self
            .tmux
            .run(&["list-panes", "-t", target, "-F", "#{pane_id}"])
            .await
            .with_context(|| format!("Failed to list panes of {}", target))?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Re-reads the topology of a live session.
    pub async fn query_layout(&self, name: &str) -> Result<SessionLayout> {
        let main_ids = self
            .list_pane_ids(&format!("{}:{}", name, MAIN_WINDOW))
            .await?;
        let background_ids = self
            .list_pane_ids(&format!("{}:{}", name, BACKGROUND_WINDOW))
            .await?;
        Ok(build_session_layout(name, &main_ids, &background_ids)?)
    }

    pub async fn swap_center(&self) -> Result<()> {
        self.rotate_ring(Ring::Center).await
    }

    pub async fn swap_right_below(&self) -> Result<()> {
        self.rotate_ring(Ring::RightBelow).await
    }

    async fn rotate_ring(&self, ring: Ring) -> Result<()> {
        let session = self.current_session().await?;
        let layout = self.query_layout(&session).await?;
        let occupants = ring
            .occupants(&layout)
            .ok_or_else(|| anyhow::anyhow!("Session {} is missing {:?} panes", session, ring))?;

        for (src, dst) in rotation_swaps(&occupants) {
            self.tmux
                .run(&["swap-pane", "-d", "-s", &src, "-t", &dst])
                .await
                .with_context(|| format!("Failed to swap pane {} with {}", src, dst))?;
        }

        tracing::debug!("Rotated {:?} ring in {}", ring, session);
        Ok(())
    }

    pub async fn send_keys(&self, target: &str, command: &str) -> Result<()> {
        self.tmux
            .run(&["send-keys", "-t", target, command, "Enter"])
            .await
            .with_context(|| format!("Failed to send keys to {}", target))?;
        Ok(())
    }

    pub async fn rename_session(&self, old: &str, new: &str) -> Result<()> {
        self.tmux
            .run(&["rename-session", "-t", &exact(old), new])
            .await
            .with_context(|| format!("Failed to rename session {} to {}", old, new))?;
        Ok(())
    }

    pub async fn kill_session(&self, name: &str) -> Result<()> {
        if !self.has_session(name).await {
            return Ok(());
        }
        self.tmux
            .run(&["kill-session", "-t", &exact(name)])
            .await
            .with_context(|| format!("Failed to kill tmux session {}", name))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::fake::FakeRunner;
    use std::path::PathBuf;

    struct FixedBranch(&'static str);

    #[async_trait]
    impl BranchLookup for FixedBranch {
        async fn current_branch(&self, _worktree: &Path) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct BrokenLookup;

    #[async_trait]
    impl BranchLookup for BrokenLookup {
        async fn current_branch(&self, _worktree: &Path) -> Result<String> {
            bail!("not a git repository")
        }
    }

    fn session_exists(fake: &FakeRunner, name: &str) {
        fake.respond(&["has-session", "-t", &format!("={}", name)], "");
    }

    fn stub_layout_commands(fake: &FakeRunner, name: &str, dir: &str) {
        let main = format!("{}:main-window", name);
        let bg = format!("{}:background-window", name);
        let session_target = format!("{}:", name);
        fake.respond(&["new-session", "-d", "-s", name, "-c", dir], "")
            .respond(&["rename-window", "-t", &session_target, "main-window"], "")
            .respond(&["split-window", "-h", "-t", &main, "-c", dir, "-p", "25"], "")
            .respond(&["split-window", "-v", "-t", &main, "-c", dir], "")
            .respond(
                &["list-panes", "-t", &main, "-F", "#{pane_id}"],
                "%1\n%2\n%3\n",
            )
            .respond(
                &[
                    "new-window",
                    "-t",
                    &session_target,
                    "-n",
                    "background-window",
                    "-c",
                    dir,
                ],
                "",
            )
            .respond(&["split-window", "-v", "-t", &bg, "-c", dir], "")
            .respond(
                &["list-panes", "-t", &bg, "-F", "#{pane_id}"],
                "%4\n%5\n%6\n%7\n",
            )
            .respond(&["select-window", "-t", &main], "")
            .respond(&["select-pane", "-t", "%1"], "");
    }

    #[test]
    fn session_name_for_dir_uses_base_name() {
        assert_eq!(
            session_name_for_dir(Path::new("/src/app/.treedeck/worktrees/south-korea")),
            "south-korea"
        );
        assert_eq!(
            session_name_for_dir(Path::new("/src/v1.2:hotfix")),
            "v1_2_hotfix",
            "session_name_for_dir: tmux-reserved characters are replaced"
        );
    }

    #[tokio::test]
    async fn has_session_treats_failure_as_absent() {
        let fake = FakeRunner::new();
        fake.fail(&["has-session", "-t", "=ghost"], "can't find session: ghost");
        session_exists(&fake, "live");
        let manager = SessionManager::with_runner(fake);

        assert!(!manager.has_session("ghost").await);
        assert!(manager.has_session("live").await);
    }

    #[tokio::test]
    async fn resolve_prefers_directory_name() {
        let fake = FakeRunner::new();
        session_exists(&fake, "south-korea");
        session_exists(&fake, "fix-login");
        let manager = SessionManager::with_runner(fake);

        let name = manager
            .resolve_session_name(
                Path::new("/wt/south-korea"),
                Some(&FixedBranch("shoji/fix-login")),
            )
            .await;
        assert_eq!(name, "south-korea");
    }

    #[tokio::test]
    async fn resolve_falls_back_to_branch_slug() {
        let fake = FakeRunner::new();
        session_exists(&fake, "fix-login");
        let manager = SessionManager::with_runner(fake);

        let name = manager
            .resolve_session_name(
                Path::new("/wt/south-korea"),
                Some(&FixedBranch("shoji/fix-login")),
            )
            .await;
        assert_eq!(
            name, "fix-login",
            "resolve_session_name: renamed session should be found by branch slug"
        );
    }

    #[tokio::test]
    async fn resolve_returns_directory_name_when_nothing_exists() {
        let manager = SessionManager::with_runner(FakeRunner::new());

        let with_lookup = manager
            .resolve_session_name(
                Path::new("/wt/south-korea"),
                Some(&FixedBranch("shoji/fix-login")),
            )
            .await;
        let without_lookup = manager
            .resolve_session_name(Path::new("/wt/south-korea"), None)
            .await;
        let broken_lookup = manager
            .resolve_session_name(Path::new("/wt/south-korea"), Some(&BrokenLookup))
            .await;

        assert_eq!(with_lookup, "south-korea");
        assert_eq!(without_lookup, "south-korea");
        assert_eq!(broken_lookup, "south-korea");
    }

    #[tokio::test]
    async fn create_session_layout_builds_seven_panes() {
        let fake = FakeRunner::new();
        stub_layout_commands(&fake, "demo", "/wt/demo");
        let manager = SessionManager::with_runner(fake.clone());

        let layout = manager
            .create_session_layout("demo", Path::new("/wt/demo"), "")
            .await
            .unwrap();

        assert!(layout.is_complete());
        assert_eq!(layout.pane(Area::Center, 1).unwrap().pane_id, "%1");
        assert_eq!(layout.pane(Area::BottomRight, 1).unwrap().pane_id, "%3");
        assert_eq!(layout.pane(Area::Center, 2).unwrap().pane_id, "%4");
        assert_eq!(
            fake.calls_starting_with("split-window").len(),
            5,
            "create_session_layout: 2 main splits + 3 background splits"
        );
        assert!(
            fake.calls_starting_with("run-shell").is_empty(),
            "create_session_layout: empty startup command must not run"
        );
    }

    #[tokio::test]
    async fn create_session_layout_tolerates_startup_failure() {
        let fake = FakeRunner::new();
        stub_layout_commands(&fake, "demo", "/wt/demo");
        fake.fail(&["run-shell", "-c", "/wt/demo", "make setup"], "exit 2");
        let manager = SessionManager::with_runner(fake.clone());

        let layout = manager
            .create_session_layout("demo", Path::new("/wt/demo"), "make setup")
            .await;

        assert!(
            layout.is_ok(),
            "create_session_layout: startup command failure is non-fatal"
        );
        assert!(fake.called(&["run-shell", "-c", "/wt/demo", "make setup"]));
    }

    #[tokio::test]
    async fn create_session_layout_aborts_on_step_failure() {
        let fake = FakeRunner::new();
        stub_layout_commands(&fake, "demo", "/wt/demo");
        fake.fail(
            &["new-window", "-t", "demo:", "-n", "background-window", "-c", "/wt/demo"],
            "server exited",
        );
        let manager = SessionManager::with_runner(fake.clone());

        let err = manager
            .create_session_layout("demo", Path::new("/wt/demo"), "")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("background window"));
        assert!(
            !fake.called(&["kill-session", "-t", "=demo"]),
            "create_session_layout: partial sessions are not cleaned up"
        );
    }

    #[tokio::test]
    async fn create_session_layout_rejects_wrong_pane_count() {
        let fake = FakeRunner::new();
        stub_layout_commands(&fake, "demo", "/wt/demo");
        fake.respond(
            &["list-panes", "-t", "demo:main-window", "-F", "#{pane_id}"],
            "%1\n%2\n",
        );
        let manager = SessionManager::with_runner(fake);

        let result = manager
            .create_session_layout("demo", Path::new("/wt/demo"), "")
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn select_existing_session_switches_without_requery() {
        let fake = FakeRunner::new();
        session_exists(&fake, "south-korea");
        fake.respond(&["switch-client", "-t", "south-korea"], "")
            .respond(&["select-window", "-t", "south-korea:main-window"], "");
        let manager = SessionManager::with_runner(fake.clone());

        let layout = manager
            .select_worktree_session(Path::new("/wt/south-korea"), "", None)
            .await
            .unwrap();

        assert_eq!(layout, SessionLayout::named("south-korea"));
        assert!(fake.calls_starting_with("list-panes").is_empty());
        assert!(fake.calls_starting_with("new-session").is_empty());
    }

    #[tokio::test]
    async fn select_missing_session_creates_and_switches() {
        let fake = FakeRunner::new();
        stub_layout_commands(&fake, "demo", "/wt/demo");
        fake.respond(&["switch-client", "-t", "demo"], "");
        let manager = SessionManager::with_runner(fake.clone());

        let layout = manager
            .select_worktree_session(&PathBuf::from("/wt/demo"), "", None)
            .await
            .unwrap();

        assert!(layout.is_complete());
        assert!(fake.called(&["switch-client", "-t", "demo"]));
    }

    #[tokio::test]
    async fn open_worktree_session_starts_agent_in_new_session() {
        let fake = FakeRunner::new();
        stub_layout_commands(&fake, "demo", "/wt/demo");
        fake.respond(&["switch-client", "-t", "demo"], "")
            .respond(&["send-keys", "-t", "%1", "claude", "Enter"], "");
        let manager = SessionManager::with_runner(fake.clone());

        manager
            .open_worktree_session(Path::new("/wt/demo"), "", Some("claude"), None)
            .await
            .unwrap();

        assert!(fake.called(&["send-keys", "-t", "%1", "claude", "Enter"]));
    }

    #[tokio::test]
    async fn open_worktree_session_leaves_existing_session_alone() {
        let fake = FakeRunner::new();
        session_exists(&fake, "demo");
        fake.respond(&["switch-client", "-t", "demo"], "")
            .respond(&["select-window", "-t", "demo:main-window"], "");
        let manager = SessionManager::with_runner(fake.clone());

        manager
            .open_worktree_session(Path::new("/wt/demo"), "", Some("claude"), None)
            .await
            .unwrap();

        assert!(
            fake.calls_starting_with("send-keys").is_empty(),
            "open_worktree_session: agent command only goes to fresh sessions"
        );
    }

    fn stub_live_session(fake: &FakeRunner) {
        fake.respond(&["display-message", "-p", "#{session_name}"], "demo\n")
            .respond(
                &["list-panes", "-t", "demo:main-window", "-F", "#{pane_id}"],
                "%1\n%2\n%3\n",
            )
            .respond(
                &["list-panes", "-t", "demo:background-window", "-F", "#{pane_id}"],
                "%4\n%5\n%6\n%7\n",
            );
    }

    #[tokio::test]
    async fn swap_center_rotates_center_ring() {
        let fake = FakeRunner::new();
        stub_live_session(&fake);
        fake.respond(&["swap-pane", "-d", "-s", "%1", "-t", "%4"], "")
            .respond(&["swap-pane", "-d", "-s", "%1", "-t", "%5"], "");
        let manager = SessionManager::with_runner(fake.clone());

        manager.swap_center().await.unwrap();

        let swaps = fake.calls_starting_with("swap-pane");
        assert_eq!(swaps.len(), 2);
        assert_eq!(swaps[0], vec!["swap-pane", "-d", "-s", "%1", "-t", "%4"]);
        assert_eq!(swaps[1], vec!["swap-pane", "-d", "-s", "%1", "-t", "%5"]);
    }

    #[tokio::test]
    async fn swap_right_below_rotates_bottom_ring() {
        let fake = FakeRunner::new();
        stub_live_session(&fake);
        fake.respond(&["swap-pane", "-d", "-s", "%3", "-t", "%6"], "")
            .respond(&["swap-pane", "-d", "-s", "%3", "-t", "%7"], "");
        let manager = SessionManager::with_runner(fake.clone());

        manager.swap_right_below().await.unwrap();

        assert!(fake.called(&["swap-pane", "-d", "-s", "%3", "-t", "%6"]));
        assert!(fake.called(&["swap-pane", "-d", "-s", "%3", "-t", "%7"]));
    }

    #[tokio::test]
    async fn swap_stops_after_first_failure() {
        let fake = FakeRunner::new();
        stub_live_session(&fake);
        fake.fail(&["swap-pane", "-d", "-s", "%1", "-t", "%4"], "no such pane");
        let manager = SessionManager::with_runner(fake.clone());

        assert!(manager.swap_center().await.is_err());
        assert_eq!(fake.calls_starting_with("swap-pane").len(), 1);
    }

    #[tokio::test]
    async fn kill_session_is_idempotent() {
        let fake = FakeRunner::new();
        let manager = SessionManager::with_runner(fake.clone());

        manager.kill_session("ghost").await.unwrap();
        assert!(fake.calls_starting_with("kill-session").is_empty());

        session_exists(&fake, "demo");
        fake.respond(&["kill-session", "-t", "=demo"], "");
        manager.kill_session("demo").await.unwrap();
        assert!(fake.called(&["kill-session", "-t", "=demo"]));
    }

    #[tokio::test]
    async fn rename_session_propagates_failure() {
        let fake = FakeRunner::new();
        fake.fail(&["rename-session", "-t", "=old", "new"], "duplicate session");
        let manager = SessionManager::with_runner(fake);

        assert!(manager.rename_session("old", "new").await.is_err());
    }
}

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::generator::{CliNameGenerator, NameGenerator};
use super::history::{find_first_prompt, HistoryFile, PromptEntry, PromptHistory};
use super::slug::{renamed_branch, sanitize_slug};
use crate::runner::{GitCommand, GitRunner, TmuxCommand, TmuxRunner};
use crate::session::{rename_branch, HeadBranch, SessionManager};
use crate::utils::format_duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenameStatus {
    Pending,
    Detected,
    Completed,
    Failed,
    Skipped,
}

impl RenameStatus {
    pub fn can_transition_to(self, next: RenameStatus) -> bool {
        matches!(
            (self, next),
            (RenameStatus::Pending, RenameStatus::Detected)
                | (RenameStatus::Pending, RenameStatus::Skipped)
                | (RenameStatus::Detected, RenameStatus::Completed)
                | (RenameStatus::Detected, RenameStatus::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RenameStatus::Completed | RenameStatus::Failed | RenameStatus::Skipped
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RenameStatus::Pending => "pending",
            RenameStatus::Detected => "detected",
            RenameStatus::Completed => "renamed",
            RenameStatus::Failed => "failed",
            RenameStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Error)]
pub enum RenameError {
    #[error("timed out after {} waiting for a first prompt in {}", format_duration(*.timeout), .worktree.display())]
    Timeout { worktree: PathBuf, timeout: Duration },

    #[error("generating branch name: {message}")]
    Generate { message: String },

    #[error("generated name {raw:?} has no usable characters")]
    EmptyName { raw: String },

    #[error("renaming branch {old} to {new}: {message}")]
    RenameBranch {
        old: String,
        new: String,
        message: String,
    },

    #[error("invalid rename status transition {from:?} -> {to:?}")]
    InvalidTransition { from: RenameStatus, to: RenameStatus },
}

impl RenameError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RenameError::Timeout { .. })
    }
}

/// Parameters of one watch. Fixed for the watcher's lifetime.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub worktree_path: PathBuf,
    pub original_branch: String,
    pub session_name: Option<String>,
    /// Prompts at or before this instant are ignored.
    pub created_at: DateTime<Utc>,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl WatcherConfig {
    pub fn new(worktree_path: PathBuf, original_branch: impl Into<String>) -> Self {
        Self {
            worktree_path,
            original_branch: original_branch.into(),
            session_name: None,
            created_at: Utc::now(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_session_name(mut self, name: impl Into<String>) -> Self {
        self.session_name = Some(name.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_timing(mut self, poll_interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchRenameInfo {
    pub status: RenameStatus,
    pub original_branch: String,
    pub new_branch: Option<String>,
    pub worktree_path: PathBuf,
    pub first_prompt: Option<String>,
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BranchRenameInfo {
    pub fn new(config: &WatcherConfig) -> Self {
        Self {
            status: RenameStatus::Pending,
            original_branch: config.original_branch.clone(),
            new_branch: None,
            worktree_path: config.worktree_path.clone(),
            first_prompt: None,
            session_id: None,
            created_at: config.created_at,
        }
    }

    pub fn transition(&mut self, next: RenameStatus) -> Result<(), RenameError> {
        if !self.status.can_transition_to(next) {
            return Err(RenameError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

/// Outcome of a finished watch. `error` is set for every status other than
/// `Completed`.
#[derive(Debug)]
pub struct WatchReport {
    pub info: BranchRenameInfo,
    pub error: Option<RenameError>,
}

impl WatchReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.info.status == RenameStatus::Completed
    }
}

/// Waits for the first meaningful prompt typed in a fresh worktree, then
/// renames its branch (and, best effort, its tmux session) after it.
pub struct BranchRenameWatcher<
    G: GitRunner = GitCommand,
    H: PromptHistory = HistoryFile,
    N: NameGenerator = CliNameGenerator,
    T: TmuxRunner = TmuxCommand,
> {
    config: WatcherConfig,
    git: G,
    history: H,
    generator: N,
    sessions: Option<SessionManager<T>>,
    info: BranchRenameInfo,
}

impl<G, H, N> BranchRenameWatcher<G, H, N, TmuxCommand>
where
    G: GitRunner + Clone,
    H: PromptHistory,
    N: NameGenerator,
{
    pub fn new(config: WatcherConfig, git: G, history: H, generator: N) -> Self {
        let info = BranchRenameInfo::new(&config);
        Self {
            config,
            git,
            history,
            generator,
            sessions: None,
            info,
        }
    }
}

impl<G, H, N, T> BranchRenameWatcher<G, H, N, T>
where
    G: GitRunner + Clone,
    H: PromptHistory,
    N: NameGenerator,
    T: TmuxRunner,
{
    pub fn with_sessions<U: TmuxRunner>(
        self,
        sessions: SessionManager<U>,
    ) -> BranchRenameWatcher<G, H, N, U> {
        BranchRenameWatcher {
            config: self.config,
            git: self.git,
            history: self.history,
            generator: self.generator,
            sessions: Some(sessions),
            info: self.info,
        }
    }

    pub async fn run(mut self) -> WatchReport {
        let error = self.watch().await.err();
        match &error {
            None => tracing::info!(
                "Renamed {} to {}",
                self.info.original_branch,
                self.info.new_branch.as_deref().unwrap_or_default()
            ),
            Some(e) if e.is_timeout() => tracing::info!("Rename watch skipped: {}", e),
            Some(e) => tracing::warn!("Rename watch failed: {}", e),
        }
        WatchReport {
            info: self.info,
            error,
        }
    }

    async fn watch(&mut self) -> Result<(), RenameError> {
        let Some(entry) = self.wait_for_prompt().await else {
            self.info.transition(RenameStatus::Skipped)?;
            return Err(RenameError::Timeout {
                worktree: self.config.worktree_path.clone(),
                timeout: self.config.timeout,
            });
        };

        tracing::debug!(
            "First prompt in {}: {}",
            self.config.worktree_path.display(),
            entry.display
        );
        self.info.first_prompt = Some(entry.display.trim().to_string());
        self.info.session_id = entry.session_id;
        self.info.transition(RenameStatus::Detected)?;

        match self.rename(&entry.display).await {
            Ok(()) => self.info.transition(RenameStatus::Completed),
            Err(e) => {
                self.info.transition(RenameStatus::Failed)?;
                Err(e)
            }
        }
    }

    /// Polls the history until the deadline. The deadline is only checked
    /// between polls.
    async fn wait_for_prompt(&self) -> Option<PromptEntry> {
        let deadline = Instant::now() + self.config.timeout;
        while Instant::now() < deadline {
            match self.history.entries().await {
                Ok(entries) => {
                    if let Some(entry) = find_first_prompt(
                        &entries,
                        &self.config.worktree_path,
                        self.config.created_at,
                    ) {
                        return Some(entry);
                    }
                }
                Err(e) => tracing::debug!("Prompt history unavailable: {:#}", e),
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
        None
    }

    async fn rename(&mut self, prompt: &str) -> Result<(), RenameError> {
        let raw = self
            .generator
            .generate_branch_name(prompt)
            .await
            .map_err(|e| RenameError::Generate {
                message: format!("{:#}", e),
            })?;

        let slug = sanitize_slug(&raw);
        if slug.is_empty() {
            return Err(RenameError::EmptyName { raw });
        }

        let old = self.config.original_branch.clone();
        let new = renamed_branch(&old, &slug);
        rename_branch(&self.git, &self.config.worktree_path, &old, &new)
            .await
            .map_err(|e| RenameError::RenameBranch {
                old: old.clone(),
                new: new.clone(),
                message: format!("{:#}", e),
            })?;
        self.info.new_branch = Some(new);

        self.rename_session(&slug).await;
        Ok(())
    }

    async fn rename_session(&self, slug: &str) {
        let Some(sessions) = &self.sessions else {
            return;
        };
        if self.config.session_name.is_none() {
            return;
        }

        let lookup = HeadBranch::new(self.git.clone());
        let current = sessions
            .resolve_session_name(&self.config.worktree_path, Some(&lookup))
            .await;
        if current == slug {
            return;
        }

        if let Err(e) = sessions.rename_session(&current, slug).await {
            tracing::warn!("Branch renamed but session rename failed: {:#}", e);
        }
    }
}

impl<G, H, N, T> BranchRenameWatcher<G, H, N, T>
where
    G: GitRunner + Clone + 'static,
    H: PromptHistory + 'static,
    N: NameGenerator + 'static,
    T: TmuxRunner + 'static,
{
    /// Runs the watch on its own task and posts the report to `tx`.
    pub fn spawn<E>(self, tx: mpsc::UnboundedSender<E>) -> JoinHandle<()>
    where
        E: From<WatchReport> + Send + 'static,
    {
        tokio::spawn(async move {
            let report = self.run().await;
            if tx.send(E::from(report)).is_err() {
                tracing::debug!("Rename report dropped: receiver closed");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::fake::FakeRunner;
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::path::Path;

    const WT: &str = "/repo/.treedeck/worktrees/south-korea";

    struct StaticHistory(Vec<PromptEntry>);

    #[async_trait]
    impl PromptHistory for StaticHistory {
        async fn entries(&self) -> Result<Vec<PromptEntry>> {
            Ok(self.0.clone())
        }
    }

    struct BrokenHistory;

    #[async_trait]
    impl PromptHistory for BrokenHistory {
        async fn entries(&self) -> Result<Vec<PromptEntry>> {
            anyhow::bail!("history.jsonl: permission denied")
        }
    }

    struct FixedName(&'static str);

    #[async_trait]
    impl NameGenerator for FixedName {
        async fn generate_branch_name(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct BrokenGenerator;

    #[async_trait]
    impl NameGenerator for BrokenGenerator {
        async fn generate_branch_name(&self, _prompt: &str) -> Result<String> {
            anyhow::bail!("rate limited")
        }
    }

    fn created_at() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_000).unwrap()
    }

    fn config(branch: &str) -> WatcherConfig {
        WatcherConfig::new(PathBuf::from(WT), branch)
            .with_created_at(created_at())
            .with_timing(Duration::from_millis(5), Duration::from_millis(200))
    }

    fn prompt(display: &str) -> StaticHistory {
        StaticHistory(vec![PromptEntry {
            display: display.to_string(),
            project: WT.to_string(),
            session_id: Some("sess-42".to_string()),
            timestamp: 2_000,
        }])
    }

    #[test]
    fn status_transitions() {
        use RenameStatus::*;
        assert!(Pending.can_transition_to(Detected));
        assert!(Pending.can_transition_to(Skipped));
        assert!(Detected.can_transition_to(Completed));
        assert!(Detected.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Detected.can_transition_to(Pending));
        assert!(!Skipped.can_transition_to(Detected));
        assert!(!Completed.can_transition_to(Failed));
    }

    #[test]
    fn info_rejects_invalid_transition() {
        let mut info = BranchRenameInfo::new(&config("shoji/south-korea"));
        let err = info.transition(RenameStatus::Completed).unwrap_err();
        assert!(matches!(
            err,
            RenameError::InvalidTransition {
                from: RenameStatus::Pending,
                to: RenameStatus::Completed
            }
        ));
        assert_eq!(
            info.status,
            RenameStatus::Pending,
            "transition: rejected transition leaves status unchanged"
        );
    }

    #[tokio::test]
    async fn run_renames_branch_with_namespace() {
        let git = FakeRunner::new();
        git.respond(
            &["branch", "-m", "shoji/south-korea", "shoji/fix-login-redirect"],
            "",
        );
        let watcher = BranchRenameWatcher::new(
            config("shoji/south-korea"),
            git.clone(),
            prompt("the login page redirects to a 404"),
            FixedName("Fix Login Redirect!!"),
        );

        let report = watcher.run().await;

        assert!(report.succeeded(), "run: {:?}", report.error);
        assert_eq!(report.info.status, RenameStatus::Completed);
        assert_eq!(
            report.info.new_branch.as_deref(),
            Some("shoji/fix-login-redirect")
        );
        assert_eq!(
            report.info.first_prompt.as_deref(),
            Some("the login page redirects to a 404")
        );
        assert_eq!(report.info.session_id.as_deref(), Some("sess-42"));
    }

    #[tokio::test]
    async fn run_uses_bare_slug_without_namespace() {
        let git = FakeRunner::new();
        git.respond(&["branch", "-m", "south-korea", "add-dark-mode"], "");
        let watcher = BranchRenameWatcher::new(
            config("south-korea"),
            git,
            prompt("please add a dark mode toggle"),
            FixedName("add dark mode"),
        );

        let report = watcher.run().await;
        assert_eq!(report.info.new_branch.as_deref(), Some("add-dark-mode"));
    }

    #[tokio::test]
    async fn run_aborts_on_empty_name() {
        let git = FakeRunner::new();
        let watcher = BranchRenameWatcher::new(
            config("shoji/south-korea"),
            git.clone(),
            prompt("make the tests pass"),
            FixedName("!!! ???"),
        );

        let report = watcher.run().await;

        assert_eq!(report.info.status, RenameStatus::Failed);
        assert!(matches!(report.error, Some(RenameError::EmptyName { .. })));
        assert!(
            git.calls_starting_with("branch").is_empty(),
            "run: empty name must never reach git"
        );
    }

    #[tokio::test]
    async fn run_reports_generator_failure() {
        let watcher = BranchRenameWatcher::new(
            config("shoji/south-korea"),
            FakeRunner::new(),
            prompt("make the tests pass"),
            BrokenGenerator,
        );

        let report = watcher.run().await;

        assert_eq!(report.info.status, RenameStatus::Failed);
        let err = report.error.unwrap();
        assert!(matches!(err, RenameError::Generate { .. }));
        assert!(err.to_string().contains("rate limited"));
        assert!(!err.is_timeout());
    }

    #[tokio::test]
    async fn run_reports_branch_rename_failure() {
        let git = FakeRunner::new();
        git.fail(
            &["branch", "-m", "shoji/south-korea", "shoji/fix-login"],
            "fatal: a branch named 'shoji/fix-login' already exists",
        );
        let watcher = BranchRenameWatcher::new(
            config("shoji/south-korea"),
            git,
            prompt("fix the login flow"),
            FixedName("fix login"),
        );

        let report = watcher.run().await;

        assert_eq!(report.info.status, RenameStatus::Failed);
        assert!(report.info.new_branch.is_none());
        let err = report.error.unwrap();
        assert!(matches!(err, RenameError::RenameBranch { .. }));
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn run_renames_session_best_effort() {
        let git = FakeRunner::new();
        git.respond(&["branch", "-m", "shoji/south-korea", "shoji/fix-login"], "")
            .respond(&["symbolic-ref", "--short", "HEAD"], "shoji/fix-login\n");
        let tmux = FakeRunner::new();
        tmux.respond(&["has-session", "-t", "=south-korea"], "")
            .respond(&["rename-session", "-t", "=south-korea", "fix-login"], "");

        let watcher = BranchRenameWatcher::new(
            config("shoji/south-korea").with_session_name("south-korea"),
            git,
            prompt("fix the login flow"),
            FixedName("fix login"),
        )
        .with_sessions(SessionManager::with_runner(tmux.clone()));

        let report = watcher.run().await;

        assert!(report.succeeded());
        assert!(tmux.called(&["rename-session", "-t", "=south-korea", "fix-login"]));
    }

    #[tokio::test]
    async fn run_ignores_session_rename_failure() {
        let git = FakeRunner::new();
        git.respond(&["branch", "-m", "shoji/south-korea", "shoji/fix-login"], "")
            .respond(&["symbolic-ref", "--short", "HEAD"], "shoji/fix-login\n");
        let tmux = FakeRunner::new();
        tmux.respond(&["has-session", "-t", "=south-korea"], "").fail(
            &["rename-session", "-t", "=south-korea", "fix-login"],
            "no server running",
        );

        let watcher = BranchRenameWatcher::new(
            config("shoji/south-korea").with_session_name("south-korea"),
            git,
            prompt("fix the login flow"),
            FixedName("fix login"),
        )
        .with_sessions(SessionManager::with_runner(tmux));

        let report = watcher.run().await;
        assert!(
            report.succeeded(),
            "run: session rename failure must not fail the watch"
        );
    }

    #[tokio::test]
    async fn run_skips_session_rename_when_already_named() {
        let git = FakeRunner::new();
        git.respond(&["branch", "-m", "shoji/south-korea", "shoji/fix-login"], "")
            .respond(&["symbolic-ref", "--short", "HEAD"], "shoji/fix-login\n");
        let tmux = FakeRunner::new();
        tmux.respond(&["has-session", "-t", "=fix-login"], "");

        let watcher = BranchRenameWatcher::new(
            config("shoji/south-korea").with_session_name("fix-login"),
            git,
            prompt("fix the login flow"),
            FixedName("fix login"),
        )
        .with_sessions(SessionManager::with_runner(tmux.clone()));

        assert!(watcher.run().await.succeeded());
        assert!(tmux.calls_starting_with("rename-session").is_empty());
    }

    #[tokio::test]
    async fn run_times_out_with_failing_history() {
        let poll = Duration::from_millis(20);
        let timeout = Duration::from_millis(60);
        let watcher = BranchRenameWatcher::new(
            config("shoji/south-korea").with_timing(poll, timeout),
            FakeRunner::new(),
            BrokenHistory,
            FixedName("unused"),
        );

        let started = std::time::Instant::now();
        let report = watcher.run().await;
        let elapsed = started.elapsed();

        assert_eq!(report.info.status, RenameStatus::Skipped);
        assert!(report.error.as_ref().is_some_and(RenameError::is_timeout));
        assert!(elapsed >= timeout, "run: returned after {:?}", elapsed);
        assert!(
            elapsed < timeout + poll + Duration::from_millis(500),
            "run: overran deadline by {:?}",
            elapsed - timeout
        );
    }

    #[tokio::test]
    async fn run_times_out_when_prompt_is_elsewhere() {
        let history = StaticHistory(vec![PromptEntry {
            display: "work in a different worktree".to_string(),
            project: "/repo".to_string(),
            session_id: None,
            timestamp: 5_000,
        }]);
        let watcher = BranchRenameWatcher::new(
            config("shoji/south-korea")
                .with_timing(Duration::from_millis(5), Duration::from_millis(20)),
            FakeRunner::new(),
            history,
            FixedName("unused"),
        );

        let report = watcher.run().await;
        assert_eq!(report.info.status, RenameStatus::Skipped);
        assert!(report.info.first_prompt.is_none());
        assert_eq!(report.info.worktree_path, Path::new(WT));
    }

    #[tokio::test]
    async fn spawn_posts_report() {
        let git = FakeRunner::new();
        git.respond(&["branch", "-m", "south-korea", "fix-login"], "");
        let watcher = BranchRenameWatcher::new(
            config("south-korea"),
            git,
            prompt("fix the login flow"),
            FixedName("fix login"),
        );

        let (tx, mut rx) = mpsc::unbounded_channel::<WatchReport>();
        watcher.spawn(tx).await.unwrap();

        let report = rx.recv().await.unwrap();
        assert_eq!(report.info.status, RenameStatus::Completed);
    }
}

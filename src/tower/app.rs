use anyhow::Result;
use chrono::{DateTime, Utc};
use crossterm::event::{self as term, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::collections::{HashMap, HashSet};
use std::io::Stdout;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use super::event::{Event, SessionStatus};
use super::ui::UI;
use super::widgets::{BranchInput, WorktreeEntry, WorktreeList};
use crate::agent::{AgentState, AgentStateDetector};
use crate::config::Config;
#[cfg(test)]
use crate::rename::RenameStatus;
use crate::rename::{
    BranchRenameInfo, BranchRenameWatcher, CliNameGenerator, HistoryFile, WatchReport,
    WatcherConfig,
};
use crate::runner::{GitCommand, GitRunner, TmuxCommand, TmuxRunner};
use crate::session::{session_name_for_dir, SessionManager, Worktree, WorktreeManager};

const TICK_INTERVAL: Duration = Duration::from_millis(250);
const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Busy key for swaps, which act on whatever session the client shows.
const CURRENT_SESSION: &str = "(current)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapTarget {
    Center,
    RightBelow,
}

/// Interactive worktree overview. Only [`Dashboard::handle_event`] mutates the
/// status cache and the rename table; all tmux and git work happens on spawned
/// tasks that report back through the event channel.
pub struct Dashboard<G: GitRunner = GitCommand, T: TmuxRunner = TmuxCommand> {
    config: Config,
    worktrees: WorktreeManager<G>,
    sessions: SessionManager<T>,
    detector: AgentStateDetector<T>,

    tx: mpsc::UnboundedSender<Event>,
    rx: mpsc::UnboundedReceiver<Event>,

    known: Vec<Worktree>,
    statuses: HashMap<PathBuf, SessionStatus>,
    renames: HashMap<PathBuf, BranchRenameInfo>,
    busy: HashSet<String>,
    listing: bool,
    detecting: bool,
    last_poll: Option<Instant>,
    pending_select: Option<PathBuf>,

    list: WorktreeList,
    input: BranchInput,
    running: bool,
    message: Option<String>,
}

impl Dashboard {
    pub fn new(config: Config, worktrees: WorktreeManager) -> Self {
        Self::with_runners(config, worktrees, TmuxCommand::new())
    }
}

impl<G, T> Dashboard<G, T>
where
    G: GitRunner + Clone + 'static,
    T: TmuxRunner + Clone + 'static,
{
    pub fn with_runners(config: Config, worktrees: WorktreeManager<G>, tmux: T) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let root = worktrees.git_root().to_path_buf();
        Self {
            config,
            worktrees,
            sessions: SessionManager::with_runner(tmux.clone()),
            detector: AgentStateDetector::with_runner(tmux),
            tx,
            rx,
            known: Vec::new(),
            statuses: HashMap::new(),
            renames: HashMap::new(),
            busy: HashSet::new(),
            listing: false,
            detecting: false,
            last_poll: None,
            pending_select: None,
            list: WorktreeList::new(root),
            input: BranchInput::new(),
            running: true,
            message: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn quit(&mut self) {
        self.running = false;
    }

    pub fn set_message(&mut self, msg: String) {
        self.message = Some(msg);
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn git_root(&self) -> &Path {
        self.worktrees.git_root()
    }

    pub fn list(&mut self) -> &mut WorktreeList {
        &mut self.list
    }

    pub fn input(&self) -> &BranchInput {
        &self.input
    }

    #[cfg(test)]
    pub fn rename_status(&self, worktree: &Path) -> Option<RenameStatus> {
        self.renames.get(worktree).map(|info| info.status)
    }

    #[cfg(test)]
    pub fn is_busy(&self, key: &str) -> bool {
        self.busy.contains(key)
    }

    pub async fn next_event(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(key) => self.handle_key(key),
            Event::Tick => self.on_tick(),
            Event::WorktreesListed(result) => self.on_worktrees_listed(result),
            Event::AgentsDetected(statuses) => self.on_agents_detected(statuses),
            Event::WorktreeCreated {
                branch,
                created_at,
                result,
            } => self.on_worktree_created(branch, created_at, result),
            Event::RenameFinished(report) => self.on_rename_finished(report),
            Event::CommandFinished { key, result } => self.on_command_finished(key, result),
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.quit();
            return;
        }

        if self.input.is_active() {
            self.handle_input_keys(key.code);
            return;
        }

        match key.code {
            KeyCode::Char('q') => self.quit(),
            KeyCode::Down | KeyCode::Char('j') => self.list.next(),
            KeyCode::Up | KeyCode::Char('k') => self.list.prev(),
            KeyCode::Enter => self.open_selected(),
            KeyCode::Char('c') => self.swap(SwapTarget::Center),
            KeyCode::Char('r') => self.swap(SwapTarget::RightBelow),
            KeyCode::Char('n') => self.input.open(),
            KeyCode::Char('x') => self.kill_selected(),
            _ => {}
        }
    }

    fn handle_input_keys(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => self.input.close(),
            KeyCode::Enter => {
                if let Some(branch) = self.input.submit() {
                    self.create_worktree(branch);
                }
            }
            KeyCode::Backspace => self.input.delete_char(),
            KeyCode::Left => self.input.move_cursor_left(),
            KeyCode::Right => self.input.move_cursor_right(),
            KeyCode::Char(c) => self.input.insert_char(c),
            _ => {}
        }
    }

    fn on_tick(&mut self) {
        let due = self
            .last_poll
            .map_or(true, |t| t.elapsed() >= self.config.status_poll_interval);
        if due {
            self.request_refresh();
        }
    }

    /// Re-lists worktrees; the agent scan follows once the listing arrives.
    pub fn request_refresh(&mut self) {
        if self.listing {
            return;
        }
        self.listing = true;
        self.last_poll = Some(Instant::now());

        let worktrees = self.worktrees.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = worktrees
                .list_worktrees()
                .await
                .map_err(|e| format!("{:#}", e));
            let _ = tx.send(Event::WorktreesListed(result));
        });
    }

    fn on_worktrees_listed(&mut self, result: Result<Vec<Worktree>, String>) {
        self.listing = false;
        match result {
            Ok(worktrees) => {
                self.statuses
                    .retain(|path, _| worktrees.iter().any(|w| &w.path == path));
                self.known = worktrees;
                self.rebuild_entries();
                if let Some(path) = self.pending_select.take() {
                    self.list.select_path(&path);
                }
                self.spawn_detect();
            }
            Err(e) => {
                tracing::warn!("Listing worktrees failed: {}", e);
                self.set_message(format!("Error: {}", e));
            }
        }
    }

    fn spawn_detect(&mut self) {
        if self.detecting {
            return;
        }
        self.detecting = true;

        let paths: Vec<PathBuf> = self.known.iter().map(|w| w.path.clone()).collect();
        let sessions = self.sessions.clone();
        let detector = self.detector.clone();
        let worktrees = self.worktrees.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let statuses = scan_sessions(&sessions, &detector, &worktrees, paths).await;
            let _ = tx.send(Event::AgentsDetected(statuses));
        });
    }

    fn on_agents_detected(&mut self, statuses: Vec<SessionStatus>) {
        self.detecting = false;
        self.statuses = statuses
            .into_iter()
            .map(|s| (s.worktree.clone(), s))
            .collect();
        self.rebuild_entries();
    }

    fn session_key(&self, worktree: &Path) -> String {
        self.statuses
            .get(worktree)
            .and_then(|s| s.session.clone())
            .unwrap_or_else(|| session_name_for_dir(worktree))
    }

    fn rebuild_entries(&mut self) {
        let entries = self
            .known
            .iter()
            .map(|w| {
                let status = self.statuses.get(&w.path);
                let agents = status.map(|s| s.agents.as_slice()).unwrap_or_default();
                let elapsed = agents
                    .iter()
                    .filter(|a| a.state == AgentState::Running)
                    .max_by_key(|a| a.elapsed_duration())
                    .and_then(|a| a.elapsed.clone());
                WorktreeEntry {
                    path: w.path.clone(),
                    branch: w.branch.clone(),
                    session: status.and_then(|s| s.session.clone()),
                    state: AgentState::highest(agents.iter().map(|a| a.state)),
                    elapsed,
                    rename: self.renames.get(&w.path).map(|info| info.status),
                    busy: self.busy.contains(&self.session_key(&w.path)),
                }
            })
            .collect();
        self.list.set_entries(entries);
    }

    /// Marks a session busy. Layout commands never overlap on one session.
    fn try_begin(&mut self, key: &str) -> bool {
        if !self.busy.insert(key.to_string()) {
            self.set_message(format!("{} is busy", key));
            return false;
        }
        self.rebuild_entries();
        true
    }

    fn spawn_command<F>(&self, key: String, command: F)
    where
        F: std::future::Future<Output = anyhow::Result<String>> + Send + 'static,
    {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = command.await.map_err(|e| format!("{:#}", e));
            let _ = tx.send(Event::CommandFinished { key, result });
        });
    }

    fn open_selected(&mut self) {
        let Some(path) = self.list.selected().map(|e| e.path.clone()) else {
            self.set_message("No worktree selected".to_string());
            return;
        };
        self.open_session(path);
    }

    fn open_session(&mut self, path: PathBuf) {
        let key = self.session_key(&path);
        if !self.try_begin(&key) {
            return;
        }

        let sessions = self.sessions.clone();
        let worktrees = self.worktrees.clone();
        let startup = self.config.startup_command().unwrap_or_default().to_string();
        let agent = self.config.agent_command().map(str::to_string);
        self.spawn_command(key, async move {
            let layout = sessions
                .open_worktree_session(&path, &startup, agent.as_deref(), Some(&worktrees))
                .await?;
            Ok(format!("Switched to {}", layout.name))
        });
    }

    fn swap(&mut self, target: SwapTarget) {
        if !self.try_begin(CURRENT_SESSION) {
            return;
        }
        let sessions = self.sessions.clone();
        self.spawn_command(CURRENT_SESSION.to_string(), async move {
            match target {
                SwapTarget::Center => sessions.swap_center().await?,
                SwapTarget::RightBelow => sessions.swap_right_below().await?,
            }
            Ok(format!("Rotated {:?} panes", target))
        });
    }

    fn kill_selected(&mut self) {
        let Some(entry) = self.list.selected().cloned() else {
            self.set_message("No worktree selected".to_string());
            return;
        };
        let Some(name) = entry.session else {
            self.set_message(format!("No session for {}", entry.path.display()));
            return;
        };
        if !self.try_begin(&name) {
            return;
        }

        let sessions = self.sessions.clone();
        let target = name.clone();
        self.spawn_command(name, async move {
            sessions.kill_session(&target).await?;
            Ok(format!("Killed {}", target))
        });
    }

    fn create_worktree(&mut self, branch: String) {
        if self.worktrees.worktree_exists(&branch) {
            self.set_message(format!("Worktree for {} already exists", branch));
            return;
        }
        self.set_message(format!("Creating worktree {}...", branch));

        let created_at = Utc::now();
        let worktrees = self.worktrees.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = worktrees
                .create_worktree(&branch)
                .await
                .map_err(|e| format!("{:#}", e));
            let _ = tx.send(Event::WorktreeCreated {
                branch,
                created_at,
                result,
            });
        });
    }

    fn on_worktree_created(
        &mut self,
        branch: String,
        created_at: DateTime<Utc>,
        result: Result<PathBuf, String>,
    ) {
        let path = match result {
            Ok(path) => path,
            Err(e) => {
                self.set_message(format!("Error: creating {}: {}", branch, e));
                return;
            }
        };

        self.set_message(format!("Created {}", path.display()));
        if self.config.rename.enabled {
            self.start_watcher(path.clone(), &branch, created_at);
        }
        self.pending_select = Some(path.clone());
        self.open_session(path);
        self.request_refresh();
    }

    fn start_watcher(&mut self, path: PathBuf, branch: &str, created_at: DateTime<Utc>) {
        if let Some(active) = self.renames.get(&path).filter(|info| !info.status.is_terminal()) {
            tracing::debug!(
                "Rename of {} already {}, not starting another watcher",
                path.display(),
                active.status.as_str()
            );
            return;
        }

        let watch = WatcherConfig::new(path.clone(), branch)
            .with_session_name(session_name_for_dir(&path))
            .with_created_at(created_at)
            .with_timing(self.config.rename.poll_interval, self.config.rename.timeout);
        self.renames.insert(path, BranchRenameInfo::new(&watch));

        BranchRenameWatcher::new(
            watch,
            self.worktrees.git().clone(),
            HistoryFile::new(self.config.rename.history_path()),
            CliNameGenerator::new(
                self.config.rename.generator_command.clone(),
                self.config.rename.generator_args.clone(),
            ),
        )
        .with_sessions(self.sessions.clone())
        .spawn(self.tx.clone());
    }

    fn on_rename_finished(&mut self, report: WatchReport) {
        let message = match &report.error {
            None => format!(
                "Renamed {} -> {}",
                report.info.original_branch,
                report.info.new_branch.as_deref().unwrap_or_default()
            ),
            Some(e) => format!("Rename {}: {}", report.info.status.as_str(), e),
        };
        self.set_message(message);
        self.renames
            .insert(report.info.worktree_path.clone(), report.info);
        self.rebuild_entries();
        self.request_refresh();
    }

    fn on_command_finished(&mut self, key: String, result: Result<String, String>) {
        self.busy.remove(&key);
        match result {
            Ok(msg) => self.set_message(msg),
            Err(e) => self.set_message(format!("Error: {}", e)),
        }
        self.rebuild_entries();
        self.request_refresh();
    }

    fn spawn_input(&self) {
        let tx = self.tx.clone();
        tokio::task::spawn_blocking(move || loop {
            match term::poll(INPUT_POLL_INTERVAL) {
                Ok(true) => match term::read() {
                    Ok(term::Event::Key(key)) => {
                        if tx.send(Event::Key(key)).is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("Terminal read failed: {}", e);
                        break;
                    }
                },
                Ok(false) => {
                    if tx.is_closed() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("Terminal poll failed: {}", e);
                    break;
                }
            }
        });
    }

    fn spawn_ticker(&self) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            loop {
                interval.tick().await;
                if tx.send(Event::Tick).is_err() {
                    break;
                }
            }
        });
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut terminal = UI::setup_terminal()?;

        self.spawn_input();
        self.spawn_ticker();
        self.request_refresh();

        let result = self.event_loop(&mut terminal).await;

        UI::restore_terminal()?;
        result
    }

    async fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        while self.is_running() {
            terminal.draw(|frame| UI::render(frame, self))?;
            match self.next_event().await {
                Some(event) => self.handle_event(event),
                None => break,
            }
        }
        Ok(())
    }
}

/// One pass over every worktree: resolve its session, then classify its panes.
async fn scan_sessions<G: GitRunner, T: TmuxRunner>(
    sessions: &SessionManager<T>,
    detector: &AgentStateDetector<T>,
    worktrees: &WorktreeManager<G>,
    paths: Vec<PathBuf>,
) -> Vec<SessionStatus> {
    let mut statuses = Vec::with_capacity(paths.len());
    for worktree in paths {
        let name = sessions.resolve_session_name(&worktree, Some(worktrees)).await;
        let status = match detector.detect_session_agents(&name).await {
            Ok(Some(agents)) => SessionStatus {
                worktree,
                session: Some(name),
                agents,
            },
            Ok(None) => SessionStatus {
                worktree,
                session: None,
                agents: Vec::new(),
            },
            Err(e) => {
                tracing::warn!("Agent scan of {} failed: {:#}", name, e);
                SessionStatus {
                    worktree,
                    session: Some(name),
                    agents: Vec::new(),
                }
            }
        };
        statuses.push(status);
    }
    statuses
}

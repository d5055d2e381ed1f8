use std::path::{Path, PathBuf};

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
    Frame,
};

use crate::agent::AgentState;
use crate::rename::RenameStatus;
use crate::utils::{pad_to_width, truncate_str, truncate_str_head};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeEntry {
    pub path: PathBuf,
    pub branch: Option<String>,
    /// Live session name, if the worktree has one.
    pub session: Option<String>,
    pub state: AgentState,
    pub elapsed: Option<String>,
    pub rename: Option<RenameStatus>,
    pub busy: bool,
}

const PATH_MAX_CHARS: usize = 40;
const BRANCH_MAX_CHARS: usize = 32;

pub struct WorktreeList {
    entries: Vec<WorktreeEntry>,
    state: ListState,
    root: PathBuf,
}

impl WorktreeList {
    pub fn new(root: PathBuf) -> Self {
        Self {
            entries: Vec::new(),
            state: ListState::default(),
            root,
        }
    }

    /// Replaces the rows, keeping the selection on the same worktree path.
    pub fn set_entries(&mut self, entries: Vec<WorktreeEntry>) {
        let selected = self.selected().map(|e| e.path.clone());
        self.entries = entries;

        let index = selected
            .and_then(|path| self.entries.iter().position(|e| e.path == path))
            .or(if self.entries.is_empty() { None } else { Some(0) });
        self.state.select(index);
    }

    #[cfg(test)]
    pub fn entries(&self) -> &[WorktreeEntry] {
        &self.entries
    }

    pub fn next(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < self.entries.len() => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn prev(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => self.entries.len() - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn selected(&self) -> Option<&WorktreeEntry> {
        self.state.selected().and_then(|i| self.entries.get(i))
    }

    pub fn select_path(&mut self, path: &Path) {
        if let Some(i) = self.entries.iter().position(|e| e.path == path) {
            self.state.select(Some(i));
        }
    }

    fn display_path(&self, path: &Path) -> String {
        let shown = match path.strip_prefix(&self.root) {
            Ok(rel) if rel.as_os_str().is_empty() => "./".to_string(),
            Ok(rel) => format!("./{}", rel.display()),
            Err(_) => path.display().to_string(),
        };
        truncate_str_head(&shown, PATH_MAX_CHARS)
    }

    fn rename_badge(status: Option<RenameStatus>) -> (String, Color) {
        match status {
            None => (String::new(), Color::Reset),
            Some(s) => {
                let color = match s {
                    RenameStatus::Pending | RenameStatus::Detected => Color::Cyan,
                    RenameStatus::Completed => Color::Green,
                    RenameStatus::Failed => Color::Red,
                    RenameStatus::Skipped => Color::DarkGray,
                };
                (format!("[{}]", s.as_str()), color)
            }
        }
    }

    pub fn render(&mut self, frame: &mut Frame, area: Rect) {
        let items: Vec<ListItem> = self
            .entries
            .iter()
            .map(|entry| {
                let branch = entry
                    .branch
                    .as_deref()
                    .map(|b| truncate_str(b, BRANCH_MAX_CHARS))
                    .unwrap_or_else(|| "(detached)".to_string());
                let session = match (&entry.session, entry.busy) {
                    (_, true) => "…".to_string(),
                    (Some(name), false) => name.clone(),
                    (None, false) => "-".to_string(),
                };
                let (badge, badge_color) = Self::rename_badge(entry.rename);

                let spans = vec![
                    Span::styled(entry.state.symbol(), Style::default().fg(entry.state.color())),
                    Span::raw(" "),
                    Span::styled(
                        pad_to_width(&branch, BRANCH_MAX_CHARS),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                    Span::raw(" "),
                    Span::styled(format!("{:<16}", session), Style::default().fg(Color::Cyan)),
                    Span::styled(
                        format!("{:<8}", entry.elapsed.as_deref().unwrap_or("")),
                        Style::default().fg(Color::Green),
                    ),
                    Span::styled(format!("{:<11}", badge), Style::default().fg(badge_color)),
                    Span::styled(
                        self.display_path(&entry.path),
                        Style::default().fg(Color::DarkGray),
                    ),
                ];

                ListItem::new(Line::from(spans))
            })
            .collect();

        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::DarkGray))
                    .title(format!("Worktrees ({})", self.entries.len())),
            )
            .highlight_style(
                Style::default()
                    .add_modifier(Modifier::REVERSED)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("> ");

        frame.render_stateful_widget(list, area, &mut self.state);
    }

    pub fn summary(&self) -> StateSummary {
        let mut summary = StateSummary::default();
        for entry in &self.entries {
            match entry.state {
                AgentState::None => summary.none += 1,
                AgentState::Idle => summary.idle += 1,
                AgentState::Running => summary.running += 1,
                AgentState::Waiting => summary.waiting += 1,
            }
        }
        summary
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct StateSummary {
    pub none: usize,
    pub idle: usize,
    pub running: usize,
    pub waiting: usize,
}

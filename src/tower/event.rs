use chrono::{DateTime, Utc};
use crossterm::event::KeyEvent;
use std::path::PathBuf;

use crate::agent::AgentInfo;
use crate::rename::WatchReport;
use crate::session::Worktree;

/// Agent scan result for one worktree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub worktree: PathBuf,
    /// `None` when the worktree has no live session.
    pub session: Option<String>,
    pub agents: Vec<AgentInfo>,
}

/// Everything the dashboard loop reacts to. Background tasks post exactly one
/// event each; errors travel as display strings.
#[derive(Debug)]
pub enum Event {
    Key(KeyEvent),
    Tick,
    WorktreesListed(Result<Vec<Worktree>, String>),
    AgentsDetected(Vec<SessionStatus>),
    WorktreeCreated {
        branch: String,
        created_at: DateTime<Utc>,
        result: Result<PathBuf, String>,
    },
    RenameFinished(WatchReport),
    CommandFinished {
        /// Busy-flag key of the session the command ran against.
        key: String,
        result: Result<String, String>,
    },
}

impl From<WatchReport> for Event {
    fn from(report: WatchReport) -> Self {
        Event::RenameFinished(report)
    }
}

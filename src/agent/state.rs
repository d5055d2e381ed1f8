use ratatui::style::Color;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::utils::parse_duration;

/// What an agent in a pane appears to be doing. Ordered by reporting priority.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    #[default]
    None,
    Idle,
    Running,
    Waiting,
}

impl AgentState {
    /// The state reported for a session hosting several agents.
    pub fn highest<I>(states: I) -> AgentState
    where
        I: IntoIterator<Item = AgentState>,
    {
        states.into_iter().max().unwrap_or_default()
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            AgentState::None => " ",
            AgentState::Idle => "○",
            AgentState::Running => "●",
            AgentState::Waiting => "◆",
        }
    }

    pub fn color(&self) -> Color {
        match self {
            AgentState::None => Color::DarkGray,
            AgentState::Idle => Color::Gray,
            AgentState::Running => Color::Green,
            AgentState::Waiting => Color::Yellow,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AgentState::None => "No agent",
            AgentState::Idle => "Waiting for input",
            AgentState::Running => "Working",
            AgentState::Waiting => "Needs confirmation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub pane_id: String,
    pub state: AgentState,
    /// Duration token from the spinner line, e.g. `"2m 30s"`. Only set while running.
    pub elapsed: Option<String>,
}

impl AgentInfo {
    pub fn elapsed_duration(&self) -> Option<Duration> {
        self.elapsed.as_deref().and_then(|e| parse_duration(e).ok())
    }
}

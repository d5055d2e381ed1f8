use anyhow::{Context, Result};

use super::profile::Classifier;
use super::state::{AgentInfo, AgentState};
use crate::runner::{TmuxCommand, TmuxRunner};
use crate::session::has_session;

const PANE_FORMAT: &str = "#{pane_id}\t#{pane_current_command}\t#{pane_title}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneProcess {
    pub pane_id: String,
    pub command: String,
    pub title: String,
}

pub fn parse_pane_listing(output: &str) -> Vec<PaneProcess> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.splitn(3, '\t');
            let pane_id = parts.next()?.trim();
            if pane_id.is_empty() {
                return None;
            }
            Some(PaneProcess {
                pane_id: pane_id.to_string(),
                command: parts.next().unwrap_or_default().to_string(),
                title: parts.next().unwrap_or_default().to_string(),
            })
        })
        .collect()
}

/// Derives agent state from live pane contents. Holds no per-pane history.
#[derive(Clone)]
pub struct AgentStateDetector<T: TmuxRunner = TmuxCommand> {
    tmux: T,
    classifier: Classifier,
}

impl AgentStateDetector {
    pub fn new() -> Self {
        Self::with_runner(TmuxCommand::new())
    }
}

impl Default for AgentStateDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TmuxRunner> AgentStateDetector<T> {
    pub fn with_runner(tmux: T) -> Self {
        Self {
            tmux,
            classifier: Classifier::default(),
        }
    }

    pub async fn capture_pane(&self, pane_id: &str) -> Result<String> {
        self.tmux
            .run(&["capture-pane", "-p", "-t", pane_id])
            .await
            .with_context(|| format!("Failed to capture pane {}", pane_id))
    }

    /// Errors only when the capture itself fails.
    pub async fn detect_state(&self, pane_id: &str) -> Result<(AgentState, Option<String>)> {
        let content = self.capture_pane(pane_id).await?;
        Ok(self.classifier.classify(&content))
    }

    pub async fn list_panes(&self, session: &str) -> Result<Vec<PaneProcess>> {
        let out = self
            .tmux
            .run(&["list-panes", "-s", "-t", session, "-F", PANE_FORMAT])
            .await
            .with_context(|| format!("Failed to list panes of {}", session))?;
        Ok(parse_pane_listing(&out))
    }

    /// `Ok(None)` when the session does not exist. Panes that cannot be
    /// captured are skipped.
    pub async fn detect_session_agents(&self, session: &str) -> Result<Option<Vec<AgentInfo>>> {
        if !has_session(&self.tmux, session).await {
            return Ok(None);
        }

        let profile = self.classifier.profile();
        let mut agents = Vec::new();
        for pane in self.list_panes(session).await? {
            if !profile.matches_pane(&pane.command, &pane.title) {
                continue;
            }
            match self.detect_state(&pane.pane_id).await {
                Ok((state, elapsed)) => agents.push(AgentInfo {
                    pane_id: pane.pane_id,
                    state,
                    elapsed: if state == AgentState::Running {
                        elapsed
                    } else {
                        None
                    },
                }),
                Err(e) => {
                    tracing::warn!("Skipping pane {} in {}: {:#}", pane.pane_id, session, e);
                }
            }
        }

        tracing::debug!("{} {} pane(s) in {}", agents.len(), profile.name, session);
        Ok(Some(agents))
    }
}

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Prompts shorter than this (after trimming) are treated as noise.
pub const MIN_PROMPT_CHARS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PromptEntry {
    pub display: String,
    #[serde(default)]
    pub project: String,
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl PromptEntry {
    fn is_meaningful(&self) -> bool {
        let text = self.display.trim();
        text.chars().count() >= MIN_PROMPT_CHARS && !text.starts_with('/')
    }
}

/// Source of the agent's prompt log.
#[async_trait]
pub trait PromptHistory: Send + Sync {
    async fn entries(&self) -> Result<Vec<PromptEntry>>;
}

/// JSON-lines history file written by the agent CLI.
#[derive(Debug, Clone)]
pub struct HistoryFile {
    path: PathBuf,
}

impl HistoryFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".claude")
            .join("history.jsonl")
    }
}

pub fn parse_history(content: &str) -> Vec<PromptEntry> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<PromptEntry>(line) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::trace!("Skipping malformed history line: {}", e);
                None
            }
        })
        .collect()
}

#[async_trait]
impl PromptHistory for HistoryFile {
    async fn entries(&self) -> Result<Vec<PromptEntry>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read prompt history: {:?}", self.path))?;
        Ok(parse_history(&content))
    }
}

/// Earliest meaningful prompt recorded for `worktree` strictly after `since`.
pub fn find_first_prompt(
    entries: &[PromptEntry],
    worktree: &Path,
    since: DateTime<Utc>,
) -> Option<PromptEntry> {
    let since_ms = since.timestamp_millis();
    entries
        .iter()
        .filter(|e| e.timestamp > since_ms)
        .filter(|e| Path::new(&e.project) == worktree)
        .filter(|e| e.is_meaningful())
        .min_by_key(|e| e.timestamp)
        .cloned()
}

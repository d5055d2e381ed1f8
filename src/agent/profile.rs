use once_cell::sync::Lazy;
use regex::Regex;

use super::state::AgentState;

/// Non-blank lines of captured screen text considered by the classifier.
pub const RETAINED_LINES: usize = 30;

/// Screen and process conventions of one coding-agent CLI.
#[derive(Debug)]
pub struct AgentProfile {
    pub name: &'static str,
    /// Foreground process names, compared case-insensitively.
    pub process_names: &'static [&'static str],
    /// Leading pane-title characters shown while the agent is ready.
    pub title_glyphs: &'static [char],
    /// Glyphs that start the status line while the agent works.
    pub spinner_glyphs: &'static [char],
    pub interrupt_hints: &'static [&'static str],
    pub waiting_phrases: &'static [&'static str],
    pub prompt_glyph: char,
}

pub static CLAUDE: AgentProfile = AgentProfile {
    name: "claude",
    process_names: &["claude", "node"],
    title_glyphs: &['✳'],
    spinner_glyphs: &['·', '✢', '✳', '✶', '✻', '✽'],
    interrupt_hints: &["esc to interrupt", "ctrl+c to interrupt"],
    waiting_phrases: &[
        "Do you want to proceed?",
        "Do you want to make this edit",
        "Do you want to create",
        "Do you want to run",
        "Do you trust the files in this folder?",
        "❯ 1. Yes",
        "Yes, proceed",
        "Yes, and don't ask again",
        "No, and tell Claude what to do differently",
        "No, exit",
        "Continue? (y/n)",
        "[y/N]",
        "[Y/n]",
        "(y/n)",
    ],
    prompt_glyph: '❯',
};

static VERSION_COMMAND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\d+\.\d+$").expect("valid version regex"));

const DURATION: &str = r"\d+[smh](?:\s+\d+[smh])*";

fn is_braille(c: char) -> bool {
    ('\u{2800}'..='\u{28FF}').contains(&c)
}

impl AgentProfile {
    /// Whether a pane's foreground command or title marks it as hosting this agent.
    /// Some process listings report the interpreter version instead of a name.
    pub fn matches_pane(&self, command: &str, title: &str) -> bool {
        let command = command.trim();
        let by_command = self
            .process_names
            .iter()
            .any(|name| name.eq_ignore_ascii_case(command))
            || VERSION_COMMAND.is_match(command);

        let by_title = title
            .chars()
            .next()
            .map(|c| self.title_glyphs.contains(&c) || is_braille(c))
            .unwrap_or(false);

        by_command || by_title
    }
}

/// Lines from the `max_lines`-th non-blank line from the end through the last
/// non-blank line. Blank lines inside that span are kept.
pub fn retained_window(text: &str, max_lines: usize) -> Vec<&str> {
    let lines: Vec<&str> = text.lines().collect();
    let Some(last) = lines.iter().rposition(|l| !l.trim().is_empty()) else {
        return Vec::new();
    };

    let mut start = last;
    let mut kept = 0;
    for (i, line) in lines[..=last].iter().enumerate().rev() {
        if line.trim().is_empty() {
            continue;
        }
        kept += 1;
        start = i;
        if kept == max_lines {
            break;
        }
    }

    lines[start..=last].to_vec()
}

/// Classifier compiled from a profile. Pure: output depends only on the text.
#[derive(Debug, Clone)]
pub struct Classifier {
    profile: &'static AgentProfile,
    elapsed_after_separator: Regex,
    elapsed_leading: Regex,
    interrupt_hint: Regex,
    prompt: Regex,
}

impl Classifier {
    pub fn new(profile: &'static AgentProfile) -> Self {
        let glyphs: String = profile
            .spinner_glyphs
            .iter()
            .map(|c| regex::escape(&c.to_string()))
            .collect();
        let hints = profile
            .interrupt_hints
            .iter()
            .map(|h| regex::escape(h))
            .collect::<Vec<_>>()
            .join("|");
        let prompt = regex::escape(&profile.prompt_glyph.to_string());

        let build = |pattern: String| Regex::new(&pattern).expect("profile patterns compile");

        Self {
            profile,
            elapsed_after_separator: build(format!(
                r"^\s*[{glyphs}]\s.*?\(.*?·\s*({DURATION})\b"
            )),
            elapsed_leading: build(format!(r"^\s*[{glyphs}]\s.*?\(({DURATION})\b")),
            interrupt_hint: build(format!(r"^\s*[{glyphs}]\s.*\(.*(?i:{hints})")),
            prompt: build(format!(r"^\s*{prompt}\s*$")),
        }
    }

    pub fn profile(&self) -> &'static AgentProfile {
        self.profile
    }

    pub fn classify(&self, text: &str) -> (AgentState, Option<String>) {
        let window = retained_window(text, RETAINED_LINES);

        for line in window.iter().rev() {
            if let Some(elapsed) = self.running_elapsed(line) {
                return (AgentState::Running, elapsed);
            }
        }

        let retained = window.join("\n");
        if self
            .profile
            .waiting_phrases
            .iter()
            .any(|phrase| retained.contains(phrase))
        {
            return (AgentState::Waiting, None);
        }

        if window.iter().any(|line| self.prompt.is_match(line)) {
            return (AgentState::Idle, None);
        }

        (AgentState::None, None)
    }

    /// `Some(elapsed)` when the line is a spinner status line.
    fn running_elapsed(&self, line: &str) -> Option<Option<String>> {
        for pattern in [&self.elapsed_after_separator, &self.elapsed_leading] {
            if let Some(caps) = pattern.captures(line) {
                return Some(Some(caps[1].trim().to_string()));
            }
        }
        if self.interrupt_hint.is_match(line) {
            return Some(None);
        }
        None
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(&CLAUDE)
    }
}

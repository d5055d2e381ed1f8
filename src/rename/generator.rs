use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

/// Turns a free-form task description into a short branch name. The result is
/// not trusted; callers sanitize it.
#[async_trait]
pub trait NameGenerator: Send + Sync {
    async fn generate_branch_name(&self, prompt: &str) -> Result<String>;
}

const INSTRUCTION: &str = "Generate a concise git branch name (2 to 5 words, kebab-case, \
no prefix) that describes the following task. Reply with the branch name only.";

/// Prompt-mode invocation of an agent CLI, e.g. `claude -p --model haiku <text>`.
#[derive(Debug, Clone)]
pub struct CliNameGenerator {
    program: String,
    args: Vec<String>,
}

impl CliNameGenerator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn request(prompt: &str) -> String {
        format!("{}\n\nTask: {}", INSTRUCTION, prompt.trim())
    }
}

impl Default for CliNameGenerator {
    fn default() -> Self {
        Self::new(
            "claude",
            vec!["-p".to_string(), "--model".to_string(), "haiku".to_string()],
        )
    }
}

/// First non-empty line, with surrounding quotes and backticks removed.
pub fn first_answer_line(output: &str) -> Option<String> {
    output
        .lines()
        .map(|l| l.trim().trim_matches(|c| c == '`' || c == '"' || c == '\''))
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl NameGenerator for CliNameGenerator {
    async fn generate_branch_name(&self, prompt: &str) -> Result<String> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(Self::request(prompt))
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("Failed to execute {}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("{} exited with {}: {}", self.program, output.status, stderr.trim());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        first_answer_line(&stdout)
            .ok_or_else(|| anyhow::anyhow!("{} returned no branch name", self.program))
    }
}

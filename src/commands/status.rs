use anyhow::{bail, Result};
use clap::Args as ClapArgs;

use crate::agent::{AgentState, AgentStateDetector};
use crate::commands::common;
use crate::config::Config;
use crate::session::SessionManager;

#[derive(ClapArgs)]
pub struct Args {
    /// Session name to check (default: the current directory's session)
    pub session_name: Option<String>,
}

pub async fn execute(args: Args, _config: Config) -> Result<()> {
    let session_name = match args.session_name {
        Some(name) => name,
        None => {
            let cwd = common::resolve_dir(None)?;
            let lookup = common::head_lookup();
            SessionManager::new()
                .resolve_session_name(&cwd, Some(&lookup))
                .await
        }
    };

    let detector = AgentStateDetector::new();
    let Some(agents) = detector.detect_session_agents(&session_name).await? else {
        bail!("Session {} does not exist", session_name);
    };

    let overall = AgentState::highest(agents.iter().map(|a| a.state));
    println!("Session: {} ({})", session_name, overall.description());

    if agents.is_empty() {
        println!("  no agent panes");
    }
    for agent in &agents {
        println!(
            "  {:<5} {} {:<8} {}",
            agent.pane_id,
            agent.state.symbol(),
            agent.state.description(),
            agent.elapsed.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::{GitRunner, RunError, TmuxRunner};

#[derive(Default)]
struct FakeState {
    responses: HashMap<Vec<String>, Result<String, String>>,
    calls: Vec<Vec<String>>,
}

/// In-memory runner keyed by exact argument tuples. Unknown commands fail,
/// which is what tmux does for most queries against a missing target.
#[derive(Clone, Default)]
pub struct FakeRunner {
    state: Arc<Mutex<FakeState>>,
}

fn key(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, args: &[&str], stdout: &str) -> &Self {
        self.state
            .lock()
            .unwrap()
            .responses
            .insert(key(args), Ok(stdout.to_string()));
        self
    }

    pub fn fail(&self, args: &[&str], stderr: &str) -> &Self {
        self.state
            .lock()
            .unwrap()
            .responses
            .insert(key(args), Err(stderr.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn called(&self, args: &[&str]) -> bool {
        let wanted = key(args);
        self.state.lock().unwrap().calls.iter().any(|c| *c == wanted)
    }

    pub fn calls_starting_with(&self, command: &str) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter(|c| c.first().map(String::as_str) == Some(command))
            .collect()
    }

    fn lookup(&self, args: &[&str]) -> Result<String, RunError> {
        let mut state = self.state.lock().unwrap();
        let k = key(args);
        state.calls.push(k.clone());
        match state.responses.get(&k) {
            Some(Ok(out)) => Ok(out.clone()),
            Some(Err(stderr)) => Err(RunError::Failed {
                program: "fake".to_string(),
                args: args.join(" "),
                stderr: stderr.clone(),
            }),
            None => Err(RunError::Failed {
                program: "fake".to_string(),
                args: args.join(" "),
                stderr: "no fake response".to_string(),
            }),
        }
    }
}

#[async_trait]
impl TmuxRunner for FakeRunner {
    async fn run(&self, args: &[&str]) -> Result<String, RunError> {
        self.lookup(args)
    }
}

#[async_trait]
impl GitRunner for FakeRunner {
    async fn run(&self, _dir: &Path, args: &[&str]) -> Result<String, RunError> {
        self.lookup(args)
    }
}

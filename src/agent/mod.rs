mod detector;
mod profile;
mod state;

pub use detector::AgentStateDetector;
pub use state::{AgentInfo, AgentState};

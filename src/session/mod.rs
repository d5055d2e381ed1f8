mod layout;
mod tmux;
mod worktree;

pub use layout::SessionLayout;
pub use tmux::{has_session, session_name_for_dir, SessionManager};
pub use worktree::{rename_branch, HeadBranch, Worktree, WorktreeManager};

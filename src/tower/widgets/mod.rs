mod branch_input;
mod worktree_list;

pub use branch_input::BranchInput;
pub use worktree_list::{WorktreeEntry, WorktreeList};

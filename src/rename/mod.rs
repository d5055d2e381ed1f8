mod generator;
mod history;
mod slug;
mod watcher;

pub use generator::CliNameGenerator;
pub use history::HistoryFile;
pub use slug::slug_from_branch;
pub use watcher::{
    BranchRenameInfo, BranchRenameWatcher, RenameStatus, WatchReport, WatcherConfig,
};

pub mod common;
pub mod dashboard;
pub mod kill;
pub mod new;
pub mod open;
pub mod status;
pub mod swap;
pub mod watch;

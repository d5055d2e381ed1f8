mod app;
mod event;
mod ui;
mod widgets;

pub use app::Dashboard;

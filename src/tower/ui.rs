use std::io::{self, Stdout};

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};

use super::app::Dashboard;
use crate::agent::AgentState;
use crate::runner::{GitRunner, TmuxRunner};
use crate::utils::truncate_str_head;

pub struct UI;

impl UI {
    pub fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<Stdout>>> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        Terminal::new(backend)
    }

    pub fn restore_terminal() -> io::Result<()> {
        disable_raw_mode()?;
        execute!(io::stdout(), LeaveAlternateScreen)?;
        Ok(())
    }

    pub fn render<G, T>(frame: &mut Frame, app: &mut Dashboard<G, T>)
    where
        G: GitRunner + Clone + 'static,
        T: TmuxRunner + Clone + 'static,
    {
        let input_height = if app.input().is_active() { 3 } else { 0 };
        // The list absorbs any shortfall so the key hints stay visible.
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3),
                Constraint::Fill(1),
                Constraint::Length(input_height),
                Constraint::Length(3),
            ])
            .split(frame.area());

        Self::render_header(frame, chunks[0], app);
        app.list().render(frame, chunks[1]);
        if app.input().is_active() {
            app.input().render(frame, chunks[2]);
        }
        Self::render_footer(frame, chunks[3], app);
    }

    fn render_header<G, T>(frame: &mut Frame, area: Rect, app: &mut Dashboard<G, T>)
    where
        G: GitRunner + Clone + 'static,
        T: TmuxRunner + Clone + 'static,
    {
        let summary = app.list().summary();
        let root = app.git_root().display().to_string();

        let mut title = vec![Span::styled(
            " treedeck ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )];

        // Repository path only when there is room for it
        if area.width >= 80 {
            title.push(Span::styled(
                format!("{} ", truncate_str_head(&root, 40)),
                Style::default().fg(Color::Yellow),
            ));
        }
        title.push(Span::raw("| "));

        for (state, count) in [
            (AgentState::Idle, summary.idle),
            (AgentState::Running, summary.running),
            (AgentState::Waiting, summary.waiting),
        ] {
            title.push(Span::styled(
                format!("{} {} ", state.symbol(), count),
                Style::default().fg(state.color()),
            ));
        }

        let header = Paragraph::new(Line::from(title)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        );

        frame.render_widget(header, area);
    }

    fn render_footer<G, T>(frame: &mut Frame, area: Rect, app: &mut Dashboard<G, T>)
    where
        G: GitRunner + Clone + 'static,
        T: TmuxRunner + Clone + 'static,
    {
        let message = match app.message() {
            Some(m) if !m.is_empty() => format!("{} | ", m),
            _ => String::new(),
        };
        let message_style = if message.starts_with("Error") || message.contains("failed") {
            Style::default().fg(Color::Red)
        } else {
            Style::default().fg(Color::Green)
        };

        let keys: &[(&str, &str)] = if app.input().is_active() {
            &[("Enter", "Create"), ("Esc", "Cancel")]
        } else {
            &[
                ("Enter", "Open"),
                ("n", "New"),
                ("c/r", "Rotate"),
                ("x", "Kill"),
                ("q", "Quit"),
            ]
        };

        let mut help_text = vec![Span::styled(message, message_style)];
        for (key, action) in keys {
            help_text.push(Span::styled(*key, Style::default().fg(Color::Yellow)));
            help_text.push(Span::raw(format!(": {} ", action)));
        }

        let footer = Paragraph::new(Line::from(help_text)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        );

        frame.render_widget(footer, area);
    }
}

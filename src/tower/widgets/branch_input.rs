use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

/// Single-line prompt for a new branch name. The cursor is a char index.
pub struct BranchInput {
    content: String,
    cursor: usize,
    active: bool,
}

impl BranchInput {
    pub fn new() -> Self {
        Self {
            content: String::new(),
            cursor: 0,
            active: false,
        }
    }

    pub fn open(&mut self) {
        self.clear();
        self.active = true;
    }

    pub fn close(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    #[cfg(test)]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Closes the prompt and returns the trimmed text, if any.
    pub fn submit(&mut self) -> Option<String> {
        let value = self.content.trim().to_string();
        self.close();
        self.clear();
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }

    pub fn clear(&mut self) {
        self.content.clear();
        self.cursor = 0;
    }

    fn byte_offset(&self, char_index: usize) -> usize {
        self.content
            .char_indices()
            .nth(char_index)
            .map(|(i, _)| i)
            .unwrap_or(self.content.len())
    }

    fn char_len(&self) -> usize {
        self.content.chars().count()
    }

    pub fn insert_char(&mut self, c: char) {
        // Branch names cannot contain whitespace.
        if c.is_whitespace() {
            return;
        }
        let at = self.byte_offset(self.cursor);
        self.content.insert(at, c);
        self.cursor += 1;
    }

    pub fn delete_char(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let at = self.byte_offset(self.cursor);
            self.content.remove(at);
        }
    }

    pub fn move_cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_cursor_right(&mut self) {
        if self.cursor < self.char_len() {
            self.cursor += 1;
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let at = self.byte_offset(self.cursor);
        let (before, after) = self.content.split_at(at);

        let line = if self.content.is_empty() {
            Line::from(vec![
                Span::styled("│", Style::default().fg(Color::Yellow).add_modifier(Modifier::SLOW_BLINK)),
                Span::styled("user/feature-name", Style::default().fg(Color::DarkGray)),
            ])
        } else {
            Line::from(vec![
                Span::styled(before, Style::default().fg(Color::White)),
                Span::styled("│", Style::default().fg(Color::Yellow).add_modifier(Modifier::SLOW_BLINK)),
                Span::styled(after, Style::default().fg(Color::White)),
            ])
        };

        let paragraph = Paragraph::new(line).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title("New worktree branch (Enter: create, Esc: cancel)"),
        );
        frame.render_widget(paragraph, area);
    }
}

impl Default for BranchInput {
    fn default() -> Self {
        Self::new()
    }
}

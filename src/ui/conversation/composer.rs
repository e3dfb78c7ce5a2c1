use crate::events::{ChatMode, SessionState};
use crate::ui::conversation::commands::{parse_slash_command, ParsedCommand};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

/// Result returned when the user interacts with the conversation composer
#[derive(Debug, PartialEq)]
pub enum ConversationResult {
    Submitted(String),
    Command(ParsedCommand),
    None,
}

/// State for the text area within the composer
#[derive(Debug, Clone, Default)]
pub struct TextAreaState {
    pub content: String,
    /// Byte offset, always on a char boundary
    pub cursor_position: usize,
}

/// Conversation composer for user input
#[derive(Debug, Clone)]
pub struct ConversationComposer {
    state: TextAreaState,
    placeholder: String,
    current_mode: ChatMode,
    session_state: SessionState,
}

impl ConversationComposer {
    pub fn new(placeholder: impl Into<String>, current_mode: ChatMode) -> Self {
        Self {
            state: TextAreaState::default(),
            placeholder: placeholder.into(),
            current_mode,
            session_state: SessionState::Idle,
        }
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ConversationResult {
        if key.kind != KeyEventKind::Press {
            return ConversationResult::None;
        }

        match key.code {
            KeyCode::Enter => {
                if key.modifiers.contains(KeyModifiers::SHIFT) {
                    self.insert_char('\n');
                } else if !self.state.content.trim().is_empty() {
                    // Commands go through even while a reply is pending; plain
                    // text stays in the box until the session is idle again.
                    if let Some(command) = parse_slash_command(&self.state.content) {
                        self.clear();
                        return ConversationResult::Command(command);
                    }
                    if self.session_state == SessionState::Idle {
                        let content = std::mem::take(&mut self.state.content);
                        self.state.cursor_position = 0;
                        return ConversationResult::Submitted(content);
                    }
                }
            }
            KeyCode::Char(c) => {
                self.insert_char(c);
            }
            KeyCode::Backspace => {
                if let Some(prev) = self.prev_boundary() {
                    self.state.content.remove(prev);
                    self.state.cursor_position = prev;
                }
            }
            KeyCode::Delete => {
                if self.state.cursor_position < self.state.content.len() {
                    self.state.content.remove(self.state.cursor_position);
                }
            }
            KeyCode::Left => {
                if let Some(prev) = self.prev_boundary() {
                    self.state.cursor_position = prev;
                }
            }
            KeyCode::Right => {
                if let Some(c) = self.state.content[self.state.cursor_position..].chars().next() {
                    self.state.cursor_position += c.len_utf8();
                }
            }
            KeyCode::Home => {
                self.state.cursor_position = 0;
            }
            KeyCode::End => {
                self.state.cursor_position = self.state.content.len();
            }
            _ => {}
        }

        ConversationResult::None
    }

    /// Insert a character at the cursor position
    fn insert_char(&mut self, c: char) {
        self.state.content.insert(self.state.cursor_position, c);
        self.state.cursor_position += c.len_utf8();
    }

    fn prev_boundary(&self) -> Option<usize> {
        self.state.content[..self.state.cursor_position]
            .char_indices()
            .next_back()
            .map(|(index, _)| index)
    }

    /// Update current mode
    pub fn update_mode(&mut self, mode: ChatMode) {
        self.current_mode = mode;
    }

    /// Mirror the session's submit state for the send hint
    pub fn update_session_state(&mut self, state: SessionState) {
        self.session_state = state;
    }

    /// Get current content
    pub fn content(&self) -> &str {
        &self.state.content
    }

    /// Clear content
    pub fn clear(&mut self) {
        self.state.content.clear();
        self.state.cursor_position = 0;
    }

    /// Rows needed to show the current content plus borders
    pub fn desired_height(&self) -> u16 {
        let rows = self.state.content.split('\n').count().clamp(1, 6) as u16;
        rows + 2
    }

    fn title(&self) -> String {
        match self.session_state {
            SessionState::Idle => format!(" {} · Enter to send ", self.current_mode.display_name()),
            SessionState::AwaitingReply => {
                format!(" {} · waiting for reply… ", self.current_mode.display_name())
            }
        }
    }
}

impl Widget for &ConversationComposer {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let border_style = match self.session_state {
            SessionState::Idle => Style::default().fg(Color::Green),
            SessionState::AwaitingReply => Style::default().fg(Color::Yellow),
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(self.title())
            .style(border_style);

        let inner_area = block.inner(area);
        block.render(area, buf);

        if self.state.content.is_empty() {
            let placeholder_line = Line::from(vec![Span::styled(
                self.placeholder.as_str(),
                Style::default().fg(Color::DarkGray),
            )]);
            buf.set_line(inner_area.x, inner_area.y, &placeholder_line, inner_area.width);
            return;
        }

        // Render content with cursor indicator
        let mut content = self.state.content.clone();
        content.insert(self.state.cursor_position.min(content.len()), '▌');

        let rows: Vec<&str> = content.split('\n').collect();
        let height = inner_area.height as usize;
        let start = rows.len().saturating_sub(height);
        for (i, line_text) in rows[start..].iter().enumerate() {
            let line = Line::from(vec![Span::raw(*line_text)]);
            buf.set_line(inner_area.x, inner_area.y + i as u16, &line, inner_area.width);
        }
    }
}

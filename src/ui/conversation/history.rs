//! Conversation transcript display component

use crate::events::{ChatMode, MessageContent, MessageId, MessageRole};
use crate::format::{Block, Inline};
use crate::session::RenderSurface;
use chrono::{DateTime, Local};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block as BorderBlock, Borders, Widget},
};

/// A single visible entry
#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    pub id: MessageId,
    pub role: MessageRole,
    pub content: MessageContent,
    pub timestamp: DateTime<Local>,
}

/// Render surface backed by an in-memory list of entries
#[derive(Debug, Clone)]
pub struct TranscriptView {
    entries: Vec<TranscriptEntry>,
    active_mode: Option<ChatMode>,
    next_id: u64,
    show_timestamps: bool,
    /// Animation frame for the typing indicator
    frame: usize,
}

impl TranscriptView {
    pub fn new(show_timestamps: bool) -> Self {
        Self {
            entries: Vec::new(),
            active_mode: None,
            next_id: 0,
            show_timestamps,
            frame: 0,
        }
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn active_mode(&self) -> Option<ChatMode> {
        self.active_mode
    }

    /// Whether a typing placeholder is currently shown
    pub fn has_pending(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.content == MessageContent::Pending)
    }

    /// Advance the typing animation by one frame.
    pub fn tick(&mut self) {
        self.frame = self.frame.wrapping_add(1);
    }

    /// Lay out every entry as styled lines for the given width.
    pub fn lines(&self, width: u16) -> Vec<Line<'static>> {
        let mut lines = Vec::new();
        for entry in &self.entries {
            lines.append(&mut self.render_entry(entry, width));
            // spacing between messages
            lines.push(Line::default());
        }
        lines
    }

    fn render_entry(&self, entry: &TranscriptEntry, width: u16) -> Vec<Line<'static>> {
        let mut lines = Vec::new();

        let mut header = vec![Span::styled(
            role_label(entry.role).to_string(),
            role_style(entry.role).add_modifier(Modifier::BOLD),
        )];
        if self.show_timestamps {
            header.push(Span::styled(
                format!("  {}", entry.timestamp.format("%H:%M:%S")),
                Style::default().fg(Color::DarkGray),
            ));
        }
        lines.push(Line::from(header));

        let body_width = width.saturating_sub(2) as usize;
        match &entry.content {
            MessageContent::Plain(text) => {
                for raw in text.split('\n') {
                    for wrapped in wrap_text(raw, body_width) {
                        lines.push(indent(vec![Span::styled(wrapped, role_style(entry.role))]));
                    }
                }
            }
            MessageContent::Rich(blocks) => {
                lines.extend(render_blocks(blocks, role_style(entry.role), body_width));
            }
            MessageContent::Pending => {
                let dots = match self.frame % 4 {
                    0 => ".",
                    1 => "..",
                    2 => "...",
                    _ => "   ",
                };
                lines.push(indent(vec![
                    Span::styled("typing", Style::default().fg(Color::Green)),
                    Span::styled(dots, Style::default().fg(Color::Yellow)),
                ]));
            }
        }

        lines
    }
}

impl RenderSurface for TranscriptView {
    fn append_message(&mut self, role: MessageRole, content: MessageContent) -> MessageId {
        self.next_id += 1;
        let id = MessageId(self.next_id);
        self.entries.push(TranscriptEntry {
            id,
            role,
            content,
            timestamp: Local::now(),
        });
        id
    }

    fn remove_message(&mut self, id: MessageId) {
        self.entries.retain(|entry| entry.id != id);
    }

    fn clear_all(&mut self) {
        self.entries.clear();
    }

    fn set_active_mode(&mut self, mode: ChatMode) {
        self.active_mode = Some(mode);
    }
}

impl Widget for &TranscriptView {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = match self.active_mode {
            Some(mode) => format!(" Conversation · {} mode ", mode.display_name()),
            None => " Conversation ".to_string(),
        };
        let block = BorderBlock::default().borders(Borders::ALL).title(title);

        let inner_area = block.inner(area);
        block.render(area, buf);

        if self.entries.is_empty() {
            let welcome_lines = [
                Line::from(Span::styled("Welcome to robochat!", Style::default().fg(Color::Green))),
                Line::default(),
                Line::from(Span::styled(
                    "Type a message below. /help lists commands.",
                    Style::default().fg(Color::Gray),
                )),
            ];
            for (i, line) in welcome_lines.iter().enumerate() {
                if i < inner_area.height as usize {
                    buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
                }
            }
            return;
        }

        // Show the newest lines, anchored to the bottom
        let all_lines = self.lines(inner_area.width);
        let height = inner_area.height as usize;
        let start = all_lines.len().saturating_sub(height);
        for (i, line) in all_lines[start..].iter().enumerate() {
            buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
        }
    }
}

fn role_label(role: MessageRole) -> &'static str {
    match role {
        MessageRole::User => "You",
        MessageRole::Assistant => "Assistant",
        MessageRole::System => "System",
        MessageRole::Error => "Error",
    }
}

fn role_style(role: MessageRole) -> Style {
    match role {
        MessageRole::User => Style::default().fg(Color::Blue),
        MessageRole::Assistant => Style::default().fg(Color::Green),
        MessageRole::System => Style::default().fg(Color::Yellow),
        MessageRole::Error => Style::default().fg(Color::Red),
    }
}

fn indent(mut spans: Vec<Span<'static>>) -> Line<'static> {
    spans.insert(0, Span::raw("  "));
    Line::from(spans)
}

/// Turn formatter blocks into lines. Blocks are separated by a blank line.
fn render_blocks(blocks: &[Block], style: Style, width: usize) -> Vec<Line<'static>> {
    let code_style = Style::default().fg(Color::Cyan);
    let mut lines = Vec::new();

    for (index, block) in blocks.iter().enumerate() {
        if index > 0 {
            lines.push(Line::default());
        }
        match block {
            Block::Paragraph(inlines) => {
                for spans in split_lines(inlines, style, code_style) {
                    lines.extend(wrap_spans(spans, width, Vec::new()));
                }
            }
            Block::List(items) => {
                for item in items {
                    for (n, spans) in split_lines(&item.0, style, code_style).into_iter().enumerate() {
                        let marker = if n == 0 { "• " } else { "  " };
                        let prefix = vec![Span::styled(marker, Style::default().fg(Color::DarkGray))];
                        lines.extend(wrap_spans(spans, width.saturating_sub(2), prefix));
                    }
                }
            }
        }
    }

    lines
}

/// Styled piece of one visual row. Code is never split or re-spaced.
enum Run {
    Text(Span<'static>),
    Code(Span<'static>),
}

/// Break inline content at soft line breaks into styled runs.
fn split_lines(inlines: &[Inline], style: Style, code_style: Style) -> Vec<Vec<Run>> {
    let mut rows = vec![Vec::new()];
    for inline in inlines {
        match inline {
            Inline::Text(text) => {
                if let Some(row) = rows.last_mut() {
                    row.push(Run::Text(Span::styled(text.clone(), style)));
                }
            }
            Inline::Code(code) => {
                if let Some(row) = rows.last_mut() {
                    row.push(Run::Code(Span::styled(code.clone(), code_style)));
                }
            }
            Inline::LineBreak => rows.push(Vec::new()),
        }
    }
    rows
}

/// Unbreakable stretch of a row: either whitespace taken from text, or
/// everything between two such stretches.
struct Unit {
    spans: Vec<Span<'static>>,
    width: usize,
    space: bool,
}

/// Cut runs into units. Text is split where it already has whitespace;
/// touching runs with no whitespace between them stay in one unit.
fn units(runs: Vec<Run>) -> Vec<Unit> {
    let mut units: Vec<Unit> = Vec::new();
    let mut add = |piece: String, style: Style, space: bool| {
        let width = piece.chars().count();
        let span = Span::styled(piece, style);
        match units.last_mut() {
            Some(unit) if unit.space == space => {
                unit.spans.push(span);
                unit.width += width;
            }
            _ => units.push(Unit {
                spans: vec![span],
                width,
                space,
            }),
        }
    };

    for run in runs {
        match run {
            Run::Code(span) => add(span.content.into_owned(), span.style, false),
            Run::Text(span) => {
                let mut piece = String::new();
                let mut in_space = false;
                for c in span.content.chars() {
                    if c.is_whitespace() != in_space && !piece.is_empty() {
                        add(std::mem::take(&mut piece), span.style, in_space);
                    }
                    in_space = c.is_whitespace();
                    piece.push(c);
                }
                if !piece.is_empty() {
                    add(piece, span.style, in_space);
                }
            }
        }
    }
    units
}

/// Greedy wrap over styled runs. Whitespace is kept as written except at a
/// wrap point, where it is dropped.
fn wrap_spans(runs: Vec<Run>, width: usize, prefix: Vec<Span<'static>>) -> Vec<Line<'static>> {
    let continuation: Vec<Span<'static>> = prefix
        .iter()
        .map(|span| Span::styled(" ".repeat(span.content.chars().count()), span.style))
        .collect();

    let mut lines = Vec::new();
    let mut current: Vec<Span<'static>> = prefix;
    let mut used = 0usize;
    let mut has_words = false;
    let mut pending: Option<Unit> = None;

    for unit in units(runs) {
        if unit.space {
            pending = Some(unit);
            continue;
        }
        let gap = pending.as_ref().map_or(0, |space| space.width);
        if has_words && width > 0 && used + gap + unit.width > width {
            lines.push(indent(std::mem::replace(&mut current, continuation.clone())));
            used = 0;
            pending = None;
        }
        if let Some(space) = pending.take() {
            used += space.width;
            current.extend(space.spans);
        }
        used += unit.width;
        current.extend(unit.spans);
        has_words = true;
    }
    if let Some(space) = pending {
        current.extend(space.spans);
    }

    lines.push(indent(current));
    lines
}

/// Wrap text to fit within the given width
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        let line_len = current_line.chars().count();
        if line_len + word_len + 1 <= width || current_line.is_empty() {
            if !current_line.is_empty() {
                current_line.push(' ');
            }
            current_line.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current_line));
            current_line.push_str(word);
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

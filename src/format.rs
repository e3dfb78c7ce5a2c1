//! Markdown-lite formatter for chat replies.
//!
//! Understands three things only: inline code spans delimited by single
//! backticks, single-level bullet lists (`-`, `*` or `•` followed by
//! whitespace) and paragraphs separated by blank lines. Everything else is
//! passed through as text. The function is total: every input, including
//! the empty string, yields a (possibly empty) sequence of blocks.

use once_cell::sync::Lazy;
use regex::Regex;

static CODE_SPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`([^`]+)`").expect("format: static regex pattern must compile"));

static BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-*•]\s").expect("format: static regex pattern must compile"));

/// Inline content of a paragraph or list item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    /// Literal text between a pair of backticks
    Code(String),
    /// Soft break between two source lines of the same paragraph
    LineBreak,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem(pub Vec<Inline>);

/// Top-level structured content, in source order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(Vec<Inline>),
    List(Vec<ListItem>),
}

impl Block {
    /// Text of the block without styling. List items are prefixed with `• `.
    pub fn plain_text(&self) -> String {
        match self {
            Block::Paragraph(inlines) => inlines_to_text(inlines),
            Block::List(items) => items
                .iter()
                .map(|item| format!("• {}", inlines_to_text(&item.0)))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Convert raw reply text into structured blocks.
///
/// Code spans are paired over the whole input before it is cut into lines,
/// so a span may run across a line break. Its pieces then sit on either
/// side of the break as separate `Code` inlines.
pub fn format(raw: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut paragraph: Vec<Inline> = Vec::new();
    let mut list: Option<Vec<ListItem>> = None;

    for (source, mut pieces) in pair_code_spans(raw) {
        let line = match source.strip_suffix('\r') {
            Some(line) => {
                drop_trailing_cr(&mut pieces);
                line
            }
            None => source,
        };

        if let Some(marker) = BULLET.find(line) {
            drop_leading_bytes(&mut pieces, marker.end());
            let items = list.get_or_insert_with(|| {
                flush_paragraph(&mut paragraph, &mut blocks);
                Vec::new()
            });
            items.push(ListItem(pieces));
            continue;
        }

        if let Some(items) = list.take() {
            blocks.push(Block::List(items));
        }

        // Only zero-length lines are blank; whitespace-only lines are text.
        if line.is_empty() {
            flush_paragraph(&mut paragraph, &mut blocks);
            continue;
        }

        if !paragraph.is_empty() {
            paragraph.push(Inline::LineBreak);
        }
        paragraph.extend(pieces);
    }

    if let Some(items) = list.take() {
        blocks.push(Block::List(items));
    }
    flush_paragraph(&mut paragraph, &mut blocks);

    blocks
}

/// Flatten blocks to plain text, separating blocks with a blank line.
pub fn to_plain_text(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(Block::plain_text)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn flush_paragraph(paragraph: &mut Vec<Inline>, blocks: &mut Vec<Block>) {
    if !paragraph.is_empty() {
        blocks.push(Block::Paragraph(std::mem::take(paragraph)));
    }
}

/// Pair backticks across the whole input, then split on `\n`. Each physical
/// line comes back with its source text and the inline pieces that fall on
/// it. Backticks that form a span are consumed; unpaired ones stay text.
fn pair_code_spans(raw: &str) -> Vec<(&str, Vec<Inline>)> {
    let mut lines: Vec<(&str, Vec<Inline>)> =
        raw.split('\n').map(|line| (line, Vec::new())).collect();
    let mut row = 0;
    let mut last = 0;

    for captures in CODE_SPAN.captures_iter(raw) {
        let (Some(whole), Some(code)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        place(&mut lines, &mut row, &raw[last..whole.start()], false);
        place(&mut lines, &mut row, code.as_str(), true);
        last = whole.end();
    }
    place(&mut lines, &mut row, &raw[last..], false);

    lines
}

/// Distribute one text or code segment over the lines it touches.
fn place(lines: &mut [(&str, Vec<Inline>)], row: &mut usize, segment: &str, code: bool) {
    for (i, piece) in segment.split('\n').enumerate() {
        if i > 0 {
            *row += 1;
        }
        if piece.is_empty() {
            continue;
        }
        let Some((_, pieces)) = lines.get_mut(*row) else {
            return;
        };
        let piece = piece.to_string();
        pieces.push(if code {
            Inline::Code(piece)
        } else {
            Inline::Text(piece)
        });
    }
}

fn piece_text(inline: &mut Inline) -> Option<&mut String> {
    match inline {
        Inline::Text(t) | Inline::Code(t) => Some(t),
        Inline::LineBreak => None,
    }
}

fn drop_trailing_cr(pieces: &mut Vec<Inline>) {
    if let Some(text) = pieces.last_mut().and_then(piece_text) {
        if text.ends_with('\r') {
            text.pop();
        }
        if text.is_empty() {
            pieces.pop();
        }
    }
}

/// Remove the bullet marker. Marker bytes are never backticks, so they all
/// sit in the first piece.
fn drop_leading_bytes(pieces: &mut Vec<Inline>, len: usize) {
    if let Some(text) = pieces.first_mut().and_then(piece_text) {
        if text.is_char_boundary(len.min(text.len())) {
            text.drain(..len.min(text.len()));
        }
        if text.is_empty() {
            pieces.remove(0);
        }
    }
}

fn inlines_to_text(inlines: &[Inline]) -> String {
    let mut text = String::new();
    for inline in inlines {
        match inline {
            Inline::Text(t) | Inline::Code(t) => text.push_str(t),
            Inline::LineBreak => text.push('\n'),
        }
    }
    text
}

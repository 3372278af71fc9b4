//! Source documents and text positions

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Position in a document (0-indexed line, byte column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: usize, character: usize) -> Self {
        Self {
            line: line as u32,
            character: character as u32,
        }
    }
}

/// Range in a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Range covering `start..end` on a single line
    pub fn on_line(line: usize, start: usize, end: usize) -> Self {
        Self {
            start: Position::new(line, start),
            end: Position::new(line, end),
        }
    }

    /// Zero-width range at a position
    pub fn point(position: Position) -> Self {
        Self {
            start: position,
            end: position,
        }
    }
}

/// Location
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub uri: String,
    pub range: Range,
}

impl Location {
    pub fn new(uri: impl Into<String>, position: Position) -> Self {
        Self {
            uri: uri.into(),
            range: Range::point(position),
        }
    }
}

/// An immutable snapshot of one source file, split into lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    uri: String,
    lines: Vec<String>,
}

impl Document {
    /// Create a document from its full text
    pub fn new(uri: impl Into<String>, text: &str) -> Self {
        let mut lines: Vec<String> = text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
            .collect();
        // "a\n" is one line, "" is still one (empty) line
        if lines.len() > 1 && lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }
        Self {
            uri: uri.into(),
            lines,
        }
    }

    /// Create a document from pre-split lines
    pub fn from_lines<I, S>(uri: impl Into<String>, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut lines: Vec<String> = lines.into_iter().map(Into::into).collect();
        if lines.is_empty() {
            lines.push(String::new());
        }
        Self {
            uri: uri.into(),
            lines,
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Text of a line; out-of-range lines read as empty
    pub fn line_at(&self, line: usize) -> &str {
        self.lines.get(line).map(String::as_str).unwrap_or("")
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// Full text, lines joined with `\n`
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Text covered by a single-line range
    pub fn text_in(&self, range: Range) -> &str {
        let line = self.line_at(range.start.line as usize);
        let start = floor_char_boundary(line, range.start.character as usize);
        let end = floor_char_boundary(line, range.end.character as usize).max(start);
        &line[start..end]
    }

    /// Range of the first `pattern` match on the position's line that contains
    /// the position, both ends inclusive
    pub fn word_range_at(&self, position: Position, pattern: &Regex) -> Option<Range> {
        let line_no = position.line as usize;
        if line_no >= self.line_count() {
            return None;
        }
        let column = position.character as usize;
        pattern
            .find_iter(self.line_at(line_no))
            .find(|m| m.start() <= column && column <= m.end())
            .map(|m| Range::on_line(line_no, m.start(), m.end()))
    }

    /// Range spanning the whole document
    pub fn full_range(&self) -> Range {
        let last = self.line_count().saturating_sub(1);
        Range::new(
            Position::new(0, 0),
            Position::new(last, self.line_at(last).len()),
        )
    }
}

/// Largest char boundary in `text` that is `<= index`
pub(crate) fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    let mut index = index;
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

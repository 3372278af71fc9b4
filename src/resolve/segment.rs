//! Dotted identifier segmentation

use super::document::{Document, Position, Range};
use regex::Regex;
use std::sync::LazyLock;

/// `name(.name)*`, each name starting with a letter
pub static IDENTIFIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z][A-Za-z0-9_]*(?:\.[A-Za-z][A-Za-z0-9_]*)*").expect("identifier regex")
});

/// The segment of a dotted identifier under the cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickedSegment {
    /// Text of the clicked segment
    pub segment: String,
    /// Index of the clicked segment
    pub segment_index: usize,
    /// The whole dotted token
    pub full_identifier: String,
    /// The token split on `.`
    pub segments: Vec<String>,
    /// Range of the whole token
    pub range: Range,
}

impl ClickedSegment {
    /// The last segment, i.e. the unqualified name
    pub fn identifier(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }
}

/// Find which segment of the identifier at `position` was clicked
///
/// Segment bounds are inclusive on both ends, so a cursor sitting on a `.`
/// belongs to the segment before it.
pub fn segment_at(document: &Document, position: Position) -> Option<ClickedSegment> {
    let range = document.word_range_at(position, &IDENTIFIER_RE)?;
    let full_identifier = document.text_in(range).to_string();
    let segments: Vec<String> = full_identifier.split('.').map(str::to_string).collect();
    let offset = (position.character - range.start.character) as usize;

    let mut start = 0;
    for (segment_index, segment) in segments.iter().enumerate() {
        let end = start + segment.len();
        if start <= offset && offset <= end {
            return Some(ClickedSegment {
                segment: segment.clone(),
                segment_index,
                full_identifier,
                segments,
                range,
            });
        }
        start = end + 1;
    }
    None
}

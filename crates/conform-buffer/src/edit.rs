//! Types describing changes to a document's text.
//!
//! Edits use zero-based line and column offsets. Column offsets count UTF-8
//! bytes. Line positions handed in by editors are one-based and are converted
//! at the [`reconcile`](crate::reconcile) boundary.

use std::fmt;

/// Zero-based line and byte column inside a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    /// Line number (zero-based).
    pub line: u32,
    /// Column offset (zero-based, UTF-8 bytes).
    pub column: u32,
}

impl Position {
    /// Position at `line`, `column`.
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Span of text between two positions, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextRange {
    /// First position covered.
    pub start: Position,
    /// Position just past the span.
    pub end: Position,
}

impl TextRange {
    /// Span from `start` up to `end`.
    #[must_use]
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Empty span anchored at `position`.
    #[must_use]
    pub const fn point(position: Position) -> Self {
        Self {
            start: position,
            end: position,
        }
    }

    /// Returns true for an empty span.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Replacement of one span with new text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    range: TextRange,
    new_text: String,
}

impl TextEdit {
    /// Replaces `range` with `new_text`.
    #[must_use]
    pub fn new(range: TextRange, new_text: impl Into<String>) -> Self {
        Self {
            range,
            new_text: new_text.into(),
        }
    }

    /// Replaces the span `start..end` with `new_text`.
    #[must_use]
    pub fn from_positions(start: Position, end: Position, new_text: impl Into<String>) -> Self {
        Self::new(TextRange::new(start, end), new_text)
    }

    /// Inserts `new_text` at `position`.
    #[must_use]
    pub fn insert_at(position: Position, new_text: impl Into<String>) -> Self {
        Self::new(TextRange::point(position), new_text)
    }

    /// Removes the span `start..end`.
    #[must_use]
    pub fn delete_range(start: Position, end: Position) -> Self {
        Self::new(TextRange::new(start, end), String::new())
    }

    /// Range being replaced.
    #[must_use]
    pub const fn range(&self) -> TextRange {
        self.range
    }

    /// Start of the replaced range.
    #[must_use]
    pub const fn start(&self) -> Position {
        self.range.start
    }

    /// End of the replaced range.
    #[must_use]
    pub const fn end(&self) -> Position {
        self.range.end
    }

    /// Replacement text.
    #[must_use]
    pub fn new_text(&self) -> &str {
        &self.new_text
    }

    /// Returns true when the edit inserts without removing anything.
    #[must_use]
    pub fn is_insertion(&self) -> bool {
        self.range.is_empty() && !self.new_text.is_empty()
    }

    /// Returns true when the edit removes text without inserting any.
    #[must_use]
    pub fn is_deletion(&self) -> bool {
        !self.range.is_empty() && self.new_text.is_empty()
    }
}

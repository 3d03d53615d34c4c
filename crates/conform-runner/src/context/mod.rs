//! Immutable per-request execution context.
//!
//! An [`ExecutionContext`] captures everything a formatter's dynamic fields
//! may depend on: the document being formatted, its absolute path and
//! containing directory, and the optional range the request is scoped to.
//! Contexts are built once per formatting request and never mutated while a
//! pipeline runs.

use std::fmt;
use std::path::{Path, PathBuf};

/// Opaque identifier of an editor buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(u64);

impl DocumentId {
    /// Wraps a raw buffer number.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw buffer number.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A position addressed by 1-indexed line and 0-indexed byte column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    /// Line number (one-based).
    pub line: u32,
    /// Column offset (zero-based, UTF-8 bytes).
    pub column: u32,
}

impl Position {
    /// Creates a new position.
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

/// A span of a document, half-open on columns.
///
/// Ranges are always normalised so that `start <= end`, comparing lines
/// first and then columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    start: Position,
    end: Position,
}

impl Range {
    /// Builds a range, swapping the endpoints when given in reverse order.
    #[must_use]
    pub fn new(start: Position, end: Position) -> Self {
        if end < start {
            Self {
                start: end,
                end: start,
            }
        } else {
            Self { start, end }
        }
    }

    /// Builds a range covering whole lines `first..=last` (one-based).
    ///
    /// The end column is `u32::MAX`, which consumers clamp to the length of
    /// the final line.
    #[must_use]
    pub fn lines(first: u32, last: u32) -> Self {
        Self::new(Position::new(first, 0), Position::new(last, u32::MAX))
    }

    /// Start of the range (inclusive).
    #[must_use]
    pub const fn start(&self) -> Position {
        self.start
    }

    /// End of the range (exclusive on columns).
    #[must_use]
    pub const fn end(&self) -> Position {
        self.end
    }

    /// Returns true when `line` (one-based) falls inside the range's line span.
    #[must_use]
    pub const fn contains_line(&self, line: u32) -> bool {
        line >= self.start.line && line <= self.end.line
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Granularity of an editor selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionKind {
    /// Character-wise selection; columns are taken as given.
    #[default]
    Charwise,
    /// Line-wise selection; columns expand to cover the full lines.
    Linewise,
}

/// An active editor selection as reported by the host.
///
/// The anchor is where the selection started and the cursor is where it
/// currently ends, so a selection made backwards has `cursor < anchor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    anchor: Position,
    cursor: Position,
    kind: SelectionKind,
}

impl Selection {
    /// Creates a character-wise selection.
    #[must_use]
    pub const fn charwise(anchor: Position, cursor: Position) -> Self {
        Self {
            anchor,
            cursor,
            kind: SelectionKind::Charwise,
        }
    }

    /// Creates a line-wise selection.
    #[must_use]
    pub const fn linewise(anchor: Position, cursor: Position) -> Self {
        Self {
            anchor,
            cursor,
            kind: SelectionKind::Linewise,
        }
    }

    /// Selection granularity.
    #[must_use]
    pub const fn kind(&self) -> SelectionKind {
        self.kind
    }

    /// Normalises the selection into a [`Range`].
    ///
    /// Backward selections are swapped. Line-wise selections start at column
    /// zero and end at the byte length of the last selected line in `text`.
    #[must_use]
    pub fn to_range(&self, text: &str) -> Range {
        let range = Range::new(self.anchor, self.cursor);
        match self.kind {
            SelectionKind::Charwise => range,
            SelectionKind::Linewise => {
                let end_line = range.end().line;
                let width = line_width(text, end_line);
                Range::new(
                    Position::new(range.start().line, 0),
                    Position::new(end_line, width),
                )
            }
        }
    }
}

fn line_width(text: &str, line: u32) -> u32 {
    let index = usize::try_from(line.saturating_sub(1)).unwrap_or(usize::MAX);
    text.lines()
        .nth(index)
        .map_or(0, |content| u32::try_from(content.len()).unwrap_or(u32::MAX))
}

/// Immutable inputs a formatter's dynamic fields are resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    document: DocumentId,
    path: PathBuf,
    dirname: PathBuf,
    range: Option<Range>,
}

impl ExecutionContext {
    /// Creates a whole-buffer context for the document stored at `path`.
    #[must_use]
    pub fn new(document: DocumentId, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let dirname = path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Self {
            document,
            path,
            dirname,
            range: None,
        }
    }

    /// Starts building a context with optional range and selection inputs.
    #[must_use]
    pub fn builder(document: DocumentId, path: impl Into<PathBuf>) -> ContextBuilder {
        ContextBuilder {
            document,
            path: path.into(),
            range: None,
            selection: None,
        }
    }

    /// Restricts the context to `range`.
    #[must_use]
    pub const fn with_range(mut self, range: Range) -> Self {
        self.range = Some(range);
        self
    }

    /// Document identifier.
    #[must_use]
    pub const fn document(&self) -> DocumentId {
        self.document
    }

    /// Absolute path of the document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory containing the document.
    #[must_use]
    pub fn dirname(&self) -> &Path {
        &self.dirname
    }

    /// Range the request is scoped to, if any.
    #[must_use]
    pub const fn range(&self) -> Option<Range> {
        self.range
    }
}

/// Builder combining an explicit range with an active selection.
///
/// An explicit range always wins; otherwise an active selection is
/// normalised against the buffer text.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    document: DocumentId,
    path: PathBuf,
    range: Option<Range>,
    selection: Option<(Selection, String)>,
}

impl ContextBuilder {
    /// Supplies an explicit range.
    #[must_use]
    pub const fn range(mut self, range: Range) -> Self {
        self.range = Some(range);
        self
    }

    /// Supplies the active selection together with the buffer text it
    /// refers to.
    #[must_use]
    pub fn selection(mut self, selection: Selection, text: impl Into<String>) -> Self {
        self.selection = Some((selection, text.into()));
        self
    }

    /// Produces the immutable context.
    #[must_use]
    pub fn build(self) -> ExecutionContext {
        let range = self.range.or_else(|| {
            self.selection
                .as_ref()
                .map(|(selection, text)| selection.to_range(text))
        });
        let mut context = ExecutionContext::new(self.document, self.path);
        context.range = range;
        context
    }
}

/// Walks upward from `start` to the first directory containing any of
/// `markers`.
#[must_use]
pub fn find_root(start: &Path, markers: &[&str]) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| markers.iter().any(|marker| dir.join(marker).exists()))
        .map(Path::to_path_buf)
}

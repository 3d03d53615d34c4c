//! Text edit application.
//!
//! Positions are converted to byte offsets from the original content, so LF
//! and CRLF line endings are both handled without assuming a newline width.

use crate::edit::{Position, TextEdit};
use crate::error::BufferError;

/// Applies `edits` to `original`, producing the modified text.
///
/// Edits are applied from the end of the text towards the start so earlier
/// offsets stay valid. All positions refer to `original`.
///
/// # Errors
///
/// Returns [`BufferError::InvalidPosition`] when an edit points outside the
/// text or inside a line ending, and [`BufferError::OverlappingEdits`] when
/// two edits touch the same bytes.
pub fn apply_edits(original: &str, edits: &[TextEdit]) -> Result<String, BufferError> {
    let index = LineIndex::new(original);
    let mut spans = Vec::with_capacity(edits.len());
    for (order, edit) in edits.iter().enumerate() {
        let start = index.offset(edit.start())?;
        let end = index.offset(edit.end())?;
        if end < start {
            return Err(invalid(edit.end()));
        }
        spans.push((start, end, order, edit));
    }

    // Reverse order by position; insertions at the same point end up in list
    // order.
    spans.sort_by(|a, b| (b.0, b.1, b.2).cmp(&(a.0, a.1, a.2)));

    let mut result = original.to_owned();
    let mut floor = original.len();
    for (start, end, _, edit) in spans {
        if end > floor {
            return Err(BufferError::OverlappingEdits {
                line: edit.start().line,
            });
        }
        result.replace_range(start..end, edit.new_text());
        floor = start;
    }
    Ok(result)
}

fn invalid(position: Position) -> BufferError {
    BufferError::InvalidPosition {
        line: position.line,
        column: position.column,
    }
}

/// Byte offsets of every line start in a text.
#[derive(Debug, Clone)]
pub(crate) struct LineIndex<'a> {
    content: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub(crate) fn new(content: &'a str) -> Self {
        let mut starts = vec![0];
        starts.extend(
            content
                .bytes()
                .enumerate()
                .filter(|(_, byte)| *byte == b'\n')
                .map(|(idx, _)| idx + 1),
        );
        Self { content, starts }
    }

    /// Converts a line and column pair to a byte offset.
    ///
    /// The column may equal the line's length (end-of-line) but may not point
    /// into the line terminator.
    pub(crate) fn offset(&self, position: Position) -> Result<usize, BufferError> {
        let line_idx = usize::try_from(position.line).map_err(|_| invalid(position))?;
        let column = usize::try_from(position.column).map_err(|_| invalid(position))?;
        let line_start = *self.starts.get(line_idx).ok_or_else(|| invalid(position))?;
        let line_end = self
            .starts
            .get(line_idx + 1)
            .copied()
            .unwrap_or(self.content.len());

        let bytes = self.content.as_bytes();
        let content_end = if line_end > line_start && bytes.get(line_end - 1) == Some(&b'\n') {
            if line_end - 1 > line_start && bytes.get(line_end - 2) == Some(&b'\r') {
                line_end - 2
            } else {
                line_end - 1
            }
        } else {
            line_end
        };

        if column > content_end.saturating_sub(line_start) {
            return Err(invalid(position));
        }
        let offset = line_start + column;
        if !self.content.is_char_boundary(offset) {
            return Err(invalid(position));
        }
        Ok(offset)
    }

    /// Byte offset where zero-based `line` starts, or the text length past
    /// the final line.
    pub(crate) fn line_start(&self, line: u32) -> usize {
        usize::try_from(line)
            .ok()
            .and_then(|idx| self.starts.get(idx))
            .copied()
            .unwrap_or(self.content.len())
    }

    /// Converts a byte offset back into a position.
    pub(crate) fn position(&self, offset: usize) -> Position {
        let line_idx = self
            .starts
            .partition_point(|start| *start <= offset)
            .saturating_sub(1);
        let line_start = self.starts.get(line_idx).copied().unwrap_or_default();
        Position::new(
            u32::try_from(line_idx).unwrap_or(u32::MAX),
            u32::try_from(offset.saturating_sub(line_start)).unwrap_or(u32::MAX),
        )
    }
}

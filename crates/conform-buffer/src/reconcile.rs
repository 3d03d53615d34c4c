//! Applying a pipeline's final text back to a live document.
//!
//! Reconciliation diffs the formatted text against the snapshot taken before
//! the pipeline started and applies the result in one atomic step. A ranged
//! request only diffs the lines of its range. A document that changed in the
//! meantime is left alone.

use conform_runner::Range;
use tracing::{debug, warn};

use crate::apply::LineIndex;
use crate::diff::line_edits;
use crate::document::Document;
use crate::edit::{Position, TextEdit};
use crate::error::BufferError;
use crate::snapshot::DocumentSnapshot;

/// Tracing target for reconciliation.
const APPLY_TARGET: &str = "conform_buffer::apply";

/// Result of a successful reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The formatted text matched the document; nothing was written.
    Unchanged,
    /// The listed edits were applied as one change.
    Applied {
        /// Edits in document order, positions relative to the snapshot.
        edits: Vec<TextEdit>,
    },
}

impl ApplyOutcome {
    /// Returns true when the document was modified.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    /// Edits that were (or would be) applied.
    #[must_use]
    pub fn edits(&self) -> &[TextEdit] {
        match self {
            Self::Unchanged => &[],
            Self::Applied { edits } => edits,
        }
    }
}

/// Applies `formatted` to `document`.
///
/// `range` uses one-based lines, as produced by the context builder. When it
/// is present only the lines it covers are changed.
///
/// # Errors
///
/// Returns [`BufferError::DocumentMismatch`] for a snapshot of another
/// document, [`BufferError::ConcurrentModification`] when the document's
/// text moved on since the snapshot, or any error raised while applying the
/// edits.
pub fn reconcile<D: Document + ?Sized>(
    document: &mut D,
    snapshot: &DocumentSnapshot,
    formatted: &str,
    range: Option<Range>,
) -> Result<ApplyOutcome, BufferError> {
    let outcome = dry_run(document, snapshot, formatted, range)?;
    if let ApplyOutcome::Applied { edits } = &outcome {
        document.apply_edits(edits)?;
        debug!(
            target: APPLY_TARGET,
            document = %snapshot.document(),
            edits = edits.len(),
            "formatted text applied"
        );
    }
    Ok(outcome)
}

/// Computes what [`reconcile`] would do without touching the document.
///
/// # Errors
///
/// Returns the same staleness errors as [`reconcile`].
pub fn dry_run<D: Document + ?Sized>(
    document: &D,
    snapshot: &DocumentSnapshot,
    formatted: &str,
    range: Option<Range>,
) -> Result<ApplyOutcome, BufferError> {
    ensure_current(document, snapshot)?;

    let edits = match range {
        Some(bounds) => range_edits(snapshot.text(), formatted, bounds),
        None => line_edits(snapshot.text(), formatted),
    };

    if edits.is_empty() {
        debug!(target: APPLY_TARGET, document = %snapshot.document(), "no changes to apply");
        return Ok(ApplyOutcome::Unchanged);
    }
    Ok(ApplyOutcome::Applied { edits })
}

/// Rejects snapshots that no longer describe the document.
///
/// A tick change alone is tolerated when the text is identical, which covers
/// an undo followed by a redo.
fn ensure_current<D: Document + ?Sized>(
    document: &D,
    snapshot: &DocumentSnapshot,
) -> Result<(), BufferError> {
    if document.id() != snapshot.document() {
        return Err(BufferError::DocumentMismatch {
            snapshot: snapshot.document(),
            document: document.id(),
        });
    }
    if snapshot.is_current(document) || document.text() == snapshot.text() {
        return Ok(());
    }
    warn!(
        target: APPLY_TARGET,
        document = %snapshot.document(),
        expected = snapshot.tick(),
        actual = document.change_tick(),
        "document modified during formatting, discarding result"
    );
    Err(BufferError::ConcurrentModification {
        document: snapshot.document(),
        expected: snapshot.tick(),
        actual: document.change_tick(),
    })
}

/// Edits confined to the lines of `range`.
///
/// When `formatted` keeps the text around the range byte for byte, only the
/// range's lines are diffed, so a change can never be attributed to a
/// matching line outside them. Otherwise the whole text is diffed and edits
/// reaching past the range are dropped.
fn range_edits(original: &str, formatted: &str, range: Range) -> Vec<TextEdit> {
    let index = LineIndex::new(original);
    let first_line = range.start().line.saturating_sub(1);
    let start = index.line_start(first_line);
    let end = index.line_start(range.end().line).max(start);
    let before = original.get(..start).unwrap_or_default();
    let region = original.get(start..end).unwrap_or_default();
    let after = original.get(end..).unwrap_or_default();

    let replacement = formatted
        .strip_prefix(before)
        .and_then(|rest| rest.strip_suffix(after));
    let Some(replacement) = replacement else {
        return line_edits(original, formatted)
            .into_iter()
            .filter(|edit| within(edit, range))
            .collect();
    };
    let offset = index.position(start).line;
    line_edits(region, replacement)
        .into_iter()
        .map(|edit| shift(&edit, offset))
        .collect()
}

/// Moves `edit` down by `lines`.
fn shift(edit: &TextEdit, lines: u32) -> TextEdit {
    let moved = |at: Position| Position::new(at.line.saturating_add(lines), at.column);
    TextEdit::from_positions(moved(edit.start()), moved(edit.end()), edit.new_text())
}

/// Returns true when `edit` lies within the whole lines of `range`.
fn within(edit: &TextEdit, range: Range) -> bool {
    let first = Position::new(range.start().line.saturating_sub(1), 0);
    let past_last = Position::new(range.end().line, 0);
    edit.start() >= first && edit.end() <= past_last
}

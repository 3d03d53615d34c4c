//! The document abstraction formatted text is applied to.

use conform_runner::DocumentId;
use tracing::debug;

use crate::apply::apply_edits;
use crate::edit::TextEdit;
use crate::error::BufferError;

/// Tracing target for document mutation.
const DOCUMENT_TARGET: &str = "conform_buffer::document";

/// A live, mutable text buffer.
///
/// The change tick increases on every mutation, so a reader can tell whether
/// the buffer moved on since it last looked.
pub trait Document {
    /// Identifier of the buffer.
    fn id(&self) -> DocumentId;

    /// Current text.
    fn text(&self) -> String;

    /// Monotonic change counter.
    fn change_tick(&self) -> u64;

    /// Applies `edits` as one atomic change.
    ///
    /// Either every edit lands and the tick advances once, or the document is
    /// left untouched.
    ///
    /// # Errors
    ///
    /// Returns a [`BufferError`] when an edit is invalid for the current text.
    fn apply_edits(&mut self, edits: &[TextEdit]) -> Result<(), BufferError>;
}

/// In-memory [`Document`] implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryDocument {
    id: DocumentId,
    text: String,
    tick: u64,
    applied_batches: usize,
}

impl MemoryDocument {
    /// Creates a document holding `text` at tick zero.
    #[must_use]
    pub fn new(id: DocumentId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            tick: 0,
            applied_batches: 0,
        }
    }

    /// Replaces the whole text, as a user edit would.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.tick += 1;
    }

    /// Advances the tick without changing the text, as an undo followed by
    /// a redo would.
    pub const fn touch(&mut self) {
        self.tick += 1;
    }

    /// Current text without copying.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Number of edit batches applied through [`Document::apply_edits`].
    #[must_use]
    pub const fn applied_batches(&self) -> usize {
        self.applied_batches
    }
}

impl Document for MemoryDocument {
    fn id(&self) -> DocumentId {
        self.id
    }

    fn text(&self) -> String {
        self.text.clone()
    }

    fn change_tick(&self) -> u64 {
        self.tick
    }

    fn apply_edits(&mut self, edits: &[TextEdit]) -> Result<(), BufferError> {
        let updated = apply_edits(&self.text, edits)?;
        self.text = updated;
        self.tick += 1;
        self.applied_batches += 1;
        debug!(
            target: DOCUMENT_TARGET,
            document = %self.id,
            edits = edits.len(),
            tick = self.tick,
            "edits applied"
        );
        Ok(())
    }
}

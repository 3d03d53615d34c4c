//! Point-in-time copies of a document.

use conform_runner::DocumentId;

use crate::document::Document;

/// Text and change tick of a document, captured before formatting starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSnapshot {
    document: DocumentId,
    text: String,
    tick: u64,
}

impl DocumentSnapshot {
    /// Captures the current state of `document`.
    #[must_use]
    pub fn capture<D: Document + ?Sized>(document: &D) -> Self {
        Self {
            document: document.id(),
            text: document.text(),
            tick: document.change_tick(),
        }
    }

    /// Document the snapshot was taken from.
    #[must_use]
    pub const fn document(&self) -> DocumentId {
        self.document
    }

    /// Text at capture time.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Change tick at capture time.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Returns true when `document` has not changed since capture.
    #[must_use]
    pub fn is_current<D: Document + ?Sized>(&self, document: &D) -> bool {
        document.change_tick() == self.tick
    }
}

//! Error types for document reconciliation.

use conform_runner::DocumentId;
use thiserror::Error;

/// Errors raised while applying formatted text to a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    /// An edit referenced a position outside the document.
    #[error("invalid position: line {line}, column {column}")]
    InvalidPosition {
        /// Line number (zero-based).
        line: u32,
        /// Column offset (zero-based, UTF-8 bytes).
        column: u32,
    },

    /// Edits overlap, so their combined effect is ambiguous.
    #[error("overlapping edits at line {line}")]
    OverlappingEdits {
        /// Line where the overlap starts (zero-based).
        line: u32,
    },

    /// The document changed after the snapshot was taken.
    #[error(
        "document {document} was modified while formatting (tick {expected} at start, now {actual})"
    )]
    ConcurrentModification {
        /// Affected document.
        document: DocumentId,
        /// Change tick recorded in the snapshot.
        expected: u64,
        /// Change tick observed at apply time.
        actual: u64,
    },

    /// A snapshot was reconciled against a different document.
    #[error("snapshot of document {snapshot} cannot be applied to document {document}")]
    DocumentMismatch {
        /// Document the snapshot was taken from.
        snapshot: DocumentId,
        /// Document reconciliation targeted.
        document: DocumentId,
    },
}

impl BufferError {
    /// Returns true when the error is a concurrent modification.
    #[must_use]
    pub const fn is_concurrent_modification(&self) -> bool {
        matches!(self, Self::ConcurrentModification { .. })
    }
}

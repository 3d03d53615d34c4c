//! Document model and reconciliation of formatted text.
//!
//! The `conform-buffer` crate owns the only shared mutable resource of a
//! formatting request: the document. A [`DocumentSnapshot`] is taken before a
//! pipeline runs; afterwards [`reconcile`] turns the pipeline's final text into
//! minimal [`TextEdit`]s and applies them atomically, unless the document was
//! modified in the meantime.
//!
//! # Example
//!
//! ```rust
//! use conform_buffer::{ApplyOutcome, Document, DocumentSnapshot, MemoryDocument, reconcile};
//! use conform_runner::DocumentId;
//!
//! let mut document = MemoryDocument::new(DocumentId::new(1), "x=1\n");
//! let snapshot = DocumentSnapshot::capture(&document);
//! let outcome = reconcile(&mut document, &snapshot, "x = 1\n", None).expect("reconcile");
//! assert!(matches!(outcome, ApplyOutcome::Applied { .. }));
//! assert_eq!(document.text(), "x = 1\n");
//! ```

pub mod apply;
pub mod diff;
pub mod document;
pub mod edit;
pub mod error;
pub mod reconcile;
pub mod snapshot;

#[cfg(test)]
mod tests;

pub use self::apply::apply_edits;
pub use self::diff::line_edits;
pub use self::document::{Document, MemoryDocument};
pub use self::edit::{Position, TextEdit, TextRange};
pub use self::error::BufferError;
pub use self::reconcile::{ApplyOutcome, dry_run, reconcile};
pub use self::snapshot::DocumentSnapshot;

//! Minimal edits between two versions of a text.
//!
//! A line diff finds the changed regions; each region then has its common
//! prefix and suffix trimmed so an edit only touches bytes that actually
//! differ. A formatter that only adds a trailing newline therefore produces a
//! single insertion at the end of the file rather than a rewrite of the last
//! line. Trimming never splits a `\r\n` pair.

use similar::{ChangeTag, TextDiff};

use crate::apply::LineIndex;
use crate::edit::TextEdit;

/// Computes the edits turning `old` into `new`.
///
/// Edits are ordered by position, never overlap, and refer to `old`. A
/// changed region that keeps its line count yields one edit per line, so
/// callers can discard edits outside a line range without losing the rest.
#[must_use]
pub fn line_edits(old: &str, new: &str) -> Vec<TextEdit> {
    if old == new {
        return Vec::new();
    }

    let index = LineIndex::new(old);
    let diff = TextDiff::from_lines(old, new);
    let mut edits = Vec::new();
    let mut old_offset = 0;
    let mut new_offset = 0;
    let mut hunk = Hunk::default();

    for change in diff.iter_all_changes() {
        let len = change.value().len();
        match change.tag() {
            ChangeTag::Equal => {
                hunk.flush(&mut edits, &index, old, new);
                old_offset += len;
                new_offset += len;
            }
            ChangeTag::Delete => {
                hunk.removed.push((old_offset, old_offset + len));
                hunk.anchor_new(new_offset);
                old_offset += len;
            }
            ChangeTag::Insert => {
                hunk.added.push((new_offset, new_offset + len));
                hunk.anchor_old(old_offset);
                new_offset += len;
            }
        }
    }
    hunk.flush(&mut edits, &index, old, new);
    edits
}

/// Lines removed and added between two unchanged regions.
#[derive(Debug, Default)]
struct Hunk {
    removed: Vec<(usize, usize)>,
    added: Vec<(usize, usize)>,
    old_anchor: Option<usize>,
    new_anchor: Option<usize>,
}

impl Hunk {
    /// Records where the hunk starts in the old text when it only adds.
    const fn anchor_old(&mut self, offset: usize) {
        if self.old_anchor.is_none() {
            self.old_anchor = Some(offset);
        }
    }

    /// Records where the hunk starts in the new text when it only removes.
    const fn anchor_new(&mut self, offset: usize) {
        if self.new_anchor.is_none() {
            self.new_anchor = Some(offset);
        }
    }

    fn flush(&mut self, edits: &mut Vec<TextEdit>, index: &LineIndex<'_>, old: &str, new: &str) {
        let removed = std::mem::take(&mut self.removed);
        let added = std::mem::take(&mut self.added);
        let old_anchor = self.old_anchor.take();
        let new_anchor = self.new_anchor.take();
        if removed.is_empty() && added.is_empty() {
            return;
        }

        if removed.len() == added.len() {
            for (old_span, new_span) in removed.into_iter().zip(added) {
                push_edit(edits, index, old, new, old_span, new_span);
            }
            return;
        }

        let old_span = span(&removed).or_else(|| old_anchor.map(|at| (at, at)));
        let new_span = span(&added).or_else(|| new_anchor.map(|at| (at, at)));
        if let (Some(old_span), Some(new_span)) = (old_span, new_span) {
            push_edit(edits, index, old, new, old_span, new_span);
        }
    }
}

/// Byte span covering consecutive line spans.
fn span(lines: &[(usize, usize)]) -> Option<(usize, usize)> {
    Some((lines.first()?.0, lines.last()?.1))
}

fn push_edit(
    edits: &mut Vec<TextEdit>,
    index: &LineIndex<'_>,
    old: &str,
    new: &str,
    (old_start, old_end): (usize, usize),
    (new_start, new_end): (usize, usize),
) {
    let old_hunk = old.get(old_start..old_end).unwrap_or_default();
    let new_hunk = new.get(new_start..new_end).unwrap_or_default();
    let prefix = common_prefix(old_hunk, new_hunk);
    let limit = old_hunk.len().min(new_hunk.len()) - prefix;
    let suffix = common_suffix(old_hunk, new_hunk, limit);

    let replaced_start = old_start + prefix;
    let replaced_end = old_end - suffix;
    let replacement = new_hunk
        .get(prefix..new_hunk.len() - suffix)
        .unwrap_or_default();
    if replaced_start == replaced_end && replacement.is_empty() {
        return;
    }
    edits.push(TextEdit::from_positions(
        index.position(replaced_start),
        index.position(replaced_end),
        replacement,
    ));
}

/// Length in bytes of the shared prefix, never ending between `\r` and `\n`.
fn common_prefix(a: &str, b: &str) -> usize {
    let len: usize = a
        .chars()
        .zip(b.chars())
        .take_while(|(left, right)| left == right)
        .map(|(ch, _)| ch.len_utf8())
        .sum();
    if a.get(..len).is_some_and(|shared| shared.ends_with('\r')) {
        len - 1
    } else {
        len
    }
}

/// Length in bytes of the shared suffix, at most `limit`, never starting
/// between `\r` and `\n` in `a`.
fn common_suffix(a: &str, b: &str, limit: usize) -> usize {
    let mut len = 0;
    for (left, right) in a.chars().rev().zip(b.chars().rev()) {
        if left != right || len + left.len_utf8() > limit {
            break;
        }
        len += left.len_utf8();
    }
    let splits_crlf = a
        .get(..a.len() - len)
        .is_some_and(|rest| rest.ends_with('\r'))
        && a.get(a.len() - len..)
            .is_some_and(|shared| shared.starts_with('\n'));
    if splits_crlf { len - 1 } else { len }
}

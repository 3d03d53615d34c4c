//! Extraction and re-insertion of the lines a range covers.
//!
//! Formatters without range arguments only ever see the lines of the
//! requested range; their output replaces exactly those lines.

use crate::context::Range;

/// Byte span of the whole lines covered by a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LineSpan {
    start: usize,
    end: usize,
}

impl LineSpan {
    /// Finds the lines of `text` covered by `range`, clamped to the text.
    pub(crate) fn locate(text: &str, range: Range) -> Self {
        let first = to_index(range.start().line.saturating_sub(1));
        let last = to_index(range.end().line);
        let start = line_start(text, first);
        let end = line_start(text, last).max(start);
        Self { start, end }
    }

    /// Text of the covered lines, including their line endings.
    pub(crate) fn text<'a>(&self, text: &'a str) -> &'a str {
        text.get(self.start..self.end).unwrap_or_default()
    }

    /// Replaces the covered lines of `text` with `replacement`.
    ///
    /// When the covered lines ended with a newline and the replacement does
    /// not, one is added so the following line stays separate.
    pub(crate) fn splice(&self, text: &str, replacement: &str) -> String {
        let before = text.get(..self.start).unwrap_or_default();
        let after = text.get(self.end..).unwrap_or_default();
        let mut spliced = String::with_capacity(before.len() + replacement.len() + after.len() + 1);
        spliced.push_str(before);
        spliced.push_str(replacement);
        if self.text(text).ends_with('\n') && !replacement.ends_with('\n') && !after.is_empty() {
            spliced.push('\n');
        }
        spliced.push_str(after);
        spliced
    }
}

/// Produces the next current text from a stage's output.
pub(crate) fn merge(span: Option<&LineSpan>, current: &str, formatted: String) -> String {
    let Some(found) = span else {
        return formatted;
    };
    found.splice(current, &formatted)
}

fn to_index(line: u32) -> usize {
    usize::try_from(line).unwrap_or(usize::MAX)
}

/// Byte offset where zero-based `line` starts, or the text length past the
/// final line.
fn line_start(text: &str, line: usize) -> usize {
    if line == 0 {
        return 0;
    }
    text.match_indices('\n')
        .nth(line - 1)
        .map_or(text.len(), |(offset, _)| offset + 1)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const TEXT: &str = "one\ntwo\nthree\nfour\n";

    #[rstest]
    #[case(Range::lines(2, 3), "two\nthree\n")]
    #[case(Range::lines(1, 1), "one\n")]
    #[case(Range::lines(4, 9), "four\n")]
    #[case(Range::lines(7, 9), "")]
    fn locate_covers_whole_lines(#[case] range: Range, #[case] expected: &str) {
        let span = LineSpan::locate(TEXT, range);
        assert_eq!(span.text(TEXT), expected);
    }

    #[test]
    fn splice_replaces_only_covered_lines() {
        let span = LineSpan::locate(TEXT, Range::lines(2, 3));
        assert_eq!(span.splice(TEXT, "TWO\nTHREE\n"), "one\nTWO\nTHREE\nfour\n");
    }

    #[test]
    fn splice_restores_missing_newline_before_following_line() {
        let span = LineSpan::locate(TEXT, Range::lines(2, 2));
        assert_eq!(span.splice(TEXT, "TWO"), "one\nTWO\nthree\nfour\n");
    }

    #[test]
    fn merge_without_span_takes_output() {
        assert_eq!(merge(None, TEXT, String::from("new\n")), "new\n");
    }
}

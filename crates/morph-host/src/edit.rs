//! Byte-range text edits
//!
//! Edits are collected against one snapshot of a unit and applied as a
//! batch. A batch must not contain overlapping ranges; two insertions at
//! the same offset are allowed and keep their batch order.

use std::ops::Range;
use std::path::Path;

use tree_sitter::Node;

use crate::error::HostError;

/// Replace `range` of a unit's text with `replacement`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    /// Byte range in the snapshot the edit was computed against
    pub range: Range<usize>,
    /// New text
    pub replacement: String,
}

impl TextEdit {
    /// Replace a byte range
    #[must_use]
    pub fn replace(range: Range<usize>, replacement: impl Into<String>) -> Self {
        Self {
            range,
            replacement: replacement.into(),
        }
    }

    /// Replace the full text of a node
    #[must_use]
    pub fn replace_node(node: Node<'_>, replacement: impl Into<String>) -> Self {
        Self::replace(node.byte_range(), replacement)
    }

    /// Insert text at an offset
    #[must_use]
    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self::replace(at..at, text)
    }

    /// Delete a byte range
    #[must_use]
    pub fn delete(range: Range<usize>) -> Self {
        Self::replace(range, String::new())
    }

    /// Whether this edit fully contains `other`
    #[inline]
    #[must_use]
    pub fn contains(&self, other: &TextEdit) -> bool {
        self.range.start <= other.range.start && other.range.end <= self.range.end
    }

    /// Whether the two edits touch the same bytes
    #[inline]
    #[must_use]
    pub fn overlaps(&self, other: &TextEdit) -> bool {
        self.range.start < other.range.end && other.range.start < self.range.end
    }
}

/// Apply a batch of edits to `text`, returning the new text
///
/// # Errors
///
/// Returns [`HostError::EditOutOfBounds`] when a range falls outside the
/// text or splits a character, and [`HostError::OverlappingEdits`] when two
/// ranges intersect.
pub fn apply_edits(path: &Path, text: &str, mut edits: Vec<TextEdit>) -> Result<String, HostError> {
    for edit in &edits {
        let Range { start, end } = edit.range;
        if start > end
            || end > text.len()
            || !text.is_char_boundary(start)
            || !text.is_char_boundary(end)
        {
            return Err(HostError::EditOutOfBounds {
                path: path.to_path_buf(),
                range: edit.range.clone(),
                len: text.len(),
            });
        }
    }

    // stable: insertions at one offset keep batch order
    edits.sort_by_key(|edit| (edit.range.start, edit.range.end));
    for pair in edits.windows(2) {
        if pair[0].range.end > pair[1].range.start {
            return Err(HostError::OverlappingEdits {
                path: path.to_path_buf(),
                first: pair[0].range.clone(),
                second: pair[1].range.clone(),
            });
        }
    }

    let mut out = text.to_string();
    for edit in edits.iter().rev() {
        out.replace_range(edit.range.clone(), &edit.replacement);
    }
    Ok(out)
}

/// Drop every edit that overlaps an earlier, wider edit
///
/// Outer edits win. Dropped edits are expected to be recomputed against
/// the reparsed unit on the next round.
#[must_use]
pub fn retain_outermost(mut edits: Vec<TextEdit>) -> Vec<TextEdit> {
    edits.sort_by(|a, b| {
        a.range
            .start
            .cmp(&b.range.start)
            .then(b.range.end.cmp(&a.range.end))
    });
    let mut kept: Vec<TextEdit> = Vec::with_capacity(edits.len());
    for edit in edits {
        if kept.iter().any(|k| k.overlaps(&edit) || k.range == edit.range) {
            continue;
        }
        kept.push(edit);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn path() -> &'static Path {
        Path::new("unit.ts")
    }

    #[test]
    fn applies_batch_against_original_offsets() {
        let text = "const a = b + c;";
        let edits = vec![
            TextEdit::replace(10..11, "bb"),
            TextEdit::replace(14..15, "cc"),
            TextEdit::insert(0, "export "),
        ];
        let out = apply_edits(path(), text, edits).unwrap();
        assert_eq!(out, "export const a = bb + cc;");
    }

    #[test]
    fn rejects_overlap() {
        let edits = vec![TextEdit::replace(0..5, "x"), TextEdit::replace(3..8, "y")];
        let err = apply_edits(path(), "0123456789", edits).unwrap_err();
        assert!(matches!(err, HostError::OverlappingEdits { .. }));
    }

    #[test]
    fn rejects_out_of_bounds() {
        let err = apply_edits(path(), "abc", vec![TextEdit::delete(2..9)]).unwrap_err();
        assert!(matches!(err, HostError::EditOutOfBounds { len: 3, .. }));
    }

    #[test]
    fn adjacent_edits_are_fine() {
        let edits = vec![TextEdit::replace(0..2, "A"), TextEdit::replace(2..4, "B")];
        assert_eq!(apply_edits(path(), "aabb", edits).unwrap(), "AB");
    }

    #[test]
    fn outermost_wins() {
        let edits = vec![
            TextEdit::replace(4..6, "inner"),
            TextEdit::replace(0..10, "outer"),
            TextEdit::replace(12..14, "other"),
        ];
        let kept = retain_outermost(edits);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].replacement, "outer");
        assert_eq!(kept[1].replacement, "other");
    }
}

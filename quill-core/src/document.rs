//! Rich text document state: plain text plus formatting spans.
//!
//! Positions throughout are character indices (not bytes), half-open
//! ranges `[from, to)`. Mutations clamp out-of-range positions instead of
//! failing so that replaying a well-formed history is total.

use serde::{Deserialize, Serialize};

/// A formatting mark kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarkKind {
    Bold,
    Italic,
    Strikethrough,
    Code,
}

/// A mark applied over the character range `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkSpan {
    pub kind: MarkKind,
    pub start: usize,
    pub end: usize,
}

/// Materialized document state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub text: String,
    pub marks: Vec<MarkSpan>,
}

impl Snapshot {
    /// Length in characters.
    pub fn len_chars(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// First non-blank line, trimmed. Used by metadata refresh hooks to
    /// derive a display title from content.
    pub fn derived_title(&self) -> Option<String> {
        self.text
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_owned)
    }

    /// Insert `content` at character position `at` (clamped to the end).
    ///
    /// Marks at or after the insertion point shift right; a mark spanning
    /// the insertion point grows to cover the inserted text.
    pub fn insert_text(&mut self, at: usize, content: &str) {
        let at = at.min(self.len_chars());
        let byte = byte_index(&self.text, at);
        self.text.insert_str(byte, content);

        let n = content.chars().count();
        for mark in &mut self.marks {
            if mark.start >= at {
                mark.start += n;
            }
            if mark.end > at {
                mark.end += n;
            }
        }
    }

    /// Delete the character range `[from, to)` (clamped).
    ///
    /// Marks are remapped through the deletion; spans that collapse to
    /// zero width are dropped.
    pub fn delete_range(&mut self, from: usize, to: usize) {
        let len = self.len_chars();
        let from = from.min(len);
        let to = to.min(len).max(from);
        if from == to {
            return;
        }

        let start_byte = byte_index(&self.text, from);
        let end_byte = byte_index(&self.text, to);
        self.text.replace_range(start_byte..end_byte, "");

        let map = |p: usize| {
            if p <= from {
                p
            } else if p >= to {
                p - (to - from)
            } else {
                from
            }
        };
        for mark in &mut self.marks {
            mark.start = map(mark.start);
            mark.end = map(mark.end);
        }
        self.marks.retain(|m| m.start < m.end);
    }

    /// Add a mark over `[from, to)`. Duplicate spans are ignored.
    pub fn add_mark(&mut self, from: usize, to: usize, kind: MarkKind) {
        let len = self.len_chars();
        let from = from.min(len);
        let to = to.min(len);
        if from >= to {
            return;
        }
        let span = MarkSpan { kind, start: from, end: to };
        if !self.marks.contains(&span) {
            self.marks.push(span);
        }
    }

    /// Remove `kind` from `[from, to)`, splitting spans that only
    /// partially overlap the range.
    pub fn remove_mark(&mut self, from: usize, to: usize, kind: MarkKind) {
        if from >= to {
            return;
        }
        let mut kept = Vec::with_capacity(self.marks.len());
        for mark in self.marks.drain(..) {
            if mark.kind != kind || mark.end <= from || mark.start >= to {
                kept.push(mark);
                continue;
            }
            // Left remainder before the cleared range.
            if mark.start < from {
                kept.push(MarkSpan { kind, start: mark.start, end: from });
            }
            // Right remainder after the cleared range.
            if mark.end > to {
                kept.push(MarkSpan { kind, start: to, end: mark.end });
            }
        }
        self.marks = kept;
    }
}

/// Byte offset of character index `at` (text length if past the end).
fn byte_index(text: &str, at: usize) -> usize {
    text.char_indices()
        .nth(at)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

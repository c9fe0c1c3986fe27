//! Edit operations and positional transformation.
//!
//! Operations are a closed tagged enum so `apply` and `transform` are
//! exhaustively matched; adding an operation kind is a compile-time-checked
//! change everywhere it matters.

use serde::{Deserialize, Serialize};

use crate::document::MarkKind;

/// A single structured edit. Positions are character indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Insert `content` at position `at`.
    InsertText { at: usize, content: String },
    /// Delete the range `[from, to)`.
    DeleteText { from: usize, to: usize },
    /// Apply `mark` over `[from, to)`.
    AddMark { from: usize, to: usize, mark: MarkKind },
    /// Clear `mark` from `[from, to)`.
    RemoveMark { from: usize, to: usize, mark: MarkKind },
}

impl Operation {
    /// Rewrite this not-yet-committed operation so it applies correctly
    /// after `committed` has already landed.
    ///
    /// Position mapping: a committed insert shifts positions at or after
    /// its insertion point right (ties shift, so a pending edit at the same
    /// position lands after the committed one, preserving log order); a
    /// committed delete pulls positions past it left and collapses
    /// positions inside it onto the deletion point. Mark operations do not
    /// move text and leave positions unchanged.
    pub fn transformed_against(&self, committed: &Operation) -> Operation {
        match *self {
            Operation::InsertText { at, ref content } => Operation::InsertText {
                at: map_position(at, committed),
                content: content.clone(),
            },
            Operation::DeleteText { from, to } => {
                let (from, to) = map_range(from, to, committed);
                Operation::DeleteText { from, to }
            }
            Operation::AddMark { from, to, mark } => {
                let (from, to) = map_range(from, to, committed);
                Operation::AddMark { from, to, mark }
            }
            Operation::RemoveMark { from, to, mark } => {
                let (from, to) = map_range(from, to, committed);
                Operation::RemoveMark { from, to, mark }
            }
        }
    }
}

fn map_position(p: usize, committed: &Operation) -> usize {
    match *committed {
        Operation::InsertText { at, ref content } => {
            if p >= at {
                p + content.chars().count()
            } else {
                p
            }
        }
        Operation::DeleteText { from, to } => {
            let to = to.max(from);
            if p <= from {
                p
            } else if p >= to {
                p - (to - from)
            } else {
                from
            }
        }
        Operation::AddMark { .. } | Operation::RemoveMark { .. } => p,
    }
}

fn map_range(from: usize, to: usize, committed: &Operation) -> (usize, usize) {
    let from = map_position(from, committed);
    let to = map_position(to, committed).max(from);
    (from, to)
}

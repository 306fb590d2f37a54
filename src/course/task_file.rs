//! Task files: a source file plus its answer placeholders.

use indexmap::IndexMap;
use smol_str::SmolStr;

use super::placeholder::{AnswerPlaceholder, StudyStatus};
use crate::base::{LineIndex, TextSize};
use crate::document::TextEdit;
use crate::error::{CheckError, Result};

/// The placeholders of one exercise file, keyed by placeholder index.
///
/// Cloning a task file gives an independent copy whose placeholders can be
/// moved around without touching the original.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TaskFile {
    name: SmolStr,
    placeholders: IndexMap<usize, AnswerPlaceholder>,
}

impl TaskFile {
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            placeholders: IndexMap::new(),
        }
    }

    /// File name of the backing exercise file.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a placeholder, replacing any existing one with the same index.
    pub fn add(&mut self, placeholder: AnswerPlaceholder) {
        self.placeholders.insert(placeholder.index, placeholder);
    }

    pub fn with_placeholder(mut self, placeholder: AnswerPlaceholder) -> Self {
        self.add(placeholder);
        self
    }

    pub fn placeholder(&self, index: usize) -> Result<&AnswerPlaceholder> {
        self.placeholders
            .get(&index)
            .ok_or(CheckError::PlaceholderNotFound(index))
    }

    pub fn placeholder_mut(&mut self, index: usize) -> Result<&mut AnswerPlaceholder> {
        self.placeholders
            .get_mut(&index)
            .ok_or(CheckError::PlaceholderNotFound(index))
    }

    /// Iterate placeholders in insertion order.
    pub fn placeholders(&self) -> impl Iterator<Item = &AnswerPlaceholder> + '_ {
        self.placeholders.values()
    }

    pub fn set_status(&mut self, index: usize, status: StudyStatus) -> Result<()> {
        self.placeholder_mut(index)?.status = status;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.placeholders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placeholders.is_empty()
    }

    /// Move placeholders to follow a document edit.
    ///
    /// `before` indexes the text the placeholders currently describe and
    /// `after` the text once `edit` has been applied.
    pub fn track_edit(&mut self, before: &LineIndex, edit: &TextEdit, after: &LineIndex) {
        for placeholder in self.placeholders.values_mut() {
            let Some(start) = before.offset(placeholder.position()) else {
                continue;
            };
            let start = u32::from(start);
            let (new_start, new_length) = shift_span(start, placeholder.length, edit);
            let pos = after.line_col(TextSize::from(new_start));
            placeholder.line = pos.line;
            placeholder.start = pos.col;
            placeholder.length = new_length;
        }
    }
}

/// New `(start, length)` of a span after `edit`.
///
/// Results saturate at the bounds of `u32`.
fn shift_span(start: u32, length: u32, edit: &TextEdit) -> (u32, u32) {
    let start = i64::from(start);
    let end = start + i64::from(length);
    let edit_start = i64::from(u32::from(edit.range.start()));
    let edit_end = i64::from(u32::from(edit.range.end()));
    let delta = edit.delta();
    let clamp = |value: i64| value.clamp(0, i64::from(u32::MAX)) as u32;
    let apply = |value: i64| clamp(value + delta);

    if edit_start >= start && edit_end <= end {
        // inside, or an insertion touching either boundary
        (clamp(start), apply(end - start))
    } else if edit_end <= start {
        (apply(start), clamp(end - start))
    } else if edit_start >= end {
        (clamp(start), clamp(end - start))
    } else {
        let union_start = start.min(edit_start);
        let union_end = end.max(edit_end);
        (clamp(union_start), apply(union_end - union_start))
    }
}

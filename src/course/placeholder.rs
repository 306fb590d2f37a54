//! Answer placeholders.

use crate::base::{LineCol, LineIndex, TextRange, TextSize};
use crate::document::Document;
use crate::error::{CheckError, Result};

/// Check status of a single placeholder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StudyStatus {
    #[default]
    Unchecked,
    Solved,
    Failed,
}

/// A blanked-out region of an exercise file where the user types an answer.
///
/// Position is stored as a line plus a byte column so that it survives
/// edits on other lines; [`AnswerPlaceholder::real_start_offset`] resolves it
/// against a concrete document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnswerPlaceholder {
    /// Position within the owning task file (unique per file)
    pub index: usize,
    /// 0-indexed line of the first byte
    pub line: u32,
    /// Byte column of the first byte within `line`
    pub start: u32,
    /// Length in bytes
    pub length: u32,
    pub status: StudyStatus,
}

impl AnswerPlaceholder {
    pub fn new(index: usize, line: u32, start: u32, length: u32) -> Self {
        Self {
            index,
            line,
            start,
            length,
            status: StudyStatus::Unchecked,
        }
    }

    /// Build a placeholder from an absolute byte offset.
    pub fn from_offset(index: usize, offset: TextSize, length: u32, lines: &LineIndex) -> Self {
        let pos = lines.line_col(offset);
        Self::new(index, pos.line, pos.col, length)
    }

    pub fn position(&self) -> LineCol {
        LineCol::new(self.line, self.start)
    }

    /// Absolute offset of the first byte in `doc`.
    pub fn real_start_offset(&self, doc: &dyn Document) -> Result<TextSize> {
        doc.line_index()
            .offset(self.position())
            .ok_or(CheckError::InvalidPosition(self.position()))
    }

    /// Byte range covered in `doc`, validated against its text.
    pub fn range_in(&self, doc: &dyn Document) -> Result<TextRange> {
        let start = self.real_start_offset(doc)?;
        let end = start
            .checked_add(TextSize::from(self.length))
            .ok_or(CheckError::InvalidRange {
                range: TextRange::empty(start),
                len: doc.line_index().text_len(),
            })?;
        let range = TextRange::new(start, end);
        doc.slice(range)?;
        Ok(range)
    }
}

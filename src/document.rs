//! Documents: the text model consumed by the checker.
//!
//! A check needs only four things from the host's document model: read a
//! range, replace a range, save, and copy a file. [`TextDocument`] provides
//! them over a plain `String`; anything else that can hand out its text and
//! a [`LineIndex`] can stand in for the user's document via [`Document`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::base::{LineIndex, TextRange, TextSize};
use crate::error::{CheckError, Result};

/// Read access to document text.
pub trait Document {
    /// Full text of the document.
    fn text(&self) -> &str;

    /// Line index matching [`Document::text`].
    fn line_index(&self) -> &LineIndex;

    /// Text covered by `range`.
    ///
    /// Fails if the range ends past the text or splits a UTF-8 character.
    fn slice(&self, range: TextRange) -> Result<&str> {
        let text = self.text();
        check_range(text, range)?;
        Ok(&text[range])
    }
}

/// A replacement applied to a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextEdit {
    /// Replaced range, in coordinates before the edit.
    pub range: TextRange,
    /// Length of the inserted text.
    pub inserted_len: TextSize,
}

impl TextEdit {
    /// Signed change in document length.
    pub fn delta(&self) -> i64 {
        i64::from(u32::from(self.inserted_len)) - i64::from(u32::from(self.range.len()))
    }
}

/// In-memory document, optionally backed by a file.
#[derive(Clone, Debug)]
pub struct TextDocument {
    path: Option<PathBuf>,
    text: String,
    line_index: LineIndex,
}

impl TextDocument {
    /// Create an unsaved document.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let line_index = LineIndex::new(&text);
        Self {
            path: None,
            text,
            line_index,
        }
    }

    /// Load a document from disk.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let text = fs::read_to_string(&path).map_err(|e| CheckError::io(&path, e))?;
        let line_index = LineIndex::new(&text);
        Ok(Self {
            path: Some(path),
            text,
            line_index,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Replace `range` with `replacement`.
    pub fn replace(&mut self, range: TextRange, replacement: &str) -> Result<TextEdit> {
        check_range(&self.text, range)?;
        self.text
            .replace_range(usize::from(range.start())..usize::from(range.end()), replacement);
        self.line_index = LineIndex::new(&self.text);
        Ok(TextEdit {
            range,
            inserted_len: TextSize::of(replacement),
        })
    }

    /// Write the text back to the backing file.
    pub fn save(&self) -> Result<()> {
        let path = self.path.as_ref().ok_or(CheckError::NoBackingFile)?;
        fs::write(path, &self.text).map_err(|e| CheckError::io(path, e))
    }
}

impl Document for TextDocument {
    fn text(&self) -> &str {
        &self.text
    }

    fn line_index(&self) -> &LineIndex {
        &self.line_index
    }
}

/// Copy `source` into `dir` under `name`, returning the new path.
///
/// Errors name whichever side failed: the source for reads, the target for
/// writes.
pub fn copy_file(source: &Path, dir: &Path, name: &str) -> Result<PathBuf> {
    let target = dir.join(name);
    let mut reader = fs::File::open(source).map_err(|e| CheckError::io(source, e))?;
    let mut writer = fs::File::create(&target).map_err(|e| CheckError::io(&target, e))?;
    io::copy(&mut reader, &mut writer).map_err(|e| CheckError::io(&target, e))?;
    Ok(target)
}

fn check_range(text: &str, range: TextRange) -> Result<()> {
    let len = TextSize::of(text);
    let valid = range.end() <= len
        && text.is_char_boundary(range.start().into())
        && text.is_char_boundary(range.end().into());
    if valid {
        Ok(())
    } else {
        Err(CheckError::InvalidRange { range, len })
    }
}

//! Source text positions and ranges.

use std::fmt;

// Re-export from text-size for compatibility
pub use text_size::TextRange;
pub use text_size::TextSize;

/// A line and column position in source text.
///
/// Both line and column are 0-indexed internally, but displayed as 1-indexed.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default, PartialOrd, Ord)]
pub struct LineCol {
    /// 0-indexed line number
    pub line: u32,
    /// 0-indexed column (in UTF-8 bytes, not characters)
    pub col: u32,
}

impl LineCol {
    /// Create a new LineCol position.
    #[inline]
    pub const fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }

    /// Get 1-indexed line number (for display).
    #[inline]
    pub const fn line_one_indexed(self) -> u32 {
        self.line + 1
    }

    /// Get 1-indexed column number (for display).
    #[inline]
    pub const fn col_one_indexed(self) -> u32 {
        self.col + 1
    }
}

impl fmt::Debug for LineCol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line_one_indexed(), self.col_one_indexed())
    }
}

impl fmt::Display for LineCol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line_one_indexed(), self.col_one_indexed())
    }
}

/// Index for converting between byte offsets and line/column positions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineIndex {
    /// Byte offset of the start of each line
    line_starts: Vec<TextSize>,
    /// Total length of the indexed text
    text_len: TextSize,
}

impl LineIndex {
    /// Build a line index from source text.
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![TextSize::from(0)];

        for (offset, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(TextSize::from((offset + 1) as u32));
            }
        }

        Self {
            line_starts,
            text_len: TextSize::of(text),
        }
    }

    /// Convert a byte offset to a line/column position.
    ///
    /// Offsets past the end of the text are clamped to the end.
    pub fn line_col(&self, offset: TextSize) -> LineCol {
        let offset = offset.min(self.text_len);
        let line = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);

        let col = offset - self.line_starts[line];

        LineCol {
            line: line as u32,
            col: col.into(),
        }
    }

    /// Convert a line/column position to a byte offset.
    ///
    /// Returns `None` if the line does not exist or the column runs past
    /// the end of that line. The line terminator is not addressable.
    pub fn offset(&self, line_col: LineCol) -> Option<TextSize> {
        let start = self.line_start(line_col.line)?;
        let offset = start + TextSize::from(line_col.col);
        (offset <= self.line_end(line_col.line)?).then_some(offset)
    }

    /// Byte offset of the first character of `line`.
    pub fn line_start(&self, line: u32) -> Option<TextSize> {
        self.line_starts.get(line as usize).copied()
    }

    /// Byte offset just before the line terminator of `line`.
    fn line_end(&self, line: u32) -> Option<TextSize> {
        let next = self.line_starts.get(line as usize + 1).copied();
        match next {
            Some(next) => Some(next - TextSize::from(1)),
            None => self.line_start(line).map(|_| self.text_len),
        }
    }

    /// Length in bytes of the indexed text.
    pub fn text_len(&self) -> TextSize {
        self.text_len
    }

    /// Get the number of lines.
    pub fn len(&self) -> usize {
        self.line_starts.len()
    }

    /// Always false: even empty text has one (empty) line.
    pub fn is_empty(&self) -> bool {
        self.line_starts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col_display() {
        let pos = LineCol::new(0, 0);
        assert_eq!(format!("{}", pos), "1:1");

        let pos = LineCol::new(5, 10);
        assert_eq!(format!("{}", pos), "6:11");
    }

    #[test]
    fn test_line_index_single_line() {
        let index = LineIndex::new("print(1+1)");

        assert_eq!(index.line_col(TextSize::from(0)), LineCol::new(0, 0));
        assert_eq!(index.line_col(TextSize::from(6)), LineCol::new(0, 6));
        assert_eq!(index.text_len(), TextSize::from(10));
    }

    #[test]
    fn test_line_index_multi_line() {
        let index = LineIndex::new("a = 1\nb = a + 2\n");

        assert_eq!(index.len(), 3);
        assert_eq!(index.line_col(TextSize::from(6)), LineCol::new(1, 0));
        assert_eq!(index.line_col(TextSize::from(10)), LineCol::new(1, 4));
        assert_eq!(index.line_col(TextSize::from(16)), LineCol::new(2, 0));
    }

    #[test]
    fn test_line_index_offset_roundtrip() {
        let text = "def f():\n    return 42\n";
        let index = LineIndex::new(text);

        let pos = LineCol::new(1, 11);
        let offset = index.offset(pos).unwrap();
        assert_eq!(&text[usize::from(offset)..usize::from(offset) + 2], "42");
        assert_eq!(index.line_col(offset), pos);
    }

    #[test]
    fn test_line_index_offset_out_of_line() {
        let index = LineIndex::new("ab\ncd");

        // end of line is addressable, the newline itself is not
        assert_eq!(index.offset(LineCol::new(0, 2)), Some(TextSize::from(2)));
        assert_eq!(index.offset(LineCol::new(0, 3)), None);
        assert_eq!(index.offset(LineCol::new(1, 2)), Some(TextSize::from(5)));
        assert_eq!(index.offset(LineCol::new(1, 3)), None);
        assert_eq!(index.offset(LineCol::new(2, 0)), None);
    }

    #[test]
    fn test_line_col_clamps_past_end() {
        let index = LineIndex::new("ab");
        assert_eq!(index.line_col(TextSize::from(40)), LineCol::new(0, 2));
    }
}

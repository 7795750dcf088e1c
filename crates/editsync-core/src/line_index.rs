//! Logical Line Index
//!
//! Provides efficient line indexing using Rope data structure, supporting O(log N) access and editing.
//!
//! The rope is built with `cr_lines` only, so `\n`, `\r\n` and `\r` terminate lines and every
//! other character (including Unicode line separators) is ordinary text. This matches the set
//! of terminators the protocol counts when it talks about line numbers.

use crate::buffer::{BufferError, TextSource};
use ropey::Rope;
use std::ops::Range;

/// Logical line index - implemented using Rope data structure
///
/// Rope provides O(log N) line access, insertion, and deletion performance, suitable for large file editing.
/// Cloning is cheap (structural sharing), which makes a `LineIndex` a convenient immutable snapshot.
#[derive(Debug, Clone, Default)]
pub struct LineIndex {
    rope: Rope,
}

impl LineIndex {
    /// Create a new, empty line index
    pub fn new() -> Self {
        Self { rope: Rope::new() }
    }

    /// Build line index from text
    pub fn from_text(text: &str) -> Self {
        Self {
            rope: Rope::from_str(text),
        }
    }

    /// Get line number and offset within line from character offset
    pub fn char_offset_to_position(&self, char_offset: usize) -> (usize, usize) {
        let char_offset = char_offset.min(self.rope.len_chars());

        let line_idx = self.rope.char_to_line(char_offset);
        let line_start_char = self.rope.line_to_char(line_idx);
        let char_in_line = char_offset - line_start_char;

        (line_idx, char_in_line)
    }

    /// Get character offset from line number and column number
    ///
    /// Out-of-range lines map to the end of the document; columns clamp to the line content.
    pub fn position_to_char_offset(&self, line: usize, column: usize) -> usize {
        match self.line_content_len(line) {
            Some(line_len) => self.rope.line_to_char(line) + column.min(line_len),
            None => self.rope.len_chars(),
        }
    }

    /// Number of characters on `line`, excluding its terminator.
    pub fn line_content_len(&self, line: usize) -> Option<usize> {
        if line >= self.rope.len_lines() {
            return None;
        }

        let slice = self.rope.line(line);
        let mut len = slice.len_chars();
        if len > 0 && slice.char(len - 1) == '\n' {
            len -= 1;
        }
        if len > 0 && slice.char(len - 1) == '\r' {
            len -= 1;
        }
        Some(len)
    }

    /// Get total line count
    ///
    /// An empty document has one line, and a trailing terminator opens one more empty line.
    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    /// Get total byte count
    pub fn byte_count(&self) -> usize {
        self.rope.len_bytes()
    }

    /// Get total character count
    pub fn char_count(&self) -> usize {
        self.rope.len_chars()
    }

    /// Insert text (at specified character offset)
    pub fn insert(&mut self, char_offset: usize, text: &str) {
        let char_offset = char_offset.min(self.rope.len_chars());
        self.rope.insert(char_offset, text);
    }

    /// Delete text range (character offset)
    pub fn delete(&mut self, start_char: usize, len_chars: usize) {
        let start_char = start_char.min(self.rope.len_chars());
        let end_char = (start_char + len_chars).min(self.rope.len_chars());

        if start_char < end_char {
            self.rope.remove(start_char..end_char);
        }
    }

    /// Get complete text
    pub fn get_text(&self) -> String {
        self.rope.to_string()
    }

    /// Get text of the specified line (excluding its terminator)
    pub fn get_line_text(&self, line_number: usize) -> Option<String> {
        let len = self.line_content_len(line_number)?;
        let start = self.rope.line_to_char(line_number);
        Some(self.rope.slice(start..start + len).to_string())
    }
}

impl TextSource for LineIndex {
    fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    fn slice(&self, range: Range<usize>) -> Result<String, BufferError> {
        let len = self.rope.len_chars();
        if range.start > range.end {
            return Err(BufferError::InvalidRange {
                start: range.start,
                end: range.end,
            });
        }
        if range.end > len {
            return Err(BufferError::OffsetOutOfBounds {
                offset: range.end,
                len,
            });
        }
        Ok(self.rope.slice(range).to_string())
    }

    fn char_at(&self, offset: usize) -> Option<char> {
        (offset < self.rope.len_chars()).then(|| self.rope.char(offset))
    }

    fn line_to_offset(&self, line: usize) -> Result<usize, BufferError> {
        if line >= self.rope.len_lines() {
            return Err(BufferError::LineOutOfBounds {
                line,
                line_count: self.rope.len_lines(),
            });
        }
        Ok(self.rope.line_to_char(line))
    }

    fn offset_to_line(&self, offset: usize) -> Result<usize, BufferError> {
        let len = self.rope.len_chars();
        if offset > len {
            return Err(BufferError::OffsetOutOfBounds { offset, len });
        }
        Ok(self.rope.char_to_line(offset))
    }

    fn line_text(&self, line: usize) -> Result<String, BufferError> {
        self.get_line_text(line)
            .ok_or_else(|| BufferError::LineOutOfBounds {
                line,
                line_count: self.rope.len_lines(),
            })
    }

    fn text(&self) -> String {
        self.get_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_line_index() {
        let index = LineIndex::new();
        assert_eq!(index.line_count(), 1); // Rope empty document has 1 line
        assert_eq!(index.byte_count(), 0);
        assert_eq!(index.char_count(), 0);
    }

    #[test]
    fn test_from_text() {
        let text = "Line 1\nLine 2\nLine 3";
        let index = LineIndex::from_text(text);

        assert_eq!(index.line_count(), 3);
        assert_eq!(index.byte_count(), text.len());
        assert_eq!(index.char_count(), text.chars().count());
    }

    #[test]
    fn test_trailing_newline_opens_empty_line() {
        let index = LineIndex::from_text("line1\nline2\nline3\n");
        assert_eq!(index.line_count(), 4);
        assert_eq!(index.get_line_text(3).as_deref(), Some(""));
        assert_eq!(index.line_to_offset(3), Ok(18));
    }

    #[test]
    fn test_char_offset_to_position() {
        let text = "ABC\nDEF\nGHI";
        let index = LineIndex::from_text(text);

        assert_eq!(index.char_offset_to_position(0), (0, 0)); // A
        assert_eq!(index.char_offset_to_position(2), (0, 2)); // C
        assert_eq!(index.char_offset_to_position(4), (1, 0)); // D
        assert_eq!(index.char_offset_to_position(8), (2, 0)); // G
    }

    #[test]
    fn test_position_to_char_offset() {
        let text = "ABC\nDEF\nGHI";
        let index = LineIndex::from_text(text);

        assert_eq!(index.position_to_char_offset(0, 0), 0); // A
        assert_eq!(index.position_to_char_offset(0, 2), 2); // C
        assert_eq!(index.position_to_char_offset(1, 0), 4); // D
        assert_eq!(index.position_to_char_offset(2, 0), 8); // G
        assert_eq!(index.position_to_char_offset(0, 99), 3); // clamps before '\n'
        assert_eq!(index.position_to_char_offset(9, 0), 11);
    }

    #[test]
    fn test_crlf_and_cr_terminators() {
        let index = LineIndex::from_text("a\r\nb\rc");
        assert_eq!(index.line_count(), 3);
        assert_eq!(index.get_line_text(0).as_deref(), Some("a"));
        assert_eq!(index.get_line_text(1).as_deref(), Some("b"));
        assert_eq!(index.get_line_text(2).as_deref(), Some("c"));
        assert_eq!(index.line_content_len(0), Some(1));
        assert_eq!(index.line_to_offset(1), Ok(3));
        assert_eq!(index.line_to_offset(2), Ok(5));
    }

    #[test]
    fn test_unicode_line_separator_is_plain_text() {
        let index = LineIndex::from_text("a\u{2028}b");
        assert_eq!(index.line_count(), 1);
    }

    #[test]
    fn test_utf8_cjk() {
        let text = "你好\n世界";
        let index = LineIndex::from_text(text);

        assert_eq!(index.line_count(), 2);
        assert_eq!(index.byte_count(), text.len());
        assert_eq!(index.char_count(), 5); // 5 characters (你好\n世界)

        assert_eq!(index.char_offset_to_position(0), (0, 0));
        assert_eq!(index.char_offset_to_position(1), (0, 1));
        // Second line: "世界" (newline at character offset 2)
        assert_eq!(index.char_offset_to_position(3), (1, 0));
    }

    #[test]
    fn test_source_bounds_checks() {
        let index = LineIndex::from_text("ab\ncd");
        assert_eq!(index.slice(1..4), Ok("b\nc".to_string()));
        assert_eq!(
            index.slice(3..9),
            Err(BufferError::OffsetOutOfBounds { offset: 9, len: 5 })
        );
        assert_eq!(
            index.slice(4..3),
            Err(BufferError::InvalidRange { start: 4, end: 3 })
        );
        assert_eq!(index.char_at(4), Some('d'));
        assert_eq!(index.char_at(5), None);
        assert_eq!(index.offset_to_line(5), Ok(1));
        assert!(index.offset_to_line(6).is_err());
        assert!(index.line_text(2).is_err());
    }

    #[test]
    fn test_large_document() {
        let mut lines = Vec::new();
        for i in 0..10000 {
            lines.push(format!("Line {}", i));
        }
        let text = lines.join("\n");

        let index = LineIndex::from_text(&text);
        assert_eq!(index.line_count(), 10000);
        assert_eq!(index.get_line_text(5000).as_deref(), Some("Line 5000"));
    }

    #[test]
    fn test_insert_text() {
        let mut index = LineIndex::from_text("Hello World");

        index.insert(6, "Beautiful ");
        assert_eq!(index.get_text(), "Hello Beautiful World");
    }

    #[test]
    fn test_delete_text() {
        let mut index = LineIndex::from_text("Hello Beautiful World");

        index.delete(6, 10); // Delete "Beautiful "
        assert_eq!(index.get_text(), "Hello World");
    }
}

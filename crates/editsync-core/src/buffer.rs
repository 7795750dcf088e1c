//! Buffer access contract.
//!
//! The sync engine never owns the document it edits. It reads through [`TextSource`] and mutates
//! through [`TextBuffer::replace`], which is the only write primitive it relies on. Every
//! mutation bumps the buffer's modification stamp so stale edit batches can be detected.

use crate::delta::TextDeltaEdit;
use crate::line_index::LineIndex;
use std::ops::Range;
use thiserror::Error;

/// Errors returned by buffer accessors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    /// A character offset points past the end of the buffer.
    #[error("offset {offset} is beyond the end of the buffer (length {len})")]
    OffsetOutOfBounds {
        /// Requested offset.
        offset: usize,
        /// Buffer length in characters.
        len: usize,
    },

    /// A line number points past the last line of the buffer.
    #[error("line {line} is beyond the last line of the buffer ({line_count} lines)")]
    LineOutOfBounds {
        /// Requested line.
        line: usize,
        /// Number of lines in the buffer.
        line_count: usize,
    },

    /// A range has its start after its end.
    #[error("invalid range {start}..{end}")]
    InvalidRange {
        /// Range start offset.
        start: usize,
        /// Range end offset.
        end: usize,
    },
}

/// Read-only, line-aware view of a text snapshot.
///
/// Offsets are character offsets. Line terminators are `\n`, `\r\n` and `\r`.
pub trait TextSource {
    /// Total number of characters.
    fn len_chars(&self) -> usize;

    /// Number of lines (an empty document has one line).
    fn line_count(&self) -> usize;

    /// Copy out the characters in `range`.
    fn slice(&self, range: Range<usize>) -> Result<String, BufferError>;

    /// Character at `offset`, if in bounds.
    fn char_at(&self, offset: usize) -> Option<char>;

    /// Character offset of the first character of `line`.
    fn line_to_offset(&self, line: usize) -> Result<usize, BufferError>;

    /// Line containing `offset` (`offset == len_chars()` is the last line).
    fn offset_to_line(&self, offset: usize) -> Result<usize, BufferError>;

    /// Content of `line` without its terminator.
    fn line_text(&self, line: usize) -> Result<String, BufferError>;

    /// The whole text.
    fn text(&self) -> String {
        self.slice(0..self.len_chars()).unwrap_or_default()
    }
}

/// A mutable buffer with a monotonically increasing modification stamp.
pub trait TextBuffer: TextSource {
    /// Current modification stamp. Strictly increases with every mutation.
    fn modification_stamp(&self) -> u64;

    /// Replace the characters in `range` with `text`.
    ///
    /// Returns the exact record of the mutation. Fails without mutating when `range` is inverted
    /// or out of bounds.
    fn replace(&mut self, range: Range<usize>, text: &str) -> Result<TextDeltaEdit, BufferError>;
}

/// Rope-backed reference [`TextBuffer`].
///
/// This is what headless hosts and tests use; editors with their own document model implement
/// [`TextBuffer`] over it instead.
#[derive(Debug, Clone, Default)]
pub struct RopeBuffer {
    index: LineIndex,
    stamp: u64,
}

impl RopeBuffer {
    /// Create an empty buffer with stamp `0`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer holding `text`, with stamp `0`.
    pub fn from_text(text: &str) -> Self {
        Self {
            index: LineIndex::from_text(text),
            stamp: 0,
        }
    }

    /// Immutable snapshot of the current text.
    pub fn snapshot(&self) -> LineIndex {
        self.index.clone()
    }

    /// Bump the modification stamp without changing the text.
    ///
    /// Models mutations the engine cannot see, such as a reload from disk with identical content.
    pub fn touch(&mut self) {
        self.stamp += 1;
    }
}

impl TextSource for RopeBuffer {
    fn len_chars(&self) -> usize {
        self.index.len_chars()
    }

    fn line_count(&self) -> usize {
        self.index.line_count()
    }

    fn slice(&self, range: Range<usize>) -> Result<String, BufferError> {
        self.index.slice(range)
    }

    fn char_at(&self, offset: usize) -> Option<char> {
        self.index.char_at(offset)
    }

    fn line_to_offset(&self, line: usize) -> Result<usize, BufferError> {
        self.index.line_to_offset(line)
    }

    fn offset_to_line(&self, offset: usize) -> Result<usize, BufferError> {
        self.index.offset_to_line(offset)
    }

    fn line_text(&self, line: usize) -> Result<String, BufferError> {
        self.index.line_text(line)
    }

    fn text(&self) -> String {
        self.index.get_text()
    }
}

impl TextBuffer for RopeBuffer {
    fn modification_stamp(&self) -> u64 {
        self.stamp
    }

    fn replace(&mut self, range: Range<usize>, text: &str) -> Result<TextDeltaEdit, BufferError> {
        let deleted_text = self.index.slice(range.clone())?;

        self.index.delete(range.start, range.end - range.start);
        self.index.insert(range.start, text);
        self.stamp += 1;

        Ok(TextDeltaEdit {
            start: range.start,
            deleted_text,
            inserted_text: text.to_string(),
        })
    }
}

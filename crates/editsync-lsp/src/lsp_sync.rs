//! LSP coordinate layer.
//!
//! Protocol positions count lines from zero and columns in UTF-16 code units, while buffers in
//! this workspace are addressed by character offsets. Everything that crosses that boundary goes
//! through [`to_offset`] / [`to_position`]; nothing here caches across buffer mutations.

use crate::error::SyncError;
use editsync_core::TextSource;
use serde_json::{Value, json};
use std::fmt;

/// LSP Position (based on UTF-16 code units)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LspPosition {
    /// Line number (0-based)
    pub line: u32,
    /// Character offset (UTF-16 code units, 0-based)
    pub character: u32,
}

impl LspPosition {
    /// Create a new LSP position (UTF-16 based).
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }

    /// Parse a `Position`-shaped JSON value.
    pub fn from_value(value: &Value) -> Option<Self> {
        Some(Self {
            line: u32::try_from(value.get("line")?.as_u64()?).ok()?,
            character: u32::try_from(value.get("character")?.as_u64()?).ok()?,
        })
    }

    /// Serialize as a protocol `Position`.
    pub fn to_value(self) -> Value {
        json!({ "line": self.line, "character": self.character })
    }
}

impl fmt::Display for LspPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.character)
    }
}

/// LSP Range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LspRange {
    /// Range start position (inclusive).
    pub start: LspPosition,
    /// Range end position (exclusive).
    pub end: LspPosition,
}

impl LspRange {
    /// Create a new LSP range.
    pub fn new(start: LspPosition, end: LspPosition) -> Self {
        Self { start, end }
    }

    /// Zero-width range at `position`.
    pub fn point(position: LspPosition) -> Self {
        Self::new(position, position)
    }

    /// Returns `true` if `start` comes after `end`.
    pub fn is_inverted(&self) -> bool {
        self.start > self.end
    }

    /// Range with `start <= end`.
    ///
    /// Some servers send inverted ranges; they are swapped rather than rejected. Normalizing an
    /// already normalized range returns it unchanged.
    pub fn normalized(self) -> Self {
        if self.is_inverted() {
            Self::new(self.end, self.start)
        } else {
            self
        }
    }

    /// Parse a `Range`-shaped JSON value.
    pub fn from_value(value: &Value) -> Option<Self> {
        let start = LspPosition::from_value(value.get("start")?)?;
        let end = LspPosition::from_value(value.get("end")?)?;
        Some(Self::new(start, end))
    }

    /// Serialize as a protocol `Range`.
    pub fn to_value(self) -> Value {
        json!({ "start": self.start.to_value(), "end": self.end.to_value() })
    }
}

/// LSP coordinate converter
///
/// Handles conversions between character offsets and UTF-16 columns within a single line.
pub struct LspCoordinateConverter;

impl LspCoordinateConverter {
    /// Convert UTF-8 string to UTF-16 code unit count
    pub fn utf8_to_utf16_len(text: &str) -> usize {
        text.encode_utf16().count()
    }

    /// Convert character offset to UTF-16 code unit offset
    pub fn char_offset_to_utf16(text: &str, char_offset: usize) -> usize {
        text.chars().take(char_offset).map(|c| c.len_utf16()).sum()
    }

    /// Convert UTF-16 code unit offset to character offset
    ///
    /// An offset that falls inside a surrogate pair rounds up to the next character. Offsets
    /// past the end of `text` clamp to its character count.
    pub fn utf16_to_char_offset(text: &str, utf16_offset: usize) -> usize {
        let mut current_utf16 = 0;
        let mut char_count = 0;

        for ch in text.chars() {
            if current_utf16 >= utf16_offset {
                break;
            }
            current_utf16 += ch.len_utf16();
            char_count += 1;
        }

        char_count
    }

    /// Convert line and column (character offset) to LSP Position
    pub fn position_to_lsp(line_text: &str, line: usize, char_in_line: usize) -> LspPosition {
        let utf16_offset = Self::char_offset_to_utf16(line_text, char_in_line);
        LspPosition::new(line as u32, utf16_offset as u32)
    }

    /// Convert LSP Position to character offset
    pub fn lsp_to_char_offset(line_text: &str, character: u32) -> usize {
        Self::utf16_to_char_offset(line_text, character as usize)
    }
}

/// Convert a protocol position into a character offset of `source`.
///
/// A line past the end of the document fails with [`SyncError::PositionOutOfRange`]. A column
/// past the end of its line clamps to the line end (terminator excluded), as the protocol
/// specifies.
pub fn to_offset<S: TextSource + ?Sized>(
    position: LspPosition,
    source: &S,
) -> Result<usize, SyncError> {
    let line = position.line as usize;
    let out_of_range = || SyncError::PositionOutOfRange {
        position,
        line_count: source.line_count(),
    };

    let line_start = source.line_to_offset(line).map_err(|_| out_of_range())?;
    let line_text = source.line_text(line).map_err(|_| out_of_range())?;
    Ok(line_start + LspCoordinateConverter::lsp_to_char_offset(&line_text, position.character))
}

/// Convert a character offset of `source` into a protocol position.
///
/// `offset == len_chars()` is valid (end of document); anything larger fails with
/// [`SyncError::OffsetOutOfRange`].
pub fn to_position<S: TextSource + ?Sized>(
    offset: usize,
    source: &S,
) -> Result<LspPosition, SyncError> {
    let len = source.len_chars();
    if offset > len {
        return Err(SyncError::OffsetOutOfRange { offset, len });
    }

    let line = source.offset_to_line(offset)?;
    let line_start = source.line_to_offset(line)?;
    let prefix = source.slice(line_start..offset)?;
    Ok(LspPosition::new(
        line as u32,
        LspCoordinateConverter::utf8_to_utf16_len(&prefix) as u32,
    ))
}

/// Convert a protocol range into `(start, end)` character offsets, normalizing it first.
pub fn range_to_offsets<S: TextSource + ?Sized>(
    range: LspRange,
    source: &S,
) -> Result<(usize, usize), SyncError> {
    let range = range.normalized();
    Ok((to_offset(range.start, source)?, to_offset(range.end, source)?))
}

/// Convert `(start, end)` character offsets of `source` into a protocol range.
pub fn offsets_to_range<S: TextSource + ?Sized>(
    start: usize,
    end: usize,
    source: &S,
) -> Result<LspRange, SyncError> {
    Ok(LspRange::new(
        to_position(start, source)?,
        to_position(end, source)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use editsync_core::LineIndex;

    #[test]
    fn test_utf8_to_utf16_len() {
        assert_eq!(LspCoordinateConverter::utf8_to_utf16_len("hello"), 5);
        assert_eq!(LspCoordinateConverter::utf8_to_utf16_len("你好"), 2);
        // Emoji may be 1 or 2 UTF-16 code units
        assert_eq!(LspCoordinateConverter::utf8_to_utf16_len("👋"), 2);
    }

    #[test]
    fn test_char_offset_to_utf16() {
        let text = "hello你好👋";

        assert_eq!(LspCoordinateConverter::char_offset_to_utf16(text, 5), 5);
        assert_eq!(LspCoordinateConverter::char_offset_to_utf16(text, 6), 6);
        assert_eq!(LspCoordinateConverter::char_offset_to_utf16(text, 7), 7);
        // 👋 takes two UTF-16 units
        assert_eq!(LspCoordinateConverter::char_offset_to_utf16(text, 8), 9);
    }

    #[test]
    fn test_utf16_to_char_offset() {
        let text = "hello你好👋";

        assert_eq!(LspCoordinateConverter::utf16_to_char_offset(text, 5), 5);
        assert_eq!(LspCoordinateConverter::utf16_to_char_offset(text, 7), 7);
        assert_eq!(LspCoordinateConverter::utf16_to_char_offset(text, 9), 8);
        assert_eq!(LspCoordinateConverter::utf16_to_char_offset(text, 42), 8);
    }

    #[test]
    fn test_position_to_lsp_with_emoji() {
        let line_text = "hello 👋 world";
        let pos1 = LspCoordinateConverter::position_to_lsp(line_text, 0, 6);
        assert_eq!(pos1.character, 6);

        // "hello 👋" = 7 chars, 8 UTF-16 units
        let pos2 = LspCoordinateConverter::position_to_lsp(line_text, 0, 7);
        assert_eq!(pos2.character, 8);
    }

    #[test]
    fn test_roundtrip_conversion() {
        let text = "hello 你好 👋 world";

        for char_offset in 0..text.chars().count() {
            let utf16_offset = LspCoordinateConverter::char_offset_to_utf16(text, char_offset);
            let back_to_char = LspCoordinateConverter::utf16_to_char_offset(text, utf16_offset);
            assert_eq!(
                back_to_char, char_offset,
                "Roundtrip conversion failed: char_offset={}",
                char_offset
            );
        }
    }

    #[test]
    fn test_normalize_swaps_inverted_range() {
        let range = LspRange::new(LspPosition::new(2, 0), LspPosition::new(1, 4));
        assert!(range.is_inverted());

        let normalized = range.normalized();
        assert_eq!(normalized.start, LspPosition::new(1, 4));
        assert_eq!(normalized.end, LspPosition::new(2, 0));
        assert_eq!(normalized.normalized(), normalized);
    }

    #[test]
    fn test_document_offsets_roundtrip() {
        let index = LineIndex::from_text("fn 👋() {\n    x\n}\n");
        for offset in 0..=index.char_count() {
            let position = to_position(offset, &index).unwrap();
            assert_eq!(to_offset(position, &index).unwrap(), offset, "offset {offset}");
        }
    }

    #[test]
    fn test_position_from_value_rejects_numbers_beyond_u32() {
        assert_eq!(
            LspPosition::from_value(&json!({ "line": 3, "character": 7 })),
            Some(LspPosition::new(3, 7))
        );
        assert_eq!(
            LspPosition::from_value(&json!({ "line": 4294967296u64, "character": 1 })),
            None
        );
        assert_eq!(
            LspPosition::from_value(&json!({ "line": 0, "character": 4294967297u64 })),
            None
        );
        assert_eq!(
            LspRange::from_value(&json!({
                "start": { "line": 0, "character": 0 },
                "end": { "line": 4294967296u64, "character": 0 }
            })),
            None
        );
    }

    #[test]
    fn test_to_offset_clamps_column_but_rejects_line() {
        let index = LineIndex::from_text("ab\ncd");
        assert_eq!(to_offset(LspPosition::new(0, 40), &index), Ok(2));
        assert_eq!(to_offset(LspPosition::new(1, 2), &index), Ok(5));
        assert_eq!(
            to_offset(LspPosition::new(2, 0), &index),
            Err(SyncError::PositionOutOfRange {
                position: LspPosition::new(2, 0),
                line_count: 2,
            })
        );
    }

    #[test]
    fn test_to_position_rejects_offset_past_end() {
        let index = LineIndex::from_text("ab\ncd");
        assert_eq!(to_position(5, &index), Ok(LspPosition::new(1, 2)));
        assert_eq!(
            to_position(6, &index),
            Err(SyncError::OffsetOutOfRange { offset: 6, len: 5 })
        );
    }

    #[test]
    fn test_range_json_roundtrip() {
        let value = json!({
            "start": { "line": 3, "character": 1 },
            "end": { "line": 3, "character": 7 }
        });
        let range = LspRange::from_value(&value).unwrap();
        assert_eq!(range.to_value(), value);
        assert!(LspRange::from_value(&json!({ "start": { "line": 0 } })).is_none());
    }
}

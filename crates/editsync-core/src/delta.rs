//! Structured buffer mutation records.
//!
//! Every [`crate::TextBuffer::replace`] call returns a [`TextDeltaEdit`] describing exactly what
//! was removed and inserted. Outbound sync consumes these records in application order, so
//! consumers never have to diff whole documents to learn what a single replace did.

/// A single text edit expressed in character offsets.
///
/// Semantics:
/// - `start` is a character offset in the document **at the time this edit is applied**.
/// - The deleted range is defined by the length (in `char`s) of `deleted_text`.
/// - A sequence of records must be replayed **in order** to transform the "before" document
///   into the "after" document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDeltaEdit {
    /// Start character offset of the edit.
    pub start: usize,
    /// Exact deleted text (may be empty).
    pub deleted_text: String,
    /// Exact inserted text (may be empty).
    pub inserted_text: String,
}

impl TextDeltaEdit {
    /// Create a record from its parts.
    pub fn new(
        start: usize,
        deleted_text: impl Into<String>,
        inserted_text: impl Into<String>,
    ) -> Self {
        Self {
            start,
            deleted_text: deleted_text.into(),
            inserted_text: inserted_text.into(),
        }
    }

    /// Length of `deleted_text` in characters.
    pub fn deleted_len(&self) -> usize {
        self.deleted_text.chars().count()
    }

    /// Length of `inserted_text` in characters.
    pub fn inserted_len(&self) -> usize {
        self.inserted_text.chars().count()
    }

    /// Exclusive end character offset in the pre-edit document.
    pub fn end(&self) -> usize {
        self.start.saturating_add(self.deleted_len())
    }

    /// Net change in document length (in characters) caused by this edit.
    pub fn len_delta(&self) -> isize {
        self.inserted_len() as isize - self.deleted_len() as isize
    }

    /// Replay this edit against `text`.
    ///
    /// Returns `None` if the record does not line up with `text` (the deleted range is out of
    /// bounds or does not contain `deleted_text`).
    pub fn apply_to(&self, text: &str) -> Option<String> {
        let start_byte = char_to_byte(text, self.start)?;
        let end_byte = start_byte.checked_add(self.deleted_text.len())?;
        if text.get(start_byte..end_byte)? != self.deleted_text {
            return None;
        }

        let mut out =
            String::with_capacity(text.len() - self.deleted_text.len() + self.inserted_text.len());
        out.push_str(&text[..start_byte]);
        out.push_str(&self.inserted_text);
        out.push_str(&text[end_byte..]);
        Some(out)
    }
}

fn char_to_byte(text: &str, char_offset: usize) -> Option<usize> {
    if char_offset == 0 {
        return Some(0);
    }
    text.char_indices()
        .map(|(byte, _)| byte)
        .chain(std::iter::once(text.len()))
        .nth(char_offset)
}

//! Outbound document sync (`textDocument/didChange`).
//!
//! Local buffer mutations are described to the server either as the smallest
//! `(range, rangeLength, text)` replacement or, for servers that asked for full sync, as the whole
//! new text. [`DocumentSync`] keeps a mirror of what the server has seen so each event is
//! computed against the right "before" text.

use crate::config::TextDocumentSyncKind;
use crate::error::SyncError;
use crate::lsp_sync::{LspCoordinateConverter, LspPosition, LspRange, range_to_offsets};
use editsync_core::{LineIndex, TextDeltaEdit};
use serde_json::{Value, json};
use tracing::trace;

/// A single `TextDocumentContentChangeEvent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentChange {
    /// Replace `range` (which spans `range_length` UTF-16 units) with `text`.
    Incremental {
        /// Replaced range, in positions of the document before the change.
        range: LspRange,
        /// Length of the replaced text in UTF-16 code units.
        range_length: u32,
        /// Inserted text.
        text: String,
    },
    /// Replace the whole document with `text`.
    Full {
        /// New document text.
        text: String,
    },
}

impl ContentChange {
    /// Inserted (or full) text.
    pub fn text(&self) -> &str {
        match self {
            ContentChange::Incremental { text, .. } | ContentChange::Full { text } => text,
        }
    }

    /// Replaced range, for incremental events.
    pub fn range(&self) -> Option<LspRange> {
        match self {
            ContentChange::Incremental { range, .. } => Some(*range),
            ContentChange::Full { .. } => None,
        }
    }

    /// Serialize as a protocol `TextDocumentContentChangeEvent`.
    pub fn to_value(&self) -> Value {
        match self {
            ContentChange::Incremental {
                range,
                range_length,
                text,
            } => json!({
                "range": range.to_value(),
                "rangeLength": range_length,
                "text": text,
            }),
            ContentChange::Full { text } => json!({ "text": text }),
        }
    }

    /// Parse a `TextDocumentContentChangeEvent`-shaped JSON value.
    ///
    /// A missing `rangeLength` is recomputed when the event is replayed, so it is stored as `0`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let text = value.get("text")?.as_str()?.to_string();
        match value.get("range") {
            Some(range) => Some(ContentChange::Incremental {
                range: LspRange::from_value(range)?,
                range_length: match value.get("rangeLength") {
                    Some(length) => u32::try_from(length.as_u64()?).ok()?,
                    None => 0,
                },
                text,
            }),
            None => Some(ContentChange::Full { text }),
        }
    }

    /// Replay this event against `text`, the way a server mirrors the document.
    ///
    /// `rangeLength` is informational; the range alone decides what is replaced.
    pub fn apply_to(&self, text: &str) -> Result<String, SyncError> {
        match self {
            ContentChange::Full { text } => Ok(text.clone()),
            ContentChange::Incremental {
                range,
                text: inserted,
                ..
            } => {
                let index = LineIndex::from_text(text);
                let (start, end) = range_to_offsets(*range, &index)?;

                let mut out = String::with_capacity(text.len() + inserted.len());
                out.extend(text.chars().take(start));
                out.push_str(inserted);
                out.extend(text.chars().skip(end));
                Ok(out)
            }
        }
    }
}

/// Smallest incremental change turning `before` into `after`.
///
/// Computes the longest common prefix, then the longest common suffix of what remains (so the two
/// never overlap). Neither boundary is allowed to split a `\r\n` pair.
pub fn diff(before: &str, after: &str) -> ContentChange {
    let before_chars: Vec<char> = before.chars().collect();
    let after_chars: Vec<char> = after.chars().collect();

    let mut prefix = before_chars
        .iter()
        .zip(&after_chars)
        .take_while(|(a, b)| a == b)
        .count();
    if prefix > 0
        && before_chars[prefix - 1] == '\r'
        && (before_chars.get(prefix) == Some(&'\n') || after_chars.get(prefix) == Some(&'\n'))
    {
        prefix -= 1;
    }

    let max_suffix = before_chars.len().min(after_chars.len()) - prefix;
    let mut suffix = before_chars
        .iter()
        .rev()
        .zip(after_chars.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();
    if suffix > 0
        && (splits_crlf(&before_chars, before_chars.len() - suffix)
            || splits_crlf(&after_chars, after_chars.len() - suffix))
    {
        suffix -= 1;
    }

    let removed_end = before_chars.len() - suffix;
    let inserted_end = after_chars.len() - suffix;

    ContentChange::Incremental {
        range: LspRange::new(
            position_at(&before_chars, prefix),
            position_at(&before_chars, removed_end),
        ),
        range_length: before_chars[prefix..removed_end]
            .iter()
            .map(|c| c.len_utf16())
            .sum::<usize>() as u32,
        text: after_chars[prefix..inserted_end].iter().collect(),
    }
}

/// Whole-document change.
pub fn full_change(after: &str) -> ContentChange {
    ContentChange::Full {
        text: after.to_string(),
    }
}

fn splits_crlf(chars: &[char], at: usize) -> bool {
    at > 0 && at < chars.len() && chars[at] == '\n' && chars[at - 1] == '\r'
}

// Protocol position of `offset`, counting `\n`, `\r\n` and `\r` as terminators.
fn position_at(chars: &[char], offset: usize) -> LspPosition {
    let mut line = 0u32;
    let mut character = 0usize;
    let mut i = 0;
    while i < offset {
        match chars[i] {
            '\r' if chars.get(i + 1) == Some(&'\n') && i + 1 < offset => {
                line += 1;
                character = 0;
                i += 2;
                continue;
            }
            '\n' | '\r' => {
                line += 1;
                character = 0;
            }
            c => character += c.len_utf16(),
        }
        i += 1;
    }
    LspPosition::new(line, character as u32)
}

fn record_to_change(mirror: &[char], record: &TextDeltaEdit) -> ContentChange {
    ContentChange::Incremental {
        range: LspRange::new(
            position_at(mirror, record.start),
            position_at(mirror, record.end()),
        ),
        range_length: LspCoordinateConverter::utf8_to_utf16_len(&record.deleted_text) as u32,
        text: record.inserted_text.clone(),
    }
}

/// Per-document outbound sync state.
///
/// Holds the text the server currently believes in plus the document version, and turns local
/// mutations into ordered content change events.
#[derive(Debug, Clone)]
pub struct DocumentSync {
    mirror: String,
    version: i32,
    kind: TextDocumentSyncKind,
}

impl DocumentSync {
    /// Start tracking a document whose server-side text is `text` (version `0`).
    pub fn new(text: impl Into<String>, kind: TextDocumentSyncKind) -> Self {
        Self {
            mirror: text.into(),
            version: 0,
            kind,
        }
    }

    /// Override the initial version (the one sent with `didOpen`).
    pub fn with_version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    /// Text as last synced to the server.
    pub fn text(&self) -> &str {
        &self.mirror
    }

    /// Current document version.
    pub fn version(&self) -> i32 {
        self.version
    }

    /// Negotiated sync kind.
    pub fn kind(&self) -> TextDocumentSyncKind {
        self.kind
    }

    /// Change the sync kind (e.g. after dynamic registration).
    pub fn set_kind(&mut self, kind: TextDocumentSyncKind) {
        self.kind = kind;
    }

    /// Describe the change from the mirrored text to `after`.
    ///
    /// Returns `None` when nothing changed or when the server does not want change events.
    pub fn did_change_text(&mut self, after: &str) -> Option<ContentChange> {
        if after == self.mirror {
            return None;
        }

        let change = match self.kind {
            TextDocumentSyncKind::None => None,
            TextDocumentSyncKind::Full => Some(full_change(after)),
            TextDocumentSyncKind::Incremental => Some(diff(&self.mirror, after)),
        };

        self.mirror = after.to_string();
        if change.is_some() {
            self.version += 1;
            trace!(version = self.version, "document change computed");
        }
        change
    }

    /// Describe a sequence of buffer mutations, one event per record, in application order.
    ///
    /// Each event is computed against the mirror as it stood right before that record, so a
    /// server replaying them in order ends up with the same text. Nothing is recorded if any
    /// record does not line up with the mirror.
    pub fn did_apply_edits(
        &mut self,
        records: &[TextDeltaEdit],
    ) -> Result<Vec<ContentChange>, SyncError> {
        let mut mirror = self.mirror.clone();
        let mut changes = Vec::with_capacity(records.len());

        for record in records {
            let after = record.apply_to(&mirror).ok_or(SyncError::BadRange {
                start: record.start,
                end: record.end(),
                reason: "mutation record does not match the synced text",
            })?;

            match self.kind {
                TextDocumentSyncKind::None => {}
                TextDocumentSyncKind::Full => changes.push(full_change(&after)),
                TextDocumentSyncKind::Incremental => {
                    let chars: Vec<char> = mirror.chars().collect();
                    if splits_crlf(&chars, record.start) || splits_crlf(&chars, record.end()) {
                        // Protocol positions cannot address the inside of a line break.
                        changes.push(diff(&mirror, &after));
                    } else {
                        changes.push(record_to_change(&chars, record));
                    }
                }
            }
            mirror = after;
        }

        self.mirror = mirror;
        self.version += changes.len() as i32;
        trace!(
            version = self.version,
            events = changes.len(),
            "document changes recorded"
        );
        Ok(changes)
    }

    /// Full-text event for when the local text can no longer be correlated with the mirror
    /// (e.g. the buffer was replaced wholesale).
    pub fn resync(&mut self, text: &str) -> Option<ContentChange> {
        self.mirror = text.to_string();
        if self.kind == TextDocumentSyncKind::None {
            return None;
        }
        self.version += 1;
        Some(full_change(text))
    }

    /// Build `textDocument/didChange` params for `changes` at the current version.
    pub fn did_change_params(&self, uri: &str, changes: &[ContentChange]) -> Value {
        json!({
            "textDocument": { "uri": uri, "version": self.version },
            "contentChanges": changes.iter().map(ContentChange::to_value).collect::<Vec<_>>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn incremental(
        start: (u32, u32),
        end: (u32, u32),
        range_length: u32,
        text: &str,
    ) -> ContentChange {
        ContentChange::Incremental {
            range: LspRange::new(
                LspPosition::new(start.0, start.1),
                LspPosition::new(end.0, end.1),
            ),
            range_length,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_diff_pure_insertion() {
        assert_eq!(
            diff("Hello", "Hello World"),
            incremental((0, 5), (0, 5), 0, " World")
        );
    }

    #[test]
    fn test_diff_pure_deletion_of_last_line() {
        assert_eq!(
            diff("line1\nline2\nline3\n", "line1\nline2\n"),
            incremental((2, 0), (3, 0), 6, "")
        );
    }

    #[test]
    fn test_diff_replace_in_middle() {
        assert_eq!(
            diff("Hello World", "Hallo World"),
            incremental((0, 1), (0, 2), 1, "a")
        );
    }

    #[test]
    fn test_diff_identical_texts_is_empty_change() {
        assert_eq!(diff("same", "same"), incremental((0, 4), (0, 4), 0, ""));
    }

    #[test]
    fn test_diff_repeated_characters_do_not_overlap() {
        // Prefix "aa" and suffix would both match the whole of `before`; the suffix is bounded.
        let change = diff("aa", "aaa");
        assert_eq!(change, incremental((0, 2), (0, 2), 0, "a"));
        assert_eq!(change.apply_to("aa").unwrap(), "aaa");
    }

    #[test]
    fn test_diff_never_splits_crlf() {
        let change = diff("a\r\nb", "a\nb");
        assert_eq!(change, incremental((0, 1), (1, 0), 2, "\n"));
        assert_eq!(change.apply_to("a\r\nb").unwrap(), "a\nb");

        let change = diff("a\nb", "a\r\nb");
        assert_eq!(change.apply_to("a\nb").unwrap(), "a\r\nb");
    }

    #[test]
    fn test_diff_counts_utf16_units() {
        let change = diff("👋 a", "👋 b");
        assert_eq!(change, incremental((0, 3), (0, 4), 1, "b"));

        let change = diff("x👋y", "xy");
        assert_eq!(change, incremental((0, 1), (0, 3), 2, ""));
    }

    #[test]
    fn test_content_change_json_shapes() {
        let change = incremental((0, 5), (0, 5), 0, " World");
        assert_eq!(
            change.to_value(),
            json!({
                "range": {
                    "start": { "line": 0, "character": 5 },
                    "end": { "line": 0, "character": 5 }
                },
                "rangeLength": 0,
                "text": " World"
            })
        );
        assert_eq!(ContentChange::from_value(&change.to_value()), Some(change));
        assert_eq!(
            ContentChange::from_value(&json!({ "text": "all" })),
            Some(ContentChange::Full {
                text: "all".to_string()
            })
        );
    }

    #[test]
    fn test_content_change_rejects_oversized_range_length() {
        let range = json!({
            "start": { "line": 0, "character": 0 },
            "end": { "line": 0, "character": 1 }
        });
        assert_eq!(
            ContentChange::from_value(&json!({
                "range": range,
                "rangeLength": 4294967297u64,
                "text": ""
            })),
            None
        );
        assert_eq!(
            ContentChange::from_value(&json!({ "range": range, "text": "x" })),
            Some(incremental((0, 0), (0, 1), 0, "x"))
        );
    }

    #[test]
    fn test_document_sync_full_mode_sends_whole_text() {
        let mut sync = DocumentSync::new("", TextDocumentSyncKind::Full);
        assert_eq!(
            sync.did_change_text("Hello"),
            Some(full_change("Hello"))
        );
        assert_eq!(
            sync.did_change_text("Hello World"),
            Some(full_change("Hello World"))
        );
        assert_eq!(sync.version(), 2);
    }

    #[test]
    fn test_document_sync_none_mode_tracks_text_silently() {
        let mut sync = DocumentSync::new("a", TextDocumentSyncKind::None);
        assert_eq!(sync.did_change_text("ab"), None);
        assert_eq!(sync.text(), "ab");
        assert_eq!(sync.version(), 0);
        assert_eq!(sync.resync("abc"), None);
    }

    #[test]
    fn test_document_sync_records_keep_application_order() {
        let mut sync = DocumentSync::new("", TextDocumentSyncKind::Incremental);
        let records = (0..5)
            .scan(0usize, |offset, i| {
                let text = format!("{i}\n");
                let record = TextDeltaEdit::new(*offset, "", text.clone());
                *offset += text.chars().count();
                Some(record)
            })
            .collect::<Vec<_>>();

        let changes = sync.did_apply_edits(&records).unwrap();
        assert_eq!(changes.len(), 5);
        for (i, change) in changes.iter().enumerate() {
            assert_eq!(change.text(), format!("{i}\n"));
            assert_eq!(change.range().unwrap().start, LspPosition::new(i as u32, 0));
        }
        assert_eq!(sync.text(), "0\n1\n2\n3\n4\n");
        assert_eq!(sync.version(), 5);
    }

    #[test]
    fn test_document_sync_record_inside_crlf_is_rediffed() {
        let mut sync = DocumentSync::new("a\r\nb", TextDocumentSyncKind::Incremental);
        let changes = sync
            .did_apply_edits(&[TextDeltaEdit::new(2, "", "X")])
            .unwrap();

        assert_eq!(changes, vec![incremental((0, 1), (1, 0), 2, "\rX\n")]);
        assert_eq!(changes[0].apply_to("a\r\nb").unwrap(), "a\rX\nb");
    }

    #[test]
    fn test_document_sync_rejects_mismatched_record_atomically() {
        let mut sync = DocumentSync::new("abc", TextDocumentSyncKind::Incremental);
        let records = vec![
            TextDeltaEdit::new(0, "a", "A"),
            TextDeltaEdit::new(1, "zz", ""),
        ];
        assert!(sync.did_apply_edits(&records).is_err());
        assert_eq!(sync.text(), "abc");
        assert_eq!(sync.version(), 0);
    }

    #[test]
    fn test_did_change_params_shape() {
        let mut sync = DocumentSync::new("a", TextDocumentSyncKind::Incremental).with_version(3);
        let change = sync.did_change_text("ab").unwrap();
        let params = sync.did_change_params("file:///tmp/a.txt", &[change]);
        assert_eq!(params["textDocument"]["version"], json!(4));
        assert_eq!(params["contentChanges"][0]["text"], json!("b"));
    }
}

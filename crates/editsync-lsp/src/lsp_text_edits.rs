//! `TextEdit` / `WorkspaceEdit` parsing and batch application.
//!
//! Servers send edits as JSON; this module parses the subset needed for formatting, rename and
//! `workspace/applyEdit` without pulling in `lsp-types`, and applies a batch atomically: every
//! edit is resolved and validated against the same snapshot before the first mutation.

use crate::error::SyncError;
use crate::lsp_sync::{LspRange, to_offset};
use crate::lsp_uri::same_document;
use editsync_core::{TextBuffer, TextDeltaEdit, TextSource};
use serde_json::{Value, json};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
/// A protocol `TextEdit`.
pub struct LspTextEdit {
    /// The range to replace (UTF-16 based line/character positions).
    pub range: LspRange,
    /// Replacement text (may contain newlines).
    pub new_text: String,
}

impl LspTextEdit {
    /// Create an edit.
    pub fn new(range: LspRange, new_text: impl Into<String>) -> Self {
        Self {
            range,
            new_text: new_text.into(),
        }
    }

    /// Parse a `TextEdit`-shaped JSON value. A missing `newText` is treated as empty.
    pub fn from_value(value: &Value) -> Option<Self> {
        let range = LspRange::from_value(value.get("range")?)?;
        let new_text = value
            .get("newText")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        Some(Self { range, new_text })
    }

    /// Serialize as a protocol `TextEdit`.
    pub fn to_value(&self) -> Value {
        json!({ "range": self.range.to_value(), "newText": self.new_text })
    }
}

/// Parse a JSON array of `TextEdit` values, skipping malformed entries.
pub fn text_edits_from_value(value: &Value) -> Vec<LspTextEdit> {
    value
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(LspTextEdit::from_value)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default()
}

/// Extract all `TextEdit`s in a `WorkspaceEdit` for the given `uri`.
///
/// Reads both `changes[uri]` and the `TextDocumentEdit` entries of `documentChanges` (resource
/// operations such as `create`/`rename` are skipped). URIs are compared with
/// [`same_document`].
pub fn workspace_edit_text_edits_for_uri(workspace_edit: &Value, uri: &str) -> Vec<LspTextEdit> {
    let mut out = Vec::<LspTextEdit>::new();

    if let Some(changes) = workspace_edit.get("changes").and_then(Value::as_object) {
        for (change_uri, edits) in changes {
            if same_document(change_uri, uri) {
                out.extend(text_edits_from_value(edits));
            }
        }
    }

    if let Some(document_changes) = workspace_edit
        .get("documentChanges")
        .and_then(Value::as_array)
    {
        for change in document_changes {
            let Some(change_uri) = change
                .get("textDocument")
                .and_then(|doc| doc.get("uri"))
                .and_then(Value::as_str)
            else {
                continue;
            };
            if !same_document(change_uri, uri) {
                continue;
            }

            if let Some(edits) = change.get("edits") {
                out.extend(text_edits_from_value(edits));
            }
        }
    }

    out
}

/// An edit resolved to character offsets of one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceEdit {
    /// Start offset (inclusive).
    pub start: usize,
    /// End offset (exclusive).
    pub end: usize,
    /// Replacement text.
    pub new_text: String,
}

impl ReplaceEdit {
    /// Create a resolved edit.
    pub fn new(start: usize, end: usize, new_text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            new_text: new_text.into(),
        }
    }

    /// Resolve `edit` against `source`.
    ///
    /// An inverted range is swapped and an end beyond the document is clipped to the document
    /// end; both are logged. A start line beyond the document is an error.
    pub fn resolve<S: TextSource + ?Sized>(
        edit: &LspTextEdit,
        source: &S,
    ) -> Result<Self, SyncError> {
        if edit.range.is_inverted() {
            debug!(range = ?edit.range, "swapping inverted edit range");
        }
        let range = edit.range.normalized();

        let start = to_offset(range.start, source)?;
        let end = clip_end(to_offset(range.end, source), source)?;

        Ok(Self::new(start, end, edit.new_text.clone()))
    }
}

// End offsets past the document are tolerated and clipped.
pub(crate) fn clip_end<S: TextSource + ?Sized>(
    end: Result<usize, SyncError>,
    source: &S,
) -> Result<usize, SyncError> {
    let len = source.len_chars();
    match end {
        Ok(end) if end <= len => Ok(end),
        Ok(end) => {
            debug!(end, len, "clipping edit end to the document end");
            Ok(len)
        }
        Err(SyncError::PositionOutOfRange { position, .. }) => {
            debug!(%position, len, "clipping edit end to the document end");
            Ok(len)
        }
        Err(err) => Err(err),
    }
}

/// Mutation records of an applied batch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct AppliedBatch {
    /// Records in application order.
    pub(crate) records: Vec<TextDeltaEdit>,
    // `order[k]` is the input index of `records[k]`.
    order: Vec<usize>,
}

impl AppliedBatch {
    /// Offset in the final document where the new text of input edit `index` begins.
    pub(crate) fn final_start(&self, index: usize) -> Option<usize> {
        let applied = self.order.iter().position(|&i| i == index)?;
        let record = &self.records[applied];
        let shift: isize = self.records[applied + 1..]
            .iter()
            .filter(|later| later.start < record.start)
            .map(TextDeltaEdit::len_delta)
            .sum();
        record.start.checked_add_signed(shift)
    }
}

/// Validate a batch: every range in bounds and no two ranges overlapping.
pub(crate) fn validate_batch(edits: &[ReplaceEdit], len: usize) -> Result<(), SyncError> {
    for edit in edits {
        if edit.start > edit.end {
            return Err(SyncError::BadRange {
                start: edit.start,
                end: edit.end,
                reason: "start is after end",
            });
        }
        if edit.end > len {
            return Err(SyncError::BadRange {
                start: edit.start,
                end: edit.end,
                reason: "range extends past the document end",
            });
        }
    }

    let mut sorted: Vec<&ReplaceEdit> = edits.iter().collect();
    sorted.sort_by_key(|edit| (edit.start, edit.end));
    for pair in sorted.windows(2) {
        if pair[1].start < pair[0].end {
            return Err(SyncError::BadRange {
                start: pair[1].start,
                end: pair[1].end,
                reason: "overlaps another edit in the batch",
            });
        }
    }

    Ok(())
}

/// Apply a resolved batch: validate everything, then mutate in descending start order.
///
/// Edits sharing a start offset are applied in input order, each one after the text inserted by
/// the previous, so the result matches the protocol rule that the array order decides.
pub(crate) fn apply_batch<B: TextBuffer + ?Sized>(
    buffer: &mut B,
    edits: Vec<ReplaceEdit>,
) -> Result<AppliedBatch, SyncError> {
    validate_batch(&edits, buffer.len_chars())?;

    let mut indices: Vec<usize> = (0..edits.len()).collect();
    indices.sort_by_key(|&i| (std::cmp::Reverse(edits[i].start), i));

    let mut batch = AppliedBatch::default();
    let mut k = 0;
    while k < indices.len() {
        let start = edits[indices[k]].start;
        let mut cursor = start;
        while k < indices.len() && edits[indices[k]].start == start {
            let index = indices[k];
            let edit = &edits[index];
            let record = buffer.replace(cursor..cursor + (edit.end - edit.start), &edit.new_text)?;
            cursor += record.inserted_len();
            batch.records.push(record);
            batch.order.push(index);
            k += 1;
        }
    }

    Ok(batch)
}

/// Apply a list of server `TextEdit`s (formatting, rename, `workspace/applyEdit`) to `buffer`.
///
/// All edits are positioned against the buffer as it is now. The batch is all-or-nothing: a
/// start line beyond the document or overlapping ranges fail before any mutation. Returns the
/// mutation records in application order.
pub fn apply_text_edits<B: TextBuffer + ?Sized>(
    buffer: &mut B,
    edits: &[LspTextEdit],
) -> Result<Vec<TextDeltaEdit>, SyncError> {
    let resolved = edits
        .iter()
        .map(|edit| ReplaceEdit::resolve(edit, &*buffer))
        .collect::<Result<Vec<_>, _>>()
        .inspect_err(|err| warn!(%err, "rejecting text edit batch"))?;

    let batch = apply_batch(buffer, resolved)
        .inspect_err(|err| warn!(%err, "rejecting text edit batch"))?;
    Ok(batch.records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lsp_sync::LspPosition;
    use editsync_core::RopeBuffer;
    use pretty_assertions::assert_eq;

    fn edit(sl: u32, sc: u32, el: u32, ec: u32, text: &str) -> LspTextEdit {
        LspTextEdit::new(
            LspRange::new(LspPosition::new(sl, sc), LspPosition::new(el, ec)),
            text,
        )
    }

    #[test]
    fn test_parse_text_edit_array() {
        let value = json!([
            { "range": { "start": { "line": 0, "character": 1 }, "end": { "line": 0, "character": 2 } }, "newText": "x" },
            { "range": { "start": { "line": 1 } }, "newText": "skipped" },
            { "range": { "start": { "line": 2, "character": 0 }, "end": { "line": 2, "character": 0 } } }
        ]);
        let edits = text_edits_from_value(&value);
        assert_eq!(edits, vec![edit(0, 1, 0, 2, "x"), edit(2, 0, 2, 0, "")]);
        assert_eq!(edits[0].to_value(), value[0]);
    }

    #[test]
    fn test_descending_application_keeps_offsets_valid() {
        let mut buffer = RopeBuffer::from_text("let a = 1;\nlet b = 2;\n");
        let records = apply_text_edits(
            &mut buffer,
            &[edit(0, 4, 0, 5, "alpha"), edit(1, 4, 1, 5, "beta")],
        )
        .unwrap();

        assert_eq!(buffer.text(), "let alpha = 1;\nlet beta = 2;\n");
        assert_eq!(
            records,
            vec![
                TextDeltaEdit::new(15, "b", "beta"),
                TextDeltaEdit::new(4, "a", "alpha"),
            ]
        );
    }

    #[test]
    fn test_same_position_inserts_keep_array_order() {
        let mut buffer = RopeBuffer::from_text("ab");
        apply_text_edits(
            &mut buffer,
            &[edit(0, 1, 0, 1, "1"), edit(0, 1, 0, 1, "2"), edit(0, 1, 0, 2, "3")],
        )
        .unwrap();
        assert_eq!(buffer.text(), "a123");
    }

    #[test]
    fn test_overlap_rejects_whole_batch() {
        let mut buffer = RopeBuffer::from_text("abcdef");
        let err = apply_text_edits(&mut buffer, &[edit(0, 0, 0, 3, "x"), edit(0, 2, 0, 4, "y")])
            .unwrap_err();
        assert!(matches!(err, SyncError::BadRange { start: 2, end: 4, .. }));
        assert_eq!(buffer.text(), "abcdef");
        assert_eq!(buffer.modification_stamp(), 0);
    }

    #[test]
    fn test_start_line_past_end_rejects_batch() {
        let mut buffer = RopeBuffer::from_text("ab");
        let err = apply_text_edits(&mut buffer, &[edit(0, 0, 0, 1, "x"), edit(5, 0, 5, 0, "y")])
            .unwrap_err();
        assert!(err.is_out_of_range());
        assert_eq!(buffer.text(), "ab");
    }

    #[test]
    fn test_end_past_document_is_clipped_and_inverted_swapped() {
        let mut buffer = RopeBuffer::from_text("one\ntwo");
        apply_text_edits(&mut buffer, &[edit(1, 0, 9, 0, "2")]).unwrap();
        assert_eq!(buffer.text(), "one\n2");

        apply_text_edits(&mut buffer, &[edit(1, 0, 0, 0, "")]).unwrap();
        assert_eq!(buffer.text(), "2");
    }

    #[test]
    fn test_final_start_accounts_for_earlier_edits() {
        let mut buffer = RopeBuffer::from_text("0123456789");
        let batch = apply_batch(
            &mut buffer,
            vec![
                ReplaceEdit::new(5, 6, "FIVE"),
                ReplaceEdit::new(0, 2, ""),
                ReplaceEdit::new(8, 8, "!"),
            ],
        )
        .unwrap();
        assert_eq!(buffer.text(), "234FIVE67!89");
        assert_eq!(batch.final_start(0), Some(3));
        assert_eq!(batch.final_start(2), Some(9));
        assert_eq!(batch.final_start(1), Some(0));
    }

    #[test]
    fn test_workspace_edit_changes_and_document_changes() {
        let workspace_edit = json!({
            "changes": {
                "file:///tmp/a.rs": [
                    { "range": { "start": { "line": 0, "character": 0 }, "end": { "line": 0, "character": 0 } }, "newText": "a" }
                ],
                "file:///tmp/b.rs": [
                    { "range": { "start": { "line": 0, "character": 0 }, "end": { "line": 0, "character": 0 } }, "newText": "b" }
                ]
            },
            "documentChanges": [
                { "kind": "create", "uri": "file:///tmp/c.rs" },
                {
                    "textDocument": { "uri": "file:///tmp/a.rs", "version": 3 },
                    "edits": [
                        { "range": { "start": { "line": 1, "character": 0 }, "end": { "line": 1, "character": 2 } }, "newText": "c" }
                    ]
                }
            ]
        });

        let edits = workspace_edit_text_edits_for_uri(&workspace_edit, "file:///tmp/a.rs");
        assert_eq!(edits, vec![edit(0, 0, 0, 0, "a"), edit(1, 0, 1, 2, "c")]);
        assert!(workspace_edit_text_edits_for_uri(&workspace_edit, "file:///tmp/z.rs").is_empty());
    }
}

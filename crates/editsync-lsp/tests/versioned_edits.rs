use editsync_core::{RopeBuffer, TextBuffer, TextSource};
use editsync_lsp::{
    DetachedLinkedMode, DocumentSync, EditApplier, LspPosition, LspRange, LspTextEdit,
    ModificationStamp, SyncError, TextDocumentSyncKind, apply_text_edits, text_edits_from_value,
    workspace_edit_text_edits_for_uri,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn edit(line: u32, start: u32, end: u32, text: &str) -> LspTextEdit {
    LspTextEdit::new(
        LspRange::new(LspPosition::new(line, start), LspPosition::new(line, end)),
        text,
    )
}

fn formatting_edits() -> Vec<LspTextEdit> {
    vec![
        edit(0, 0, 1, "MyF"),
        edit(0, 10, 11, ""),
        edit(0, 21, 21, " Second"),
    ]
}

#[test]
fn test_formatting_batch_applies_when_unchanged() {
    let mut buffer = RopeBuffer::from_text("Formatting Other Text");
    let mut sync = DocumentSync::new(buffer.text(), TextDocumentSyncKind::Incremental);
    let batch = ModificationStamp::capture(&buffer).with_edits(formatting_edits());

    let applier = EditApplier::new(DetachedLinkedMode);
    let records = applier.apply_if_unchanged(&mut buffer, batch).unwrap();
    assert_eq!(buffer.text(), "MyFormattingOther Text Second");

    let changes = sync.did_apply_edits(&records).unwrap();
    assert_eq!(changes.len(), 3);
    let replayed = changes
        .iter()
        .fold("Formatting Other Text".to_string(), |text, change| {
            change.apply_to(&text).unwrap()
        });
    assert_eq!(replayed, buffer.text());
}

#[test]
fn test_formatting_batch_fails_after_modification() {
    let mut buffer = RopeBuffer::from_text("Formatting Other Text");
    let batch = ModificationStamp::capture(&buffer).with_edits(formatting_edits());
    buffer.replace(0..0, "Hello").unwrap();

    let applier = EditApplier::new(DetachedLinkedMode);
    let err = applier.apply_if_unchanged(&mut buffer, batch).unwrap_err();
    assert!(matches!(err, SyncError::ConcurrentModification { .. }));
    assert_eq!(buffer.text(), "HelloFormatting Other Text");
}

#[test]
fn test_stale_batch_leaves_buffer_as_modified() {
    let mut buffer = RopeBuffer::from_text("ab");
    let stamp = ModificationStamp::capture(&buffer);
    buffer.replace(2..2, "c").unwrap();

    let batch = stamp.with_edits(vec![edit(0, 0, 2, "zz")]);
    let err = EditApplier::new(DetachedLinkedMode)
        .apply_if_unchanged(&mut buffer, batch)
        .unwrap_err();

    assert_eq!(
        err,
        SyncError::ConcurrentModification {
            captured: stamp.value(),
            current: stamp.value() + 1,
        }
    );
    assert_eq!(buffer.text(), "abc");
}

#[test]
fn test_workspace_apply_edit_for_open_document() {
    let mut buffer = RopeBuffer::from_text("let old = 1;\nold + old\n");
    let params = json!({
        "label": "rename",
        "edit": {
            "documentChanges": [{
                "textDocument": { "uri": "file:///work/main.rs", "version": 4 },
                "edits": [
                    { "range": { "start": { "line": 0, "character": 4 }, "end": { "line": 0, "character": 7 } }, "newText": "new" },
                    { "range": { "start": { "line": 1, "character": 0 }, "end": { "line": 1, "character": 3 } }, "newText": "new" },
                    { "range": { "start": { "line": 1, "character": 6 }, "end": { "line": 1, "character": 9 } }, "newText": "new" }
                ]
            }]
        }
    });

    let edits = workspace_edit_text_edits_for_uri(&params["edit"], "file:///work/main.rs");
    apply_text_edits(&mut buffer, &edits).unwrap();
    assert_eq!(buffer.text(), "let new = 1;\nnew + new\n");
}

#[test]
fn test_overlapping_server_batch_is_rejected_whole() {
    let mut buffer = RopeBuffer::from_text("abcdef");
    let edits = text_edits_from_value(&json!([
        { "range": { "start": { "line": 0, "character": 0 }, "end": { "line": 0, "character": 2 } }, "newText": "X" },
        { "range": { "start": { "line": 0, "character": 1 }, "end": { "line": 0, "character": 3 } }, "newText": "Y" }
    ]));

    let err = apply_text_edits(&mut buffer, &edits).unwrap_err();
    assert!(matches!(err, SyncError::BadRange { .. }));
    assert_eq!(buffer.text(), "abcdef");
    assert_eq!(buffer.modification_stamp(), 0);
}

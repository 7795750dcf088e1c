//! Completion items (LSP → [`EditProposal`]).
//!
//! Supported shapes:
//! - `CompletionItem.textEdit` as `TextEdit`
//! - `CompletionItem.textEdit` as `InsertReplaceEdit` (choose insert vs replace)
//! - no `textEdit`: `insertText` (or `label`) inserted over the completed prefix
//! - `CompletionList.itemDefaults` (`editRange`, `insertTextFormat`, `insertTextMode`)
//! - `additionalTextEdits`, `insertTextFormat`, `insertTextMode`

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::lsp_apply::{
    AppliedEdit, DocumentContext, EditApplier, EditProposal, InsertTextFormat, LinkedModeInstaller,
};
use crate::lsp_sync::{LspRange, offsets_to_range};
use crate::lsp_text_edits::{LspTextEdit, text_edits_from_value};
use editsync_core::{TextBuffer, TextSource};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Which range to apply when a completion item uses an LSP `InsertReplaceEdit`.
pub enum CompletionTextEditMode {
    /// Use the `insert` range (usually less destructive).
    #[default]
    Insert,
    /// Use the `replace` range.
    Replace,
}

const INSERT_TEXT_MODE_ADJUST_INDENTATION: u64 = 2;

/// Split a completion response into its items and the list's `itemDefaults`.
///
/// Accepts both a bare `CompletionItem[]` and a `CompletionList`.
pub fn completion_items(response: &Value) -> (&[Value], Option<&Value>) {
    if let Some(items) = response.as_array() {
        return (items.as_slice(), None);
    }

    let items = response
        .get("items")
        .and_then(Value::as_array)
        .map_or(&[][..], Vec::as_slice);
    (items, response.get("itemDefaults"))
}

// Field of the item, falling back to the list defaults.
fn field<'a>(item: &'a Value, defaults: Option<&'a Value>, name: &str) -> Option<&'a Value> {
    item.get(name).or_else(|| defaults?.get(name))
}

fn edit_range(value: &Value, mode: CompletionTextEditMode) -> Option<LspRange> {
    if let Some(range) = LspRange::from_value(value) {
        return Some(range);
    }

    // `InsertReplaceEdit` / `itemDefaults.editRange` as `{ insert, replace }`
    let key = match mode {
        CompletionTextEditMode::Insert => "insert",
        CompletionTextEditMode::Replace => "replace",
    };
    LspRange::from_value(value.get(key)?)
}

/// The server-supplied main edit of `item`, if any.
///
/// Uses `textEdit` when present, otherwise `itemDefaults.editRange` with `textEditText`,
/// `insertText` or `label` as the text.
pub fn completion_item_main_text_edit(
    item: &Value,
    defaults: Option<&Value>,
    mode: CompletionTextEditMode,
) -> Option<LspTextEdit> {
    if let Some(text_edit) = item.get("textEdit") {
        let new_text = text_edit.get("newText").and_then(Value::as_str)?;
        let range = text_edit
            .get("range")
            .and_then(LspRange::from_value)
            .or_else(|| edit_range(text_edit, mode))?;
        return Some(LspTextEdit::new(range, new_text));
    }

    let range = edit_range(defaults?.get("editRange")?, mode)?;
    let new_text = item
        .get("textEditText")
        .and_then(Value::as_str)
        .or_else(|| completion_item_insert_text(item))?;
    Some(LspTextEdit::new(range, new_text))
}

/// `insertText`, falling back to `label`.
pub fn completion_item_insert_text(item: &Value) -> Option<&str> {
    item.get("insertText")
        .and_then(Value::as_str)
        .or_else(|| item.get("label").and_then(Value::as_str))
}

/// Start of the text that `insert_text` completes.
///
/// Finds the longest run of characters ending at `offset` that is a prefix of `insert_text`
/// (for `"pri|"` and `"println!"` that is `"pri"`). Returns `offset` when nothing matches.
pub fn prefix_completion_start<S: TextSource + ?Sized>(
    source: &S,
    offset: usize,
    insert_text: &str,
) -> usize {
    let text: Vec<char> = insert_text.chars().collect();
    let window_len = text.len().min(offset);
    let Ok(window) = source.slice(offset - window_len..offset) else {
        return offset;
    };
    let window: Vec<char> = window.chars().collect();

    (0..window.len())
        .find(|&i| text.starts_with(&window[i..]))
        .map_or(offset, |i| offset - (window.len() - i))
}

/// Build the [`EditProposal`] for accepting `item` with the caret at `request_offset`.
pub fn completion_item_to_proposal<S: TextSource + ?Sized>(
    source: &S,
    item: &Value,
    defaults: Option<&Value>,
    request_offset: usize,
    config: &SyncConfig,
) -> Result<EditProposal, SyncError> {
    let proposal = match completion_item_main_text_edit(item, defaults, config.completion_mode) {
        Some(edit) => EditProposal::text_edit(edit, request_offset),
        None => {
            let text = completion_item_insert_text(item)
                .filter(|text| !text.is_empty())
                .ok_or(SyncError::NothingToApply)?;
            let start = prefix_completion_start(source, request_offset, text);
            let range = offsets_to_range(start, request_offset, source)?;
            EditProposal::plain_insertion(LspTextEdit::new(range, text), request_offset)
        }
    };

    let format = field(item, defaults, "insertTextFormat")
        .and_then(Value::as_u64)
        .and_then(InsertTextFormat::from_protocol)
        .unwrap_or_default();
    let adjust_indentation = config.adjust_indentation
        && field(item, defaults, "insertTextMode").and_then(Value::as_u64)
            == Some(INSERT_TEXT_MODE_ADJUST_INDENTATION);
    let additional = item
        .get("additionalTextEdits")
        .map(text_edits_from_value)
        .unwrap_or_default();

    Ok(proposal
        .with_format(format)
        .with_adjust_indentation(adjust_indentation)
        .with_additional_edits(additional))
}

/// Accept `item`: build its proposal against `buffer` and apply it.
///
/// `request_offset` is the caret when completion was requested and `apply_offset` the caret now.
#[allow(clippy::too_many_arguments)]
pub fn apply_completion_item<B, I>(
    applier: &mut EditApplier<I>,
    buffer: &mut B,
    item: &Value,
    defaults: Option<&Value>,
    request_offset: usize,
    apply_offset: usize,
    config: &SyncConfig,
    context: &DocumentContext,
) -> Result<AppliedEdit<I::Handle>, SyncError>
where
    B: TextBuffer + ?Sized,
    I: LinkedModeInstaller,
{
    let proposal = completion_item_to_proposal(&*buffer, item, defaults, request_offset, config)?;
    applier.apply_in_document(buffer, proposal, apply_offset, context)
}

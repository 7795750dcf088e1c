#![warn(missing_docs)]
//! `editsync-lsp` - keeps an editor buffer and a language server in agreement.
//!
//! Outbound, local mutations become ordered `textDocument/didChange` content changes
//! ([`DocumentSync`], [`diff`]). Inbound, server edits (completions with snippets, formatting
//! batches, workspace edits) are converted from UTF-16 positions to buffer offsets, reconciled
//! with whatever the user typed meanwhile and applied atomically ([`EditApplier`],
//! [`VersionedEdits`], [`apply_text_edits`]).
//!
//! The crate works on [`editsync_core::TextBuffer`] and speaks JSON through
//! `serde_json::Value`; it has no transport and installs no `tracing` subscriber.
//!
//! # Quick Start
//!
//! ```rust
//! use editsync_core::{RopeBuffer, TextSource};
//! use editsync_lsp::{
//!     DetachedLinkedMode, DocumentSync, EditApplier, EditProposal, InsertTextFormat,
//!     LspPosition, LspRange, LspTextEdit, NoVariables, TextDocumentSyncKind,
//! };
//!
//! let mut buffer = RopeBuffer::from_text("fn main() {\n    pri\n}\n");
//! let mut sync = DocumentSync::new(buffer.text(), TextDocumentSyncKind::Incremental);
//!
//! let edit = LspTextEdit::new(
//!     LspRange::new(LspPosition::new(1, 4), LspPosition::new(1, 7)),
//!     "println!(\"${1:msg}\")$0",
//! );
//! let proposal = EditProposal::text_edit(edit, 19).with_format(InsertTextFormat::Snippet);
//!
//! let mut applier = EditApplier::new(DetachedLinkedMode);
//! let applied = applier.apply(&mut buffer, proposal, 19, &NoVariables).unwrap();
//! assert_eq!(buffer.text(), "fn main() {\n    println!(\"msg\")\n}\n");
//! assert_eq!(applied.selection, 26..29);
//!
//! let changes = sync.did_apply_edits(&applied.records).unwrap();
//! assert_eq!(changes.len(), 1);
//! assert_eq!(sync.text(), buffer.text());
//! ```

pub mod config;
pub mod error;
pub mod lsp_apply;
pub mod lsp_completion;
pub mod lsp_diff;
pub mod lsp_snippet;
pub mod lsp_sync;
pub mod lsp_text_edits;
pub mod lsp_uri;
pub mod lsp_variables;
pub mod lsp_versioned;

pub use config::{SyncConfig, TextDocumentSyncKind};
pub use error::SyncError;
pub use lsp_apply::{
    AppliedEdit, ApplyOptions, DetachedLinkedMode, DocumentContext, EditApplier, EditOrigin,
    EditProposal, InsertTextFormat, LinkedGroup, LinkedModeInstaller, LinkedSession,
};
pub use lsp_completion::{
    CompletionTextEditMode, apply_completion_item, completion_item_insert_text,
    completion_item_main_text_edit, completion_item_to_proposal, completion_items,
    prefix_completion_start,
};
pub use lsp_diff::{ContentChange, DocumentSync, diff, full_change};
pub use lsp_snippet::{
    NoVariables, RepeatedTabstops, SnippetExpansion, SnippetGroup, SnippetOptions,
    SnippetVariable, TabstopPosition, VariableResolver, expand, expand_with, substitute_variables,
};
pub use lsp_sync::{
    LspCoordinateConverter, LspPosition, LspRange, offsets_to_range, range_to_offsets,
    to_offset, to_position,
};
pub use lsp_text_edits::{
    LspTextEdit, ReplaceEdit, apply_text_edits, text_edits_from_value,
    workspace_edit_text_edits_for_uri,
};
pub use lsp_uri::{
    file_uri_to_path, path_to_file_uri, percent_decode_path, percent_encode_path, same_document,
};
pub use lsp_variables::DocumentVariables;
pub use lsp_versioned::{ModificationStamp, VersionedEdits};

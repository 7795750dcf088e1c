//! Engine configuration.
//!
//! A [`SyncConfig`] is static per session: the host builds it once (usually from a JSON settings
//! blob plus the server's `initialize` capabilities) and hands the relevant parts to
//! [`crate::DocumentSync`] and [`crate::EditApplier`].

use crate::lsp_apply::ApplyOptions;
use crate::lsp_completion::CompletionTextEditMode;
use crate::lsp_snippet::SnippetOptions;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How document changes are reported to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextDocumentSyncKind {
    /// Documents are not synced at all.
    None,
    /// Every change sends the full text.
    Full,
    /// Changes are sent as range replacements.
    #[default]
    Incremental,
}

impl TextDocumentSyncKind {
    /// Map the protocol's numeric `TextDocumentSyncKind`.
    pub fn from_protocol(value: u64) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Full),
            2 => Some(Self::Incremental),
            _ => None,
        }
    }

    /// Read the sync kind out of server `capabilities`.
    ///
    /// `textDocumentSync` may be a bare number or a `TextDocumentSyncOptions` object with a
    /// `change` field. A server that says nothing gets [`TextDocumentSyncKind::None`].
    pub fn from_capabilities(capabilities: &Value) -> Self {
        let Some(sync) = capabilities.get("textDocumentSync") else {
            return Self::None;
        };

        sync.as_u64()
            .or_else(|| sync.get("change").and_then(Value::as_u64))
            .and_then(Self::from_protocol)
            .unwrap_or(Self::None)
    }
}

/// Session-wide settings for the sync engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    /// Outbound change reporting mode.
    pub sync_kind: TextDocumentSyncKind,
    /// Snippet expansion behaviour.
    pub snippet: SnippetOptions,
    /// Which range to use for `InsertReplaceEdit` completions.
    pub completion_mode: CompletionTextEditMode,
    /// Honor `insertTextMode: adjustIndentation` on completion items.
    pub adjust_indentation: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_kind: TextDocumentSyncKind::default(),
            snippet: SnippetOptions::default(),
            completion_mode: CompletionTextEditMode::Insert,
            adjust_indentation: true,
        }
    }
}

impl SyncConfig {
    /// Parse settings from JSON text. Missing fields take their defaults.
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Parse settings from an already decoded JSON value.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Adopt the sync kind the server advertised in its `initialize` capabilities.
    pub fn with_server_capabilities(mut self, capabilities: &Value) -> Self {
        self.sync_kind = TextDocumentSyncKind::from_capabilities(capabilities);
        self
    }

    /// Options for an [`crate::EditApplier`].
    pub fn apply_options(&self) -> ApplyOptions {
        ApplyOptions {
            snippet: self.snippet,
        }
    }
}

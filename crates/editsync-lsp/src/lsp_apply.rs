//! Applying a proposed edit (typically an accepted completion) to a live buffer.
//!
//! The proposal was computed against the document as it stood when the request was issued; by
//! the time it is applied the user may have typed more. [`EditApplier::apply`] reconciles the
//! two, expands snippets, applies the primary and additional edits as one validated batch and
//! hands any tabstop groups to a [`LinkedModeInstaller`].

use crate::error::SyncError;
use crate::lsp_snippet::{
    NoVariables, SnippetExpansion, SnippetOptions, TabstopPosition, VariableResolver, expand_with,
};
use crate::lsp_sync::to_offset;
use crate::lsp_text_edits::{LspTextEdit, ReplaceEdit, apply_batch, clip_end};
use crate::lsp_variables::DocumentVariables;
use crate::lsp_versioned::VersionedEdits;
use editsync_core::{TextBuffer, TextDeltaEdit, TextSource};
use std::ops::Range;
use tracing::{debug, warn};

/// Settings for an [`EditApplier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApplyOptions {
    /// Snippet expansion behaviour.
    pub snippet: SnippetOptions,
}

/// Where the primary edit's range came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOrigin {
    /// The server supplied the range (`textEdit`).
    TextEdit,
    /// The client computed the range for plain insert text; characters already in the buffer
    /// after the caret may be reused.
    PlainInsertion,
}

/// How the primary edit's text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertTextFormat {
    /// Literal text.
    #[default]
    PlainText,
    /// Snippet syntax.
    Snippet,
}

impl InsertTextFormat {
    /// Map the protocol's numeric `InsertTextFormat`.
    pub fn from_protocol(value: u64) -> Option<Self> {
        match value {
            1 => Some(Self::PlainText),
            2 => Some(Self::Snippet),
            _ => None,
        }
    }
}

/// An edit proposed by the server, ready to be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditProposal {
    /// The main edit. Its range is relative to the document at `request_offset` time.
    pub primary: LspTextEdit,
    /// Origin of `primary`'s range.
    pub origin: EditOrigin,
    /// Format of `primary.new_text`.
    pub format: InsertTextFormat,
    /// Pre-computed expansion of `primary.new_text`; computed on apply when `None`.
    pub expansion: Option<SnippetExpansion>,
    /// Edits applied together with `primary`, e.g. auto-imports.
    pub additional: Vec<LspTextEdit>,
    /// Caret offset when the request was issued.
    pub request_offset: usize,
    /// Re-indent continuation lines of the inserted text to match the insertion point.
    pub adjust_indentation: bool,
}

impl EditProposal {
    /// Proposal whose range was supplied by the server.
    pub fn text_edit(primary: LspTextEdit, request_offset: usize) -> Self {
        Self {
            primary,
            origin: EditOrigin::TextEdit,
            format: InsertTextFormat::PlainText,
            expansion: None,
            additional: Vec::new(),
            request_offset,
            adjust_indentation: false,
        }
    }

    /// Proposal for client-computed plain insertion over `[prefix_start, request_offset]`.
    pub fn plain_insertion(primary: LspTextEdit, request_offset: usize) -> Self {
        Self {
            origin: EditOrigin::PlainInsertion,
            ..Self::text_edit(primary, request_offset)
        }
    }

    /// Set the text format.
    pub fn with_format(mut self, format: InsertTextFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the additional edits.
    pub fn with_additional_edits(mut self, additional: Vec<LspTextEdit>) -> Self {
        self.additional = additional;
        self
    }

    /// Enable or disable indentation adjustment.
    pub fn with_adjust_indentation(mut self, adjust: bool) -> Self {
        self.adjust_indentation = adjust;
        self
    }

    /// Use `expansion` instead of expanding `primary.new_text` on apply.
    pub fn with_expansion(mut self, expansion: SnippetExpansion) -> Self {
        self.expansion = Some(expansion);
        self
    }
}

/// A tabstop group with positions in absolute document offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedGroup {
    /// Tabstop key.
    pub key: String,
    /// Linked regions, in text order.
    pub positions: Vec<TabstopPosition>,
    /// Alternatives to offer while editing this group.
    pub choices: Vec<String>,
}

/// The UI side of linked editing: receives the groups of an applied snippet.
pub trait LinkedModeInstaller {
    /// Whatever the installer hands back to identify the session.
    type Handle;

    /// Start a linked editing session over `groups`; `exit` is where the caret goes when the
    /// session ends.
    fn install(&mut self, groups: Vec<LinkedGroup>, exit: usize) -> Self::Handle;
}

/// Installer for headless hosts: returns the session as plain data.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedLinkedMode;

impl LinkedModeInstaller for DetachedLinkedMode {
    type Handle = LinkedSession;

    fn install(&mut self, groups: Vec<LinkedGroup>, exit: usize) -> LinkedSession {
        LinkedSession {
            groups,
            exit,
            current: 0,
        }
    }
}

/// A linked editing session produced by [`DetachedLinkedMode`].
///
/// Navigation does not cycle: moving past the last group ends at the exit position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedSession {
    groups: Vec<LinkedGroup>,
    exit: usize,
    current: usize,
}

impl LinkedSession {
    /// All groups, in tab order.
    pub fn groups(&self) -> &[LinkedGroup] {
        &self.groups
    }

    /// Caret offset after the session ends.
    pub fn exit(&self) -> usize {
        self.exit
    }

    /// The group being edited, or `None` once the session reached its exit.
    pub fn current(&self) -> Option<&LinkedGroup> {
        self.groups.get(self.current)
    }

    /// Move to the next group.
    pub fn next_group(&mut self) -> Option<&LinkedGroup> {
        self.current = (self.current + 1).min(self.groups.len());
        self.current()
    }

    /// Move to the previous group.
    pub fn previous_group(&mut self) -> Option<&LinkedGroup> {
        self.current = self.current.saturating_sub(1);
        self.current()
    }
}

/// Outcome of [`EditApplier::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedEdit<H> {
    /// Selection to set after the edit, in character offsets.
    pub selection: Range<usize>,
    /// Linked editing session, if one was installed.
    pub session: Option<H>,
    /// Buffer mutations in application order.
    pub records: Vec<TextDeltaEdit>,
}

/// Extra document information used to resolve snippet variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentContext {
    /// Document URI, for the file variables.
    pub uri: Option<String>,
    /// Current selection; defaults to an empty selection at the apply offset.
    pub selection: Option<Range<usize>>,
}

/// Applies edit proposals and version-guarded batches to buffers.
#[derive(Debug, Clone, Default)]
pub struct EditApplier<I> {
    installer: I,
    options: ApplyOptions,
}

impl<I: LinkedModeInstaller> EditApplier<I> {
    /// Create an applier with default options.
    pub fn new(installer: I) -> Self {
        Self::with_options(installer, ApplyOptions::default())
    }

    /// Create an applier with `options`.
    pub fn with_options(installer: I, options: ApplyOptions) -> Self {
        Self { installer, options }
    }

    /// Current options.
    pub fn options(&self) -> ApplyOptions {
        self.options
    }

    /// The linked-mode installer.
    pub fn installer(&self) -> &I {
        &self.installer
    }

    /// Apply `proposal` to `buffer`.
    ///
    /// `apply_offset` is the caret offset now; if it moved past `proposal.request_offset`, the
    /// characters typed in between are replaced as well. Nothing is mutated when any edit of the
    /// batch is out of range or overlaps another.
    pub fn apply<B, R>(
        &mut self,
        buffer: &mut B,
        proposal: EditProposal,
        apply_offset: usize,
        resolver: &R,
    ) -> Result<AppliedEdit<I::Handle>, SyncError>
    where
        B: TextBuffer + ?Sized,
        R: VariableResolver + ?Sized,
    {
        let plan = plan_edits(&*buffer, proposal, apply_offset, resolver, self.options)
            .inspect_err(|err| warn!(%err, "edit proposal rejected"))?;
        let fallback_start = plan.edits[0].start;
        let batch = apply_batch(buffer, plan.edits)
            .inspect_err(|err| warn!(%err, "edit proposal rejected"))?;

        let insertion = batch.final_start(0).unwrap_or(fallback_start);
        let text_len = plan.expansion.char_len();
        let groups: Vec<LinkedGroup> = plan
            .expansion
            .groups
            .into_iter()
            .map(|group| LinkedGroup {
                key: group.key,
                positions: group
                    .positions
                    .into_iter()
                    .map(|position| position.shifted(insertion))
                    .collect(),
                choices: group.choices,
            })
            .collect();

        let only_place_caret =
            groups.len() == 1 && groups[0].positions.len() == 1 && groups[0].choices.is_empty();
        let region = |position: TabstopPosition| position.offset..position.offset + position.length;

        let (selection, session) = match groups.first() {
            None => (insertion + text_len..insertion + text_len, None),
            Some(first) if only_place_caret => (region(first.positions[0]), None),
            Some(first) => {
                let selection = first
                    .positions
                    .first()
                    .map_or(insertion..insertion, |&position| region(position));
                let session = self.installer.install(groups, insertion + text_len);
                (selection, Some(session))
            }
        };

        Ok(AppliedEdit {
            selection,
            session,
            records: batch.records,
        })
    }

    /// Apply `proposal`, resolving snippet variables from `buffer` itself.
    ///
    /// The current line is the start line of the primary edit.
    pub fn apply_in_document<B>(
        &mut self,
        buffer: &mut B,
        mut proposal: EditProposal,
        apply_offset: usize,
        context: &DocumentContext,
    ) -> Result<AppliedEdit<I::Handle>, SyncError>
    where
        B: TextBuffer + ?Sized,
    {
        if proposal.format == InsertTextFormat::Snippet && proposal.expansion.is_none() {
            let line = proposal.primary.range.normalized().start.line as usize;
            let selection = context
                .selection
                .clone()
                .unwrap_or(apply_offset..apply_offset);
            let mut variables = DocumentVariables::new(&*buffer, line).with_selection(selection);
            if let Some(uri) = &context.uri {
                variables = variables.with_uri(uri);
            }
            proposal.expansion = Some(expand_with(
                &proposal.primary.new_text,
                &variables,
                self.options.snippet,
            ));
        }

        self.apply(buffer, proposal, apply_offset, &NoVariables)
    }

    /// Apply a server batch only if `buffer` has not changed since the batch's stamp was taken.
    pub fn apply_if_unchanged<B>(
        &self,
        buffer: &mut B,
        batch: VersionedEdits,
    ) -> Result<Vec<TextDeltaEdit>, SyncError>
    where
        B: TextBuffer + ?Sized,
    {
        batch.apply(buffer)
    }
}

struct Plan {
    // Primary edit first.
    edits: Vec<ReplaceEdit>,
    expansion: SnippetExpansion,
}

fn plan_edits<S, R>(
    source: &S,
    proposal: EditProposal,
    apply_offset: usize,
    resolver: &R,
    options: ApplyOptions,
) -> Result<Plan, SyncError>
where
    S: TextSource + ?Sized,
    R: VariableResolver + ?Sized,
{
    let len = source.len_chars();
    let request_offset = proposal.request_offset;

    if proposal.primary.range.is_inverted() {
        debug!(range = ?proposal.primary.range, "swapping inverted completion range");
    }
    let range = proposal.primary.range.normalized();
    let start = to_offset(range.start, source)?;
    let mut end = clip_end(to_offset(range.end, source), source)?;

    if apply_offset > request_offset {
        end += apply_offset - request_offset;
    }

    if proposal.origin == EditOrigin::PlainInsertion {
        let text: Vec<char> = proposal.primary.new_text.chars().collect();
        let mut k = end.saturating_sub(start);
        while k < text.len() && source.char_at(end) == Some(text[k]) {
            end += 1;
            k += 1;
        }
    }

    if end > len {
        debug!(end, len, "clipping extended edit end to the document end");
        end = len;
    }
    if start > end {
        return Err(SyncError::BadRange {
            start,
            end,
            reason: "start is after end",
        });
    }

    let mut expansion = match (proposal.expansion, proposal.format) {
        (Some(expansion), _) => expansion,
        (None, InsertTextFormat::Snippet) => {
            expand_with(&proposal.primary.new_text, resolver, options.snippet)
        }
        (None, InsertTextFormat::PlainText) => SnippetExpansion::plain(proposal.primary.new_text),
    };
    if proposal.adjust_indentation {
        expansion = expansion.indented(&indentation_before(source, start));
    }

    let mut edits = Vec::with_capacity(1 + proposal.additional.len());
    edits.push(ReplaceEdit::new(start, end, expansion.text.clone()));

    for additional in &proposal.additional {
        let mut edit = ReplaceEdit::resolve(additional, source)?;
        // `start > request_offset` keeps a backwards shift at or after `apply_offset`.
        if edit.start > request_offset {
            edit.start = edit.start + apply_offset - request_offset;
            edit.end = edit.end + apply_offset - request_offset;
        }
        edits.push(edit);
    }

    Ok(Plan { edits, expansion })
}

// The run of non-newline whitespace ending at `offset`, even when other text comes before it.
fn indentation_before<S: TextSource + ?Sized>(source: &S, offset: usize) -> String {
    let mut indent = Vec::new();
    let mut i = offset;
    while i > 0 {
        match source.char_at(i - 1) {
            Some(c) if c.is_whitespace() && c != '\n' && c != '\r' => indent.push(c),
            _ => break,
        }
        i -= 1;
    }
    indent.iter().rev().collect()
}

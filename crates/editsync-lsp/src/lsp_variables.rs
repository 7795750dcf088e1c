//! Snippet variable values taken from a live document.

use crate::lsp_snippet::{SnippetVariable, VariableResolver};
use crate::lsp_uri::file_uri_to_path;
use editsync_core::TextSource;
use std::ops::Range;
use std::path::PathBuf;
use unicode_segmentation::UnicodeSegmentation;

/// [`VariableResolver`] backed by a document.
///
/// `line` is the line the snippet is inserted on (the start line of the completion edit).
/// Path variables resolve only when a path or `file://` URI was supplied.
#[derive(Debug)]
pub struct DocumentVariables<'a, S: TextSource + ?Sized> {
    source: &'a S,
    line: usize,
    selection: Range<usize>,
    path: Option<PathBuf>,
}

impl<'a, S: TextSource + ?Sized> DocumentVariables<'a, S> {
    /// Variables for an insertion on `line` with an empty selection at the line start.
    pub fn new(source: &'a S, line: usize) -> Self {
        let caret = source.line_to_offset(line).unwrap_or(0);
        Self {
            source,
            line,
            selection: caret..caret,
            path: None,
        }
    }

    /// Use `selection` (character offsets) for `TM_SELECTED_TEXT` and `TM_CURRENT_WORD`.
    pub fn with_selection(mut self, selection: Range<usize>) -> Self {
        self.selection = selection;
        self
    }

    /// Use `path` for the file variables.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Use the path of a `file://` URI for the file variables.
    pub fn with_uri(mut self, uri: &str) -> Self {
        self.path = file_uri_to_path(uri);
        self
    }

    fn current_word(&self) -> Option<String> {
        let Range { start, end } = self.selection.clone();
        let line = self.source.offset_to_line(start).ok()?;
        if self.source.offset_to_line(end).ok()? != line {
            return self.source.slice(start..end).ok();
        }

        let line_start = self.source.line_to_offset(line).ok()?;
        let text = self.source.line_text(line).ok()?;
        let (sel_start, sel_end) = (start - line_start, end - line_start);

        let mut word = sel_start..sel_end;
        let mut char_pos = 0;
        for segment in text.split_word_bounds() {
            let len = segment.chars().count();
            let range = char_pos..char_pos + len;
            char_pos += len;

            let is_word = segment.chars().any(|c| c.is_alphanumeric() || c == '_');
            if is_word && range.start <= sel_end && range.end >= sel_start {
                word.start = word.start.min(range.start);
                word.end = word.end.max(range.end);
            }
        }

        self.source
            .slice(line_start + word.start..line_start + word.end)
            .ok()
    }
}

impl<S: TextSource + ?Sized> VariableResolver for DocumentVariables<'_, S> {
    fn resolve(&self, variable: SnippetVariable) -> Option<String> {
        match variable {
            SnippetVariable::SelectedText => self.source.slice(self.selection.clone()).ok(),
            SnippetVariable::CurrentLine => self.source.line_text(self.line).ok(),
            SnippetVariable::CurrentWord => self.current_word(),
            SnippetVariable::LineIndex => Some(self.line.to_string()),
            SnippetVariable::LineNumber => Some((self.line + 1).to_string()),
            SnippetVariable::Filename => self
                .path
                .as_ref()?
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            SnippetVariable::FilenameBase => self
                .path
                .as_ref()?
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned()),
            SnippetVariable::Directory => {
                let path = std::path::absolute(self.path.as_ref()?).ok()?;
                path.parent()
                    .map(|parent| parent.to_string_lossy().into_owned())
            }
            SnippetVariable::Filepath => std::path::absolute(self.path.as_ref()?)
                .ok()
                .map(|path| path.to_string_lossy().into_owned()),
        }
    }
}

//! Snippet expansion (`insertTextFormat == 2`).
//!
//! A snippet is literal text with tabstops and placeholders:
//!
//! - `$1`, `${1}` - empty tabstop
//! - `${1:default}` - placeholder with default text (may contain nested placeholders)
//! - `${1|one,two,three|}` - choice; the first element is inserted
//! - `$TM_FILENAME`, `${TM_FILENAME}` - variables, resolved before tabstops are scanned
//!
//! Expansion produces the literal text to insert plus one [`SnippetGroup`] per tabstop key, in
//! first-seen order. Offsets in the groups are character offsets into the expanded text.
//! Anything that fails to parse is inserted literally; expansion itself never fails.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::debug;

/// Variables recognised in snippet text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SnippetVariable {
    /// `TM_SELECTED_TEXT` - the current selection or the empty string.
    SelectedText,
    /// `TM_CURRENT_LINE` - the contents of the current line.
    CurrentLine,
    /// `TM_CURRENT_WORD` - the word under the cursor or the empty string.
    CurrentWord,
    /// `TM_LINE_INDEX` - the zero-based line number.
    LineIndex,
    /// `TM_LINE_NUMBER` - the one-based line number.
    LineNumber,
    /// `TM_FILENAME` - the file name of the document.
    Filename,
    /// `TM_FILENAME_BASE` - the file name without its extension.
    FilenameBase,
    /// `TM_DIRECTORY` - the directory containing the document.
    Directory,
    /// `TM_FILEPATH` - the full path of the document.
    Filepath,
}

impl SnippetVariable {
    /// All variables, longest name first. Some names are prefixes of others
    /// (`TM_FILENAME` / `TM_FILENAME_BASE`), so matching must follow this order.
    pub const BY_NAME_LENGTH: [SnippetVariable; 9] = [
        SnippetVariable::FilenameBase,
        SnippetVariable::SelectedText,
        SnippetVariable::CurrentLine,
        SnippetVariable::CurrentWord,
        SnippetVariable::LineNumber,
        SnippetVariable::LineIndex,
        SnippetVariable::Directory,
        SnippetVariable::Filename,
        SnippetVariable::Filepath,
    ];

    /// The name as written in snippets.
    pub fn name(self) -> &'static str {
        match self {
            SnippetVariable::SelectedText => "TM_SELECTED_TEXT",
            SnippetVariable::CurrentLine => "TM_CURRENT_LINE",
            SnippetVariable::CurrentWord => "TM_CURRENT_WORD",
            SnippetVariable::LineIndex => "TM_LINE_INDEX",
            SnippetVariable::LineNumber => "TM_LINE_NUMBER",
            SnippetVariable::Filename => "TM_FILENAME",
            SnippetVariable::FilenameBase => "TM_FILENAME_BASE",
            SnippetVariable::Directory => "TM_DIRECTORY",
            SnippetVariable::Filepath => "TM_FILEPATH",
        }
    }

    /// Look a variable up by its exact name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::BY_NAME_LENGTH
            .into_iter()
            .find(|variable| variable.name() == name)
    }
}

/// Supplies values for snippet variables.
pub trait VariableResolver {
    /// Value of `variable`, or `None` to leave the reference in the text untouched.
    fn resolve(&self, variable: SnippetVariable) -> Option<String>;
}

impl<F> VariableResolver for F
where
    F: Fn(SnippetVariable) -> Option<String>,
{
    fn resolve(&self, variable: SnippetVariable) -> Option<String> {
        self(variable)
    }
}

impl VariableResolver for HashMap<SnippetVariable, String> {
    fn resolve(&self, variable: SnippetVariable) -> Option<String> {
        self.get(&variable).cloned()
    }
}

/// Resolver that knows no variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVariables;

impl VariableResolver for NoVariables {
    fn resolve(&self, _variable: SnippetVariable) -> Option<String> {
        None
    }
}

/// What a repeated bare `$N` reference does once key `N` has already been seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RepeatedTabstops {
    /// Insert a copy of the key's default text; the copy is not part of the group.
    #[default]
    Inert,
    /// Insert the key's default text and add it to the group as another linked position.
    Linked,
}

/// Snippet expansion settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SnippetOptions {
    /// Handling of repeated bare tabstop references.
    pub repeated_tabstops: RepeatedTabstops,
}

/// One editable region in expanded text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabstopPosition {
    /// Character offset.
    pub offset: usize,
    /// Length in characters.
    pub length: usize,
}

impl TabstopPosition {
    /// Create a position.
    pub fn new(offset: usize, length: usize) -> Self {
        Self { offset, length }
    }

    /// The same region moved by `delta` characters.
    pub fn shifted(self, delta: usize) -> Self {
        Self::new(self.offset + delta, self.length)
    }
}

/// All occurrences of one tabstop key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetGroup {
    /// Tabstop key (the digits after `$`).
    pub key: String,
    /// Occurrences, in text order.
    pub positions: Vec<TabstopPosition>,
    /// Alternatives offered for this tabstop (empty unless it is a choice).
    pub choices: Vec<String>,
}

impl SnippetGroup {
    /// Returns `true` if the group offers alternative values.
    pub fn has_choices(&self) -> bool {
        !self.choices.is_empty()
    }
}

/// Result of expanding a snippet.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SnippetExpansion {
    /// Literal text to insert.
    pub text: String,
    /// Tabstop groups in first-seen key order.
    pub groups: Vec<SnippetGroup>,
    /// Offsets in `text` where a malformed placeholder was kept as literal text.
    pub malformed: Vec<usize>,
}

impl SnippetExpansion {
    /// Expansion of text without any markup.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Group for `key`, if the snippet used it.
    pub fn group(&self, key: &str) -> Option<&SnippetGroup> {
        self.groups.iter().find(|group| group.key == key)
    }

    /// Length of the expanded text in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Insert `indent` after every `\n`, moving tabstops along with the text they belong to.
    pub fn indented(self, indent: &str) -> Self {
        if indent.is_empty() || !self.text.contains('\n') {
            return self;
        }

        let newlines: Vec<usize> = self
            .text
            .chars()
            .enumerate()
            .filter(|&(_, c)| c == '\n')
            .map(|(i, _)| i)
            .collect();
        let indent_len = indent.chars().count();
        let map = |offset: usize| offset + indent_len * newlines.partition_point(|&n| n < offset);

        let groups = self
            .groups
            .into_iter()
            .map(|group| SnippetGroup {
                positions: group
                    .positions
                    .into_iter()
                    .map(|position| {
                        let start = map(position.offset);
                        let end = map(position.offset + position.length);
                        TabstopPosition::new(start, end - start)
                    })
                    .collect(),
                ..group
            })
            .collect();

        Self {
            text: self.text.replace('\n', &format!("\n{indent}")),
            groups,
            malformed: self.malformed.into_iter().map(map).collect(),
        }
    }
}

static VARIABLE_REF: LazyLock<Regex> = LazyLock::new(|| {
    let names = SnippetVariable::BY_NAME_LENGTH
        .iter()
        .map(|variable| variable.name())
        .collect::<Vec<_>>()
        .join("|");
    // Escapes come first so `\$TM_FILENAME` stays literal.
    Regex::new(&format!(r"\\[\s\S]|\$\{{({names})\}}|\$({names})"))
        .expect("valid snippet variable regex")
});

/// Replace `$NAME` / `${NAME}` references to known variables.
///
/// Unresolved references are left as they are. Substituted values are escaped so the tabstop
/// scan treats them as literal text.
pub fn substitute_variables<R: VariableResolver + ?Sized>(raw: &str, resolver: &R) -> String {
    VARIABLE_REF
        .replace_all(raw, |caps: &Captures<'_>| {
            let whole = caps.get(0).map_or("", |m| m.as_str());
            caps.get(1)
                .or_else(|| caps.get(2))
                .and_then(|name| SnippetVariable::from_name(name.as_str()))
                .and_then(|variable| resolver.resolve(variable))
                .map(|value| escape_literal(&value))
                .unwrap_or_else(|| whole.to_string())
        })
        .into_owned()
}

fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if is_escapable(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Expand `raw` with default [`SnippetOptions`].
pub fn expand<R: VariableResolver + ?Sized>(raw: &str, resolver: &R) -> SnippetExpansion {
    expand_with(raw, resolver, SnippetOptions::default())
}

/// Expand `raw`: substitute variables, then scan tabstops left to right.
pub fn expand_with<R: VariableResolver + ?Sized>(
    raw: &str,
    resolver: &R,
    options: SnippetOptions,
) -> SnippetExpansion {
    let substituted = substitute_variables(raw, resolver);
    let chars: Vec<char> = substituted.chars().collect();

    // A bare `$N` may come before the placeholder that gives `N` its default.
    let mut prescan = Expander::new(resolver, options, HashMap::new(), true);
    prescan.expand_chars(&chars);

    let mut expander = Expander::new(resolver, options, prescan.defaults, false);
    expander.expand_chars(&chars);

    SnippetExpansion {
        text: expander.text,
        groups: expander.groups,
        malformed: expander.malformed,
    }
}

enum Body {
    Empty,
    Default,
    Choice,
}

struct Expander<'a, R: ?Sized> {
    resolver: &'a R,
    options: SnippetOptions,
    text: String,
    // Length of `text` in chars.
    len: usize,
    groups: Vec<SnippetGroup>,
    // First placeholder default seen per key.
    defaults: HashMap<String, String>,
    // Defaults from an earlier scan of the same text.
    known_defaults: HashMap<String, String>,
    malformed: Vec<usize>,
    quiet: bool,
}

impl<'a, R: VariableResolver + ?Sized> Expander<'a, R> {
    fn new(
        resolver: &'a R,
        options: SnippetOptions,
        known_defaults: HashMap<String, String>,
        quiet: bool,
    ) -> Self {
        Self {
            resolver,
            options,
            text: String::new(),
            len: 0,
            groups: Vec::new(),
            defaults: HashMap::new(),
            known_defaults,
            malformed: Vec::new(),
            quiet,
        }
    }

    fn push(&mut self, c: char) {
        self.text.push(c);
        self.len += 1;
    }

    fn push_str(&mut self, s: &str) {
        self.text.push_str(s);
        self.len += s.chars().count();
    }

    fn expand_chars(&mut self, chars: &[char]) {
        let mut i = 0;
        while i < chars.len() {
            match chars[i] {
                '\\' if chars.get(i + 1).is_some_and(|&c| is_escapable(c)) => {
                    self.push(chars[i + 1]);
                    i += 2;
                }
                '$' => match self.placeholder(chars, i) {
                    Some(consumed) => i += consumed,
                    None => {
                        self.push('$');
                        i += 1;
                    }
                },
                c => {
                    self.push(c);
                    i += 1;
                }
            }
        }
    }

    fn group_index(&mut self, key: &str) -> usize {
        match self.groups.iter().position(|group| group.key == key) {
            Some(index) => index,
            None => {
                self.groups.push(SnippetGroup {
                    key: key.to_string(),
                    positions: Vec::new(),
                    choices: Vec::new(),
                });
                self.groups.len() - 1
            }
        }
    }

    fn malformed_at(&mut self, reason: &'static str) {
        if !self.quiet {
            debug!(offset = self.len, reason, "malformed snippet placeholder kept as text");
        }
        self.malformed.push(self.len);
    }

    // Handles the placeholder starting at `chars[at] == '$'`. Returns the number of chars
    // consumed, or `None` if the `$` is literal.
    fn placeholder(&mut self, chars: &[char], at: usize) -> Option<usize> {
        let bare_digits = count_digits(chars, at + 1);
        if bare_digits > 0 {
            let key: String = chars[at + 1..at + 1 + bare_digits].iter().collect();
            self.bare_tabstop(&key);
            return Some(1 + bare_digits);
        }

        if chars.get(at + 1) != Some(&'{') {
            return None;
        }
        let key_start = at + 2;
        let digits = count_digits(chars, key_start);
        if digits == 0 {
            return None;
        }
        let key: String = chars[key_start..key_start + digits].iter().collect();

        let i = key_start + digits;
        let body = match chars.get(i) {
            Some('}') => Body::Empty,
            Some(':') => Body::Default,
            Some('|') => Body::Choice,
            _ => {
                self.malformed_at("unexpected character after tabstop key");
                return None;
            }
        };

        let end = match body {
            Body::Empty => {
                let start = self.len;
                self.record(&key, start, String::new(), Vec::new());
                i
            }
            Body::Default => {
                let Some(close) = find_closing_brace(chars, i + 1) else {
                    self.malformed_at("unterminated placeholder");
                    return None;
                };
                let start = self.len;
                let start_byte = self.text.len();
                let index = self.group_index(&key);
                self.expand_chars(&chars[i + 1..close]);
                let default = self.text[start_byte..].to_string();
                let length = self.len - start;
                self.groups[index]
                    .positions
                    .push(TabstopPosition::new(start, length));
                self.defaults.entry(key).or_insert(default);
                close
            }
            Body::Choice => {
                let Some((choices, close)) = self.scan_choices(chars, i + 1) else {
                    self.malformed_at("unterminated choice");
                    return None;
                };
                let default = choices.first().cloned().unwrap_or_default();
                let start = self.len;
                self.push_str(&default);
                self.record(&key, start, default, choices);
                close
            }
        };

        Some(end + 1 - at)
    }

    fn record(&mut self, key: &str, start: usize, default: String, choices: Vec<String>) {
        let length = default.chars().count();
        let index = self.group_index(key);
        let group = &mut self.groups[index];
        group.positions.push(TabstopPosition::new(start, length));
        if group.choices.is_empty() {
            group.choices = choices;
        }
        self.defaults.entry(key.to_string()).or_insert(default);
    }

    // The first occurrence of a key is always a position; later bare ones only when linked.
    fn bare_tabstop(&mut self, key: &str) {
        let default = self
            .defaults
            .get(key)
            .or_else(|| self.known_defaults.get(key))
            .cloned()
            .unwrap_or_default();
        let first = !self.groups.iter().any(|group| group.key == key);

        let start = self.len;
        self.push_str(&default);
        if first || self.options.repeated_tabstops == RepeatedTabstops::Linked {
            let index = self.group_index(key);
            self.groups[index]
                .positions
                .push(TabstopPosition::new(start, default.chars().count()));
        }
    }

    // Scans `a,b,c|}` starting right after the opening `|`. Returns the elements and the index
    // of the closing `}`.
    fn scan_choices(&self, chars: &[char], from: usize) -> Option<(Vec<String>, usize)> {
        let mut choices = Vec::new();
        let mut current = String::new();
        let mut i = from;

        while i < chars.len() {
            match chars[i] {
                '\\' if chars.get(i + 1).is_some_and(|&c| is_escapable(c)) => {
                    current.push(chars[i + 1]);
                    i += 2;
                    continue;
                }
                ',' | '|' | '}' => {
                    if !current.is_empty() {
                        choices.push(self.resolve_choice(std::mem::take(&mut current)));
                    }
                    if chars[i] == '}' {
                        return Some((choices, i));
                    }
                }
                c => current.push(c),
            }
            i += 1;
        }

        None
    }

    fn resolve_choice(&self, value: String) -> String {
        let Some(reference) = value.strip_prefix('$') else {
            return value;
        };
        let name = reference
            .strip_prefix('{')
            .and_then(|name| name.strip_suffix('}'))
            .unwrap_or(reference);

        SnippetVariable::from_name(name)
            .and_then(|variable| self.resolver.resolve(variable))
            .unwrap_or(value)
    }
}

fn is_escapable(c: char) -> bool {
    matches!(c, '$' | '}' | '\\' | ',' | '|')
}

fn count_digits(chars: &[char], from: usize) -> usize {
    chars
        .get(from..)
        .map_or(0, |rest| rest.iter().take_while(|c| c.is_ascii_digit()).count())
}

// Index of the `}` closing a placeholder body that starts at `from`, skipping escapes and
// nested `${...}`.
fn find_closing_brace(chars: &[char], from: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = from;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            '$' if chars.get(i + 1) == Some(&'{') => {
                depth += 1;
                i += 1;
            }
            '}' if depth == 0 => return Some(i),
            '}' => depth -= 1,
            _ => {}
        }
        i += 1;
    }
    None
}

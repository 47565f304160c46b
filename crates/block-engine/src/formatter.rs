//! Deterministic style normalization.
//!
//! Two passes over a clean syntax tree:
//!
//! ```text
//! source ──> token spacing (same physical line only, never inside strings)
//!        ──> reparse
//!        ──> line layout (indentation, trailing whitespace, blank lines)
//!        ──> reparse (guard)
//! ```
//!
//! Every rule produces a state the rule itself leaves alone, so formatting a
//! formatted text returns it unchanged.

use crate::config::FormatterConfig;
use crate::error::{EngineError, Result};
use crate::grammar::{self, kind, SyntaxTree};
use crate::types::{Diagnostic, DiagnosticKind, Outcome};
use tree_sitter::Node;
use unicode_segmentation::UnicodeSegmentation;

const OPENERS: [&str; 3] = ["(", "[", "{"];
const CLOSERS: [&str; 3] = [")", "]", "}"];
const COMPARISONS: [&str; 7] = ["==", "!=", "<", ">", "<=", ">=", "<>"];
const TAB_WIDTH: usize = 8;

/// Normalizes source text into the canonical style
#[derive(Debug, Clone, Default)]
pub struct Formatter {
    config: FormatterConfig,
}

impl Formatter {
    #[must_use]
    pub const fn new(config: FormatterConfig) -> Self {
        Self { config }
    }

    /// Best-effort formatting.
    ///
    /// Never fails: if normalization is impossible the input comes back
    /// unchanged with a `formatting` diagnostic.
    pub fn format(&self, text: &str) -> Outcome<String> {
        match self.try_format(text) {
            Ok(formatted) => {
                let mut outcome = Outcome::clean(formatted);
                for diagnostic in self.long_lines(&outcome.value) {
                    outcome.push(diagnostic);
                }
                outcome
            }
            Err(err) => Outcome::degraded(
                text.to_string(),
                Diagnostic::new(DiagnosticKind::Formatting, err.to_string()),
            ),
        }
    }

    /// Strict formatting; fails when the text cannot be normalized
    pub fn try_format(&self, text: &str) -> Result<String> {
        let source = normalize_newlines(text);
        if source.trim().is_empty() {
            return Ok(String::new());
        }

        let mut tree = SyntaxTree::parse(&source)
            .map_err(|e| EngineError::formatting(format!("input is not valid source: {e}")))?;

        if self.config.normalize_spacing {
            let spaced = respace(&tree);
            tree = SyntaxTree::parse(&spaced).map_err(|e| {
                EngineError::formatting(format!("spacing pass broke the source: {e}"))
            })?;
        }

        let formatted = self.layout(&tree);
        SyntaxTree::parse(&formatted)
            .map_err(|e| EngineError::formatting(format!("layout pass broke the source: {e}")))?;

        Ok(formatted)
    }

    /// Check whether `text` is already in canonical form
    pub fn is_formatted(&self, text: &str) -> bool {
        self.try_format(text).is_ok_and(|formatted| formatted == text)
    }

    fn long_lines(&self, text: &str) -> Vec<Diagnostic> {
        let Some(limit) = self.config.max_line_length else {
            return Vec::new();
        };

        text.lines()
            .enumerate()
            .filter_map(|(idx, line)| {
                let width = line.graphemes(true).count();
                (width > limit).then(|| {
                    Diagnostic::new(
                        DiagnosticKind::Style,
                        format!("line {} is {width} characters long (limit {limit})", idx + 1),
                    )
                })
            })
            .collect()
    }

    /// Line pass: indentation, trailing whitespace and blank lines
    fn layout(&self, tree: &SyntaxTree) -> String {
        let lines: Vec<&str> = tree.source().split('\n').collect();
        let rows = lines.len();
        let tokens = grammar::leaf_tokens(tree.root());

        // Rows whose start lies inside a multi-line string are copied as-is;
        // rows whose end lies inside one keep their trailing whitespace.
        let mut verbatim = vec![false; rows];
        let mut keep_trailing = vec![false; rows];
        let mut first_token: Vec<Option<Node<'_>>> = vec![None; rows];
        for token in &tokens {
            let start = token.start_position().row;
            let end = token.end_position().row.min(rows - 1);
            if first_token[start].is_none() {
                first_token[start] = Some(*token);
            }
            keep_trailing[start..end].iter_mut().for_each(|flag| *flag = true);
            for flag in verbatim.iter_mut().take(end + 1).skip(start + 1) {
                *flag = true;
            }
        }

        let width = self.config.indent_width;
        let mut kinds = vec![RowKind::Blank; rows];
        let mut deltas: Vec<isize> = vec![0; rows];
        let mut last_delta = 0;
        for row in 0..rows {
            if verbatim[row] {
                kinds[row] = RowKind::Verbatim;
                continue;
            }
            match first_token[row] {
                Some(token) if token.kind() == kind::COMMENT => kinds[row] = RowKind::Comment,
                Some(token) => {
                    kinds[row] = RowKind::Code;
                    let current = indent_columns(lines[row]) as isize;
                    deltas[row] = match grammar::enclosing_statement(token) {
                        Some(stmt) if stmt.start_position().row == row => {
                            (grammar::block_depth(stmt) * width) as isize - current
                        }
                        Some(stmt) => deltas[stmt.start_position().row],
                        None => 0,
                    };
                    last_delta = deltas[row];
                }
                None if lines[row].trim().is_empty() => {}
                None => {
                    kinds[row] = RowKind::Code;
                    deltas[row] = last_delta;
                }
            }
        }

        // Comment lines follow the code line they are aligned with.
        for row in 0..rows {
            if kinds[row] != RowKind::Comment {
                continue;
            }
            let current = indent_columns(lines[row]);
            let next = (row + 1..rows).find(|r| kinds[*r] == RowKind::Code);
            let prev = (0..row).rev().find(|r| kinds[*r] == RowKind::Code);
            let anchor = [next, prev]
                .into_iter()
                .flatten()
                .find(|r| indent_columns(lines[*r]) == current)
                .or(next)
                .or(prev);
            deltas[row] = anchor.map_or(0, |r| deltas[r]);
        }

        let texts: Vec<String> = (0..rows)
            .map(|row| {
                let line = lines[row];
                match kinds[row] {
                    RowKind::Blank => String::new(),
                    RowKind::Verbatim if keep_trailing[row] => line.to_string(),
                    RowKind::Verbatim => strip_trailing(line).to_string(),
                    RowKind::Code | RowKind::Comment => {
                        let body = line.trim_start();
                        let body = if keep_trailing[row] {
                            body
                        } else {
                            strip_trailing(body)
                        };
                        let indent = (indent_columns(line) as isize + deltas[row]).max(0) as usize;
                        format!("{}{body}", " ".repeat(indent))
                    }
                }
            })
            .collect();

        // Top-level definitions (with their attached comments) and the first
        // statement after one get an exact number of blank lines.
        let mut header = vec![false; rows];
        let mut prev_is_definition = false;
        let root = tree.root();
        let mut cursor = root.walk();
        for stmt in root.named_children(&mut cursor) {
            if stmt.kind() == kind::COMMENT {
                continue;
            }
            let is_definition = matches!(stmt.kind(), kind::FUNCTION | kind::CLASS | kind::DECORATED);
            if is_definition || prev_is_definition {
                let mut start = stmt.start_position().row;
                while start > 0
                    && kinds[start - 1] == RowKind::Comment
                    && !texts[start - 1].starts_with(' ')
                {
                    start -= 1;
                }
                header[start] = true;
            }
            prev_is_definition = is_definition;
        }

        let mut out: Vec<&str> = Vec::with_capacity(rows);
        let mut pending = 0usize;
        for row in 0..rows {
            if kinds[row] == RowKind::Blank {
                pending += 1;
                continue;
            }
            if !out.is_empty() {
                let blanks = if header[row] {
                    self.config.blank_lines_around_definitions
                } else if texts[row].starts_with(' ') {
                    pending.min(self.config.max_blank_lines_nested)
                } else {
                    pending.min(self.config.max_blank_lines_top_level)
                };
                out.extend(std::iter::repeat("").take(blanks));
            }
            out.push(&texts[row]);
            pending = 0;
        }

        let mut formatted = out.join("\n");
        if !formatted.is_empty() {
            formatted.push('\n');
        }
        formatted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowKind {
    Blank,
    Verbatim,
    Comment,
    Code,
}

fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

fn strip_trailing(line: &str) -> &str {
    line.trim_end_matches([' ', '\t', '\x0c'])
}

/// Indentation width in columns, tabs advancing to the next multiple of 8
fn indent_columns(line: &str) -> usize {
    let mut columns = 0;
    for ch in line.chars() {
        match ch {
            ' ' => columns += 1,
            '\t' => columns = (columns / TAB_WIDTH + 1) * TAB_WIDTH,
            '\x0c' => columns = 0,
            _ => break,
        }
    }
    columns
}

/// Token pass: rewrite the whitespace between adjacent tokens on one line
fn respace(tree: &SyntaxTree) -> String {
    let source = tree.source();
    let tokens = grammar::leaf_tokens(tree.root());
    let mut edits: Vec<(usize, usize, &'static str)> = Vec::new();

    for pair in tokens.windows(2) {
        let (left, right) = (pair[0], pair[1]);
        let gap = &source[left.end_byte()..right.start_byte()];
        if !gap.chars().all(|c| c == ' ' || c == '\t') {
            continue;
        }
        if let Some(wanted) = desired_gap(left, right, gap) {
            if gap != wanted {
                edits.push((left.end_byte(), right.start_byte(), wanted));
            }
        }
    }

    for token in tokens.iter().filter(|t| t.kind() == kind::COMMENT) {
        if comment_needs_space(tree.text(*token)) {
            let at = token.start_byte() + 1;
            edits.push((at, at, " "));
        }
    }

    if edits.is_empty() {
        return source.to_string();
    }

    edits.sort_by_key(|edit| edit.0);
    let mut out = String::with_capacity(source.len() + edits.len());
    let mut pos = 0;
    for (start, end, replacement) in edits {
        out.push_str(&source[pos..start]);
        out.push_str(replacement);
        pos = end;
    }
    out.push_str(&source[pos..]);
    out
}

fn desired_gap(left: Node<'_>, right: Node<'_>, gap: &str) -> Option<&'static str> {
    if right.kind() == kind::COMMENT {
        return (gap.len() < 2).then_some("  ");
    }
    if left.kind() == kind::COMMENT
        || left.kind() == kind::LINE_CONTINUATION
        || right.kind() == kind::LINE_CONTINUATION
    {
        return None;
    }
    if OPENERS.contains(&left.kind()) || CLOSERS.contains(&right.kind()) || right.kind() == "," {
        return Some("");
    }
    if left.kind() == "," {
        return Some(" ");
    }
    if is_call_bracket(right) {
        return Some("");
    }
    if let Some(gap) = colon_gap(left, right) {
        return Some(gap);
    }
    operator_gap(left).or_else(|| operator_gap(right))
}

/// Annotation, dict, lambda and clause colons hug the left side.
/// Slice colons are left as written.
fn colon_gap(left: Node<'_>, right: Node<'_>) -> Option<&'static str> {
    let outside_slice = |node: Node<'_>| node.parent().is_some_and(|p| p.kind() != "slice");
    if right.kind() == ":" && outside_slice(right) {
        return Some("");
    }
    if left.kind() == ":" && outside_slice(left) {
        return Some(" ");
    }
    None
}

/// `(` of a call, parameter list or class bases, `[` of a subscript
fn is_call_bracket(node: Node<'_>) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };
    match node.kind() {
        "(" => {
            matches!(parent.kind(), "argument_list" | "parameters")
                && parent.start_byte() == node.start_byte()
        }
        "[" => parent.kind() == "subscript",
        _ => false,
    }
}

fn operator_gap(op: Node<'_>) -> Option<&'static str> {
    let parent = op.parent()?.kind();
    match (op.kind(), parent) {
        ("=", "keyword_argument" | "default_parameter") => Some(""),
        ("=", "assignment" | "typed_default_parameter" | "type_alias_statement") => Some(" "),
        ("->" | ":=" | "as", _) => Some(" "),
        (op, "augmented_assignment") if op.ends_with('=') => Some(" "),
        (op, "comparison_operator") if COMPARISONS.contains(&op) => Some(" "),
        _ => None,
    }
}

fn comment_needs_space(text: &str) -> bool {
    match text.strip_prefix('#').and_then(|rest| rest.chars().next()) {
        Some(ch) => !(ch.is_whitespace() || matches!(ch, '#' | '!' | ':')),
        None => false,
    }
}

use crate::grammar::{kind, SyntaxTree};
use crate::types::{Block, Docstring, DocumentationEntry, TopLevelKind};
use tree_sitter::Node;

/// Documentation entry for every block, in collection order
pub fn extract_docstrings<'a, I>(blocks: I) -> Vec<DocumentationEntry>
where
    I: IntoIterator<Item = &'a Block>,
{
    blocks
        .into_iter()
        .map(|block| DocumentationEntry {
            block_name: block.name.clone(),
            docstring: extract_docstring(&block.source),
        })
        .collect()
}

/// Docstring of the first function defined in `source`
pub fn extract_docstring(source: &str) -> Docstring {
    let tree = match SyntaxTree::parse(source) {
        Ok(tree) => tree,
        Err(err) => {
            log::debug!("Docstring unavailable: {err}");
            return Docstring::Unavailable;
        }
    };

    let literal = tree
        .top_level()
        .into_iter()
        .find(|node| node.kind() == TopLevelKind::Function)
        .and_then(|node| node.function_node())
        .and_then(leading_literal);

    match literal.map(|node| literal_value(tree.text(node))) {
        Some(Some(text)) => {
            let text = clean_indentation(&text);
            if text.is_empty() {
                Docstring::Absent
            } else {
                Docstring::Present(text)
            }
        }
        _ => Docstring::Absent,
    }
}

/// String literal forming the first statement of a function body
fn leading_literal(function: Node<'_>) -> Option<Node<'_>> {
    let body = function.child_by_field_name("body")?;
    let mut cursor = body.walk();
    let first = body
        .named_children(&mut cursor)
        .find(|node| node.kind() != kind::COMMENT)?;
    if first.kind() != kind::EXPRESSION_STATEMENT || first.named_child_count() != 1 {
        return None;
    }
    first
        .named_child(0)
        .filter(|expr| matches!(expr.kind(), kind::STRING | kind::CONCATENATED_STRING))
}

/// Value of a (possibly implicitly concatenated) string literal.
///
/// `None` for bytes and f-strings, which are never docstrings.
fn literal_value(text: &str) -> Option<String> {
    let mut value = String::new();
    let mut rest = text.trim_start();
    while !rest.is_empty() {
        let (piece, remaining) = split_literal(rest)?;
        value.push_str(&piece);
        rest = remaining.trim_start_matches(|c: char| c.is_whitespace() || c == '\\');
    }
    Some(value)
}

/// Decode the first literal of `text`, returning it and the unread remainder
fn split_literal(text: &str) -> Option<(String, &str)> {
    let prefix_len = text.find(['\'', '"'])?;
    let prefix = text[..prefix_len].to_ascii_lowercase();
    if !prefix.chars().all(|c| matches!(c, 'r' | 'u' | 'b' | 'f')) || prefix.len() > 2 {
        return None;
    }
    if prefix.contains(['b', 'f']) {
        return None;
    }

    let body = &text[prefix_len..];
    let quote = ["\"\"\"", "'''", "\"", "'"]
        .into_iter()
        .find(|q| body.starts_with(q))?;
    let inner = &body[quote.len()..];
    let end = closing_quote(inner, quote)?;
    let raw = &inner[..end];
    let remaining = &inner[end + quote.len()..];

    let decoded = if prefix.contains('r') {
        raw.to_string()
    } else {
        unescape(raw)
    };
    Some((decoded, remaining))
}

fn closing_quote(inner: &str, quote: &str) -> Option<usize> {
    let mut idx = 0;
    while idx < inner.len() {
        let rest = &inner[idx..];
        if rest.starts_with('\\') {
            idx += 1 + rest[1..].chars().next().map_or(0, char::len_utf8);
        } else if rest.starts_with(quote) {
            return Some(idx);
        } else {
            idx += rest.chars().next().map_or(1, char::len_utf8);
        }
    }
    None
}

/// Decode backslash escapes of a non-raw literal
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(next) = chars.next() else {
            out.push('\\');
            break;
        };
        match next {
            '\n' => {}
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\x0b'),
            '0'..='7' => {
                let mut code = next.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|d| d.to_digit(8)) {
                        Some(digit) => {
                            code = code * 8 + digit;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.extend(char::from_u32(code));
            }
            'x' | 'u' | 'U' => {
                let width = match next {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let digits: String = chars.clone().take(width).collect();
                match u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32) {
                    Some(decoded) if digits.len() == width => {
                        out.push(decoded);
                        for _ in 0..width {
                            chars.next();
                        }
                    }
                    _ => {
                        out.push('\\');
                        out.push(next);
                    }
                }
            }
            // Unknown escapes and named `\N{...}` characters stay as written
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    out
}

/// Strip the first line, remove the common margin of the others and drop
/// blank edge lines. Tabs expand to 8-column stops first.
fn clean_indentation(text: &str) -> String {
    let lines: Vec<String> = text.lines().map(expand_tabs).collect();

    let margin = lines
        .iter()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut cleaned: Vec<&str> = Vec::with_capacity(lines.len());
    for (idx, line) in lines.iter().enumerate() {
        if idx == 0 {
            cleaned.push(line.trim_start());
        } else {
            let cut = margin.min(line.len() - line.trim_start().len());
            cleaned.push(line.get(cut..).unwrap_or_else(|| line.trim_start()));
        }
    }

    while cleaned.last().is_some_and(|line| line.trim().is_empty()) {
        cleaned.pop();
    }
    let first = cleaned
        .iter()
        .position(|line| !line.trim().is_empty())
        .unwrap_or(cleaned.len());

    cleaned[first..].join("\n")
}

fn expand_tabs(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    for c in line.chars() {
        if c == '\t' {
            let pad = 8 - out.chars().count() % 8;
            out.extend(std::iter::repeat(' ').take(pad));
        } else {
            out.push(c);
        }
    }
    out
}

//! Print stream — the finished tree flattened into text and layout
//! directives, then assembled into logical lines ready for wrapping.

use crate::markdown::{Layout, NodeId, NodeKind, Tree};
use regex::Regex;
use std::sync::LazyLock;

static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

static RE_ENTITY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^&#?[A-Za-z0-9]+;").unwrap());

/// A bracket that would open a link or link reference.
static RE_LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\[[^\]]*\][(\[:]").unwrap());

/// Columns reserved for a list item's marker, and the indent of code.
pub const GUTTER: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Print {
    /// Text subject to wrapping.
    Text(String),
    /// Change of the indent applied to following lines.
    Indent(isize),
    Newlines(usize),
    /// Code block contents, never wrapped.
    Verbatim(String),
    /// Extra hanging indent for the current line's continuations.
    Hang(usize),
}

/// Flatten `tree` into prints.
pub fn prints(tree: &Tree) -> Vec<Print> {
    let mut out = Vec::new();
    emit_children(tree, tree.root(), &mut out);
    out
}

fn emit(tree: &Tree, id: NodeId, out: &mut Vec<Print>) {
    let node = tree.node(id);
    match &node.kind {
        NodeKind::Document | NodeKind::List { .. } | NodeKind::ListItem | NodeKind::Reference(_) => {
            emit_children(tree, id, out)
        }
        NodeKind::Paragraph => {
            if node.hanging > 0 {
                out.push(Print::Hang(node.hanging));
            }
            emit_children(tree, id, out);
        }
        NodeKind::Header { level } => {
            out.push(Print::Text(format!("{} ", "#".repeat(*level))));
            emit_children(tree, id, out);
        }
        NodeKind::CodeBlock { code } => out.push(Print::Verbatim(code.clone())),
        NodeKind::Text(text) => out.push(Print::Text(escape(&RE_WHITESPACE.replace_all(text, " ")))),
        NodeKind::Emphasis => wrapped(tree, id, "*", out),
        NodeKind::Strong => wrapped(tree, id, "**", out),
        NodeKind::CodeSpan(code) => out.push(Print::Text(format!("`{}`", code))),
        NodeKind::Autolink(url) => out.push(Print::Text(format!("<{}>", url))),
        NodeKind::InlineHtml(text) | NodeKind::Marker(text) => out.push(Print::Text(text.clone())),
    }
}

/// Backslash-escape the characters of plain text that would read back as
/// markup.
pub fn escape(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (index, (offset, ch)) in text.char_indices().enumerate() {
        let prev = index.checked_sub(1).map(|i| chars[i]);
        let next = chars.get(index + 1).copied();
        let rest = &text[offset..];
        let markup = match ch {
            '*' | '`' => true,
            '\\' => next.is_some_and(|c| c.is_ascii_punctuation()),
            // Intraword underscores never delimit emphasis.
            '_' => !(prev.is_some_and(char::is_alphanumeric) && next.is_some_and(char::is_alphanumeric)),
            '<' => next.is_some_and(|c| c.is_ascii_alphabetic() || matches!(c, '/' | '!' | '?')),
            '&' => RE_ENTITY.is_match(rest),
            '[' => RE_LINK.is_match(rest),
            _ => false,
        };
        if markup {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn wrapped(tree: &Tree, id: NodeId, delimiter: &str, out: &mut Vec<Print>) {
    out.push(Print::Text(delimiter.to_string()));
    emit_children(tree, id, out);
    out.push(Print::Text(delimiter.to_string()));
}

fn emit_children(tree: &Tree, id: NodeId, out: &mut Vec<Print>) {
    let children = tree.children(id);
    let ordered = match tree.kind(id) {
        NodeKind::List { ordered } => Some(*ordered),
        _ => None,
    };
    // Trailing markers don't count as siblings needing separation.
    let last_index = children
        .iter()
        .rposition(|&c| tree.kind(c).layout() != Layout::Marker)
        .unwrap_or(0);

    let mut last: Option<Layout> = None;
    let mut number = 0;
    for (index, &child) in children.iter().enumerate() {
        let layout = tree.kind(child).layout();
        if last == Some(Layout::Span) && layout == Layout::Block {
            out.push(Print::Newlines(1));
        }
        if layout != Layout::Marker {
            last = Some(layout);
        }

        match ordered {
            Some(ordered) => {
                number += 1;
                let marker = if ordered {
                    format!("{}.", number)
                } else {
                    "-".to_string()
                };
                out.push(Print::Text(format!("{:<width$}", marker, width = GUTTER)));
                out.push(Print::Indent(GUTTER as isize));
                emit(tree, child, out);
                out.push(Print::Indent(-(GUTTER as isize)));
            }
            None => emit(tree, child, out),
        }

        if index < last_index {
            if let Some(newlines) = tree.node(child).newlines {
                out.push(Print::Newlines(newlines));
            }
        }
    }
}

/// One output line before wrapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Logical {
    /// Text to wrap, with the hanging indent of its continuations.
    Wrapped { text: String, hanging: usize },
    Verbatim(String),
}

/// Assemble prints into logical lines.
pub fn assemble(prints: &[Print]) -> Vec<Logical> {
    let mut lines = Vec::new();
    let mut buffer = String::new();
    let mut indent: usize = 0;
    let mut hanging: usize = 0;
    // Set after verbatim lines, which end their own line.
    let mut absorb = false;

    for print in prints {
        match print {
            Print::Text(text) => {
                buffer.push_str(text);
                absorb = false;
            }
            Print::Indent(delta) => {
                indent = indent.saturating_add_signed(*delta);
                hanging = hanging.max(indent);
            }
            Print::Hang(width) => hanging += width,
            Print::Newlines(count) => {
                for _ in 0..*count {
                    if absorb {
                        absorb = false;
                        continue;
                    }
                    lines.push(Logical::Wrapped {
                        text: std::mem::take(&mut buffer),
                        hanging,
                    });
                    buffer = " ".repeat(indent);
                    hanging = indent;
                }
            }
            Print::Verbatim(code) => {
                if !buffer.trim().is_empty() {
                    lines.push(Logical::Wrapped {
                        text: std::mem::take(&mut buffer),
                        hanging,
                    });
                }
                let code = code.strip_suffix('\n').unwrap_or(code);
                for line in code.split('\n') {
                    let line = line.trim_end_matches('\r');
                    if line.trim().is_empty() {
                        lines.push(Logical::Verbatim(String::new()));
                    } else {
                        let pad = " ".repeat(indent + GUTTER);
                        lines.push(Logical::Verbatim(format!("{}{}", pad, line)));
                    }
                }
                buffer = " ".repeat(indent);
                hanging = indent;
                absorb = true;
            }
        }
    }
    if !buffer.trim().is_empty() {
        lines.push(Logical::Wrapped {
            text: buffer,
            hanging,
        });
    }
    lines
}

//! At-command normaliser — rewrites documentation tags at paragraph starts
//! into the output convention's syntax.

use super::Convention;
use crate::markdown::{NodeKind, Tree};
use regex::Regex;
use std::sync::LazyLock;

static RE_AT_COMMAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^@(?:(?P<drop>(?i:brief|description|details))\s+|(?P<ret>(?i:return))(?i:s)?\s+|(?P<cap>(?i:version))\s+|(?P<param>(?i:param))(?i:eter)?\s+(?P<name>\w+)\s*|(?P<ignore>(?i:file))\s+)",
    )
    .unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtCommand {
    /// `@brief`, `@description` or `@details`, keyword lower-cased.
    Summary(String),
    Return,
    Version,
    Parameter(String),
    File,
}

impl AtCommand {
    pub fn keyword(&self) -> &str {
        match self {
            AtCommand::Summary(keyword) => keyword,
            AtCommand::Return => "return",
            AtCommand::Version => "version",
            AtCommand::Parameter(_) => "param",
            AtCommand::File => "file",
        }
    }
}

/// Recognise an at-command at the start of `text`. Returns the command and
/// the length of the text it covers, trailing whitespace included.
pub fn recognise(text: &str) -> Option<(AtCommand, usize)> {
    let caps = RE_AT_COMMAND.captures(text)?;
    let len = caps.get(0)?.end();
    let command = if let Some(m) = caps.name("drop") {
        AtCommand::Summary(m.as_str().to_lowercase())
    } else if caps.name("ret").is_some() {
        AtCommand::Return
    } else if caps.name("cap").is_some() {
        AtCommand::Version
    } else if caps.name("param").is_some() {
        AtCommand::Parameter(caps.name("name")?.as_str().to_string())
    } else {
        AtCommand::File
    };
    Some((command, len))
}

/// Rewrite the at-command opening each paragraph, and record the prefix
/// width as the paragraph's hanging indent.
pub fn normalise(tree: &mut Tree, convention: &dyn Convention) {
    for id in tree.descendants() {
        if *tree.kind(id) != NodeKind::Paragraph {
            continue;
        }
        let Some(&first) = tree.children(id).first() else {
            continue;
        };
        let NodeKind::Text(text) = tree.kind(first) else {
            continue;
        };
        let text = text.clone();

        let Some((command, len)) = recognise(&text) else {
            if text.starts_with('@') {
                let token = text.split_whitespace().next().unwrap_or_default();
                log::warn!("apparent unrecognised at-command: {}", token);
            }
            continue;
        };
        let Some(prefix) = convention.at_prefix(&command) else {
            continue;
        };
        let rewritten = format!("{}{}", prefix, &text[len..]);
        tree.node_mut(first).kind = NodeKind::Text(rewritten);
        tree.node_mut(id).hanging = prefix.chars().count();
    }
}

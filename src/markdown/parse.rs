//! Document parser — markdown subset plus `doc://` references, built on
//! pulldown-cmark's event stream.

use super::{Address, NodeId, NodeKind, Reference, Tree};
use crate::error::{Error, Result};
use pulldown_cmark::{Event, LinkType, Options, Parser, Tag, TagEnd};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

// -- Regex patterns -----------------------------------------------------------

/// Bare `doc://...` up to whitespace, or `[doc://...]` with optional padding.
static RE_DOC_URI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(doc://\S*)|\[\s*(doc://[^\]\s]*)\s*\]").unwrap()
});

/// At-commands that force a new block.
static RE_AT_SPLIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@(?i:returns?|param|brief|description|details|version)").unwrap()
});

/// Parse `text` into a new tree. References resolve relative to `source`.
pub fn parse(text: &str, source: &Path) -> Result<Tree> {
    let mut tree = Tree::new();
    let root = tree.root();
    parse_into(&mut tree, root, text, source, &[])?;
    Ok(tree)
}

/// Parse `text` and append the resulting blocks under `parent`.
///
/// `chain` is recorded on every reference found, for cycle detection.
pub fn parse_into(
    tree: &mut Tree,
    parent: NodeId,
    text: &str,
    source: &Path,
    chain: &[Address],
) -> Result<()> {
    let mut builder = Builder {
        tree,
        stack: vec![parent],
        pending: String::new(),
        source: source.to_path_buf(),
        chain: chain.to_vec(),
    };
    // Tables and strikethrough are recognised only to be rejected.
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    for event in Parser::new_ext(text, options) {
        builder.event(event)?;
    }
    builder.flush();
    Ok(())
}

struct Builder<'t> {
    tree: &'t mut Tree,
    stack: Vec<NodeId>,
    /// Text and soft breaks not yet turned into nodes.
    pending: String,
    source: PathBuf,
    chain: Vec<Address>,
}

impl Builder<'_> {
    fn top(&self) -> NodeId {
        self.stack.last().copied().unwrap_or_else(|| self.tree.root())
    }

    fn open(&mut self, kind: NodeKind) {
        self.flush();
        let id = self.tree.add(kind);
        let parent = self.top();
        self.tree.append(parent, id);
        self.stack.push(id);
    }

    fn close(&mut self) {
        self.flush();
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    fn leaf(&mut self, kind: NodeKind) {
        self.flush();
        let id = self.tree.add(kind);
        let parent = self.top();
        self.tree.append(parent, id);
    }

    fn reference(&self, uri: &str) -> NodeKind {
        NodeKind::Reference(Reference {
            uri: uri.to_string(),
            source: self.source.clone(),
            resolved: false,
            content_lines: 0,
            chain: self.chain.clone(),
        })
    }

    fn event(&mut self, event: Event<'_>) -> Result<()> {
        match event {
            Event::Start(tag) => self.start(tag)?,
            Event::End(tag) => self.end(tag),
            Event::Text(text) => {
                let top = self.top();
                match &mut self.tree.node_mut(top).kind {
                    NodeKind::CodeBlock { code } => code.push_str(&text),
                    // Autolink text repeats the URL already held by the node.
                    NodeKind::Autolink(_) | NodeKind::Reference(_) => {}
                    _ => self.pending.push_str(&text),
                }
            }
            // Re-wrapping makes soft breaks plain whitespace.
            Event::SoftBreak => self.pending.push('\n'),
            Event::Code(code) => self.leaf(NodeKind::CodeSpan(code.to_string())),
            Event::InlineHtml(html) => self.leaf(NodeKind::InlineHtml(html.to_string())),
            Event::Html(_) => return Err(Error::unsupported("HTML block")),
            Event::HardBreak => return Err(Error::unsupported("hard line break")),
            Event::Rule => return Err(Error::unsupported("horizontal rule")),
            other => return Err(Error::unsupported(format!("{:?}", other))),
        }
        Ok(())
    }

    fn start(&mut self, tag: Tag<'_>) -> Result<()> {
        match tag {
            Tag::Paragraph => {
                self.open(NodeKind::Paragraph);
            }
            Tag::Heading { level, .. } => {
                self.open(NodeKind::Header {
                    level: level as usize,
                });
            }
            Tag::List(first) => {
                self.open(NodeKind::List {
                    ordered: first.is_some(),
                });
            }
            Tag::Item => {
                self.open(NodeKind::ListItem);
            }
            Tag::CodeBlock(_) => {
                self.open(NodeKind::CodeBlock {
                    code: String::new(),
                });
            }
            Tag::Emphasis => {
                self.open(NodeKind::Emphasis);
            }
            Tag::Strong => {
                self.open(NodeKind::Strong);
            }
            Tag::Link {
                link_type: LinkType::Autolink | LinkType::Email,
                dest_url,
                ..
            } => {
                let kind = if dest_url.starts_with("doc:") {
                    self.reference(&dest_url)
                } else {
                    NodeKind::Autolink(dest_url.to_string())
                };
                self.open(kind);
            }
            Tag::Link { .. } => return Err(Error::unsupported("link")),
            Tag::Image { .. } => return Err(Error::unsupported("image")),
            Tag::BlockQuote(_) => return Err(Error::unsupported("block quote")),
            Tag::HtmlBlock => return Err(Error::unsupported("HTML block")),
            Tag::Strikethrough => return Err(Error::unsupported("strikethrough")),
            Tag::Table(_) | Tag::TableHead | Tag::TableRow | Tag::TableCell => {
                return Err(Error::unsupported("table"))
            }
            other => return Err(Error::unsupported(format!("{:?}", other))),
        }
        Ok(())
    }

    fn end(&mut self, _tag: TagEnd) {
        self.close();
    }

    /// Turn pending text into text, splitter and reference nodes.
    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.pending);
        let parent = self.top();
        let mut cursor = 0;
        for caps in RE_DOC_URI.captures_iter(&text) {
            let Some(whole) = caps.get(0) else { continue };
            let uri = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
            self.append_texts(parent, &text[cursor..whole.start()]);
            let kind = self.reference(uri);
            let id = self.tree.add(kind);
            self.tree.append(parent, id);
            cursor = whole.end();
        }
        self.append_texts(parent, &text[cursor..]);
    }

    /// Append `text`, split so that every at-command starts a new text node
    /// flagged as a splitter.
    fn append_texts(&mut self, parent: NodeId, text: &str) {
        let mut cursor = 0;
        for found in RE_AT_SPLIT.find_iter(text) {
            self.append_text(parent, &text[cursor..found.start()], false);
            self.append_text(parent, found.as_str(), true);
            cursor = found.end();
        }
        self.append_text(parent, &text[cursor..], false);
    }

    fn append_text(&mut self, parent: NodeId, text: &str, splitter: bool) {
        if text.is_empty() {
            return;
        }
        let id = self.tree.add(NodeKind::Text(text.to_string()));
        self.tree.node_mut(id).splitter = splitter;
        self.tree.append(parent, id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outline(text: &str) -> String {
        parse(text, Path::new("/src/a.h")).unwrap().to_string()
    }

    #[test]
    fn paragraphs_and_soft_breaks() {
        assert_eq!(
            outline("One\ntwo\n\nThree\n"),
            "paragraph\n  text \"One\\ntwo\"\nparagraph\n  text \"Three\"\n"
        );
    }

    #[test]
    fn header_and_spans() {
        assert_eq!(
            outline("## Title\nSome *em* and **strong** `code`\n"),
            concat!(
                "header 2\n",
                "  text \"Title\"\n",
                "paragraph\n",
                "  text \"Some \"\n",
                "  emphasis\n",
                "    text \"em\"\n",
                "  text \" and \"\n",
                "  strong\n",
                "    text \"strong\"\n",
                "  text \" \"\n",
                "  code_span \"code\"\n",
            )
        );
    }

    #[test]
    fn tight_list_items_hold_text() {
        assert_eq!(
            outline("- one\n- two\n"),
            "list bullet\n  list_item\n    text \"one\"\n  list_item\n    text \"two\"\n"
        );
    }

    #[test]
    fn code_block_is_verbatim() {
        assert_eq!(
            outline("Intro\n\n    let x = *y*;\n"),
            "paragraph\n  text \"Intro\"\ncode_block \"let x = *y*;\\n\"\n"
        );
    }

    #[test]
    fn bracketed_and_bare_references() {
        let tree = parse(
            "See [ doc://./a.md#one ] and doc://#two\n",
            Path::new("/src/a.h"),
        )
        .unwrap();
        let refs: Vec<_> = tree
            .descendants()
            .into_iter()
            .filter_map(|id| match tree.kind(id) {
                NodeKind::Reference(r) => Some((r.uri.clone(), r.source.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(
            refs,
            [
                ("doc://./a.md#one".to_string(), PathBuf::from("/src/a.h")),
                ("doc://#two".to_string(), PathBuf::from("/src/a.h")),
            ]
        );
    }

    #[test]
    fn angle_bracket_doc_uri_is_a_reference() {
        assert_eq!(outline("<doc://#frag>\n"), "paragraph\n  reference doc://#frag\n");
    }

    #[test]
    fn autolink_and_inline_html() {
        assert_eq!(
            outline("<https://example.com> <b>x</b>\n"),
            concat!(
                "paragraph\n",
                "  autolink \"https://example.com\"\n",
                "  text \" \"\n",
                "  inline_html \"<b>\"\n",
                "  text \"x\"\n",
                "  inline_html \"</b>\"\n",
            )
        );
    }

    #[test]
    fn at_commands_split_text() {
        let tree = parse("@param foo The foo.\n@return Bar.\n", Path::new("a.h")).unwrap();
        let splitters: Vec<_> = tree
            .descendants()
            .into_iter()
            .filter(|&id| tree.node(id).splitter)
            .map(|id| tree.text(id))
            .collect();
        assert_eq!(splitters, ["@param", "@return"]);
    }

    #[test]
    fn unsupported_constructs_fail() {
        for text in [
            "> quoted\n",
            "<div>\nblock\n</div>\n",
            "---\n",
            "![alt](img.png)\n",
            "[link](http://x)\n",
            "line  \nbreak\n",
            "| a | b |\n|---|---|\n| 1 | 2 |\n",
            "~~gone~~\n",
        ] {
            let result = parse(text, Path::new("a.h"));
            assert!(
                matches!(result, Err(Error::Unsupported { .. })),
                "{:?} should be unsupported",
                text
            );
        }
    }
}

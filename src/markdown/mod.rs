//! Document tree for comment bodies.
//!
//! Nodes live in an arena and refer to each other by index, so the splicing
//! passes can move subtrees around with local edits to child lists.

pub mod parse;
pub mod resolve;
pub mod splice;

use std::fmt;
use std::path::PathBuf;

pub type NodeId = usize;

/// A fragment by content file and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    pub path: PathBuf,
    pub name: String,
}

/// A `doc://` cross-reference awaiting, or holding, transcluded content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub uri: String,
    /// File the reference is resolved relative to.
    pub source: PathBuf,
    pub resolved: bool,
    /// Line count of the fetched fragment.
    pub content_lines: usize,
    /// Fragments whose content this reference was found in, outermost
    /// first.
    pub chain: Vec<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Paragraph,
    Header { level: usize },
    List { ordered: bool },
    ListItem,
    CodeBlock { code: String },
    Reference(Reference),
    Text(String),
    Emphasis,
    Strong,
    CodeSpan(String),
    Autolink(String),
    InlineHtml(String),
    /// Visible start or end of injected content.
    Marker(String),
}

/// How a node lays out among its siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Block,
    Span,
    Marker,
}

impl NodeKind {
    pub fn layout(&self) -> Layout {
        match self {
            NodeKind::Text(_)
            | NodeKind::Emphasis
            | NodeKind::Strong
            | NodeKind::CodeSpan(_)
            | NodeKind::Autolink(_)
            | NodeKind::InlineHtml(_) => Layout::Span,
            NodeKind::Marker(_) => Layout::Marker,
            NodeKind::Document
            | NodeKind::Paragraph
            | NodeKind::Header { .. }
            | NodeKind::List { .. }
            | NodeKind::ListItem
            | NodeKind::CodeBlock { .. }
            | NodeKind::Reference(_) => Layout::Block,
        }
    }

    pub fn is_block(&self) -> bool {
        self.layout() == Layout::Block
    }

    /// Newlines emitted after this node when a sibling follows.
    fn default_newlines(&self) -> Option<usize> {
        match self {
            NodeKind::Paragraph | NodeKind::List { .. } | NodeKind::CodeBlock { .. } => Some(2),
            NodeKind::Header { .. } => Some(1),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Document => "document",
            NodeKind::Paragraph => "paragraph",
            NodeKind::Header { .. } => "header",
            NodeKind::List { .. } => "list",
            NodeKind::ListItem => "list_item",
            NodeKind::CodeBlock { .. } => "code_block",
            NodeKind::Reference(_) => "reference",
            NodeKind::Text(_) => "text",
            NodeKind::Emphasis => "emphasis",
            NodeKind::Strong => "strong",
            NodeKind::CodeSpan(_) => "code_span",
            NodeKind::Autolink(_) => "autolink",
            NodeKind::InlineHtml(_) => "inline_html",
            NodeKind::Marker(_) => "marker",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub newlines: Option<usize>,
    /// Extra hanging indent of the node's first line, set by at-command
    /// normalisation.
    pub hanging: usize,
    /// Text that begins with an at-command and must start a new block.
    pub splitter: bool,
}

#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    pub fn new() -> Self {
        let mut tree = Tree {
            nodes: Vec::new(),
            root: 0,
        };
        tree.root = tree.add(NodeKind::Document);
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Create a detached node.
    pub fn add(&mut self, kind: NodeKind) -> NodeId {
        let newlines = kind.default_newlines();
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
            newlines,
            hanging: 0,
            splitter: false,
        });
        self.nodes.len() - 1
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id].kind
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
    }

    pub fn insert(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.insert(index, child);
    }

    /// Detach the child at `index` and return it.
    pub fn remove(&mut self, parent: NodeId, index: usize) -> NodeId {
        let child = self.nodes[parent].children.remove(index);
        self.nodes[child].parent = None;
        child
    }

    /// Detach and return the children of `parent` from `index` on.
    pub fn split_off(&mut self, parent: NodeId, index: usize) -> Vec<NodeId> {
        let tail = self.nodes[parent].children.split_off(index);
        for &child in &tail {
            self.nodes[child].parent = None;
        }
        tail
    }

    pub fn index_of(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.nodes[parent].children.iter().position(|&c| c == child)
    }

    /// Nodes reachable from `id` in document order, `id` first.
    pub fn preorder(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.nodes[next].children.iter().rev());
        }
        out
    }

    /// Descendants of the root in document order.
    pub fn descendants(&self) -> Vec<NodeId> {
        let mut all = self.preorder(self.root);
        all.remove(0);
        all
    }

    /// First node in document order satisfying `pred`.
    pub fn find(&self, pred: impl Fn(&Node) -> bool) -> Option<NodeId> {
        self.preorder(self.root)
            .into_iter()
            .find(|&id| pred(&self.nodes[id]))
    }

    /// Concatenated text of all span leaves below `id`.
    pub fn text(&self, id: NodeId) -> String {
        let mut out = String::new();
        for node in self.preorder(id) {
            match &self.nodes[node].kind {
                NodeKind::Text(s)
                | NodeKind::CodeSpan(s)
                | NodeKind::Autolink(s)
                | NodeKind::InlineHtml(s)
                | NodeKind::Marker(s) => out.push_str(s),
                NodeKind::CodeBlock { code } => out.push_str(code),
                _ => {}
            }
        }
        out
    }

    fn fmt_node(&self, id: NodeId, depth: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = &self.nodes[id];
        write!(f, "{:indent$}{}", "", node.kind.name(), indent = depth * 2)?;
        match &node.kind {
            NodeKind::Header { level } => write!(f, " {}", level)?,
            NodeKind::List { ordered } => write!(f, " {}", if *ordered { "ordered" } else { "bullet" })?,
            NodeKind::Text(s)
            | NodeKind::CodeSpan(s)
            | NodeKind::Autolink(s)
            | NodeKind::InlineHtml(s)
            | NodeKind::Marker(s) => write!(f, " {:?}", s)?,
            NodeKind::CodeBlock { code } => write!(f, " {:?}", code)?,
            NodeKind::Reference(r) => write!(f, " {}", r.uri)?,
            _ => {}
        }
        writeln!(f)?;
        for &child in &node.children {
            self.fmt_node(child, depth + 1, f)?;
        }
        Ok(())
    }
}

/// Indented outline, one node per line. Used in debug logs and tests.
impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &child in self.children(self.root) {
            self.fmt_node(child, 0, f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_remove_keep_parents() {
        let mut tree = Tree::new();
        let root = tree.root();
        let p = tree.add(NodeKind::Paragraph);
        let t = tree.add(NodeKind::Text("a".into()));
        tree.append(root, p);
        tree.append(p, t);
        assert_eq!(tree.parent(t), Some(p));
        assert_eq!(tree.index_of(root, p), Some(0));
        let removed = tree.remove(p, 0);
        assert_eq!(removed, t);
        assert_eq!(tree.parent(t), None);
        assert!(tree.children(p).is_empty());
    }

    #[test]
    fn outline_display() {
        let mut tree = Tree::new();
        let root = tree.root();
        let p = tree.add(NodeKind::Paragraph);
        let t = tree.add(NodeKind::Text("hi".into()));
        tree.append(root, p);
        tree.append(p, t);
        assert_eq!(tree.to_string(), "paragraph\n  text \"hi\"\n");
    }

    #[test]
    fn default_newlines_by_kind() {
        let mut tree = Tree::new();
        let p = tree.add(NodeKind::Paragraph);
        let h = tree.add(NodeKind::Header { level: 2 });
        let t = tree.add(NodeKind::Text(String::new()));
        assert_eq!(tree.node(p).newlines, Some(2));
        assert_eq!(tree.node(h).newlines, Some(1));
        assert_eq!(tree.node(t).newlines, None);
    }
}

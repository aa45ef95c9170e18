//! Tree splicer and the tidy passes that run after it.
//!
//! Resolved references are replaced by their content. Content that can't
//! live in the reference's parent is hoisted to the grandparent, and the
//! parent is split around it.

use super::{Layout, NodeId, NodeKind, Tree};
use crate::error::{Error, Result};

/// Whether `child` may be a child of a `parent` node.
pub fn can_contain(parent: &NodeKind, child: &NodeKind) -> Result<bool> {
    if matches!(child.layout(), Layout::Span | Layout::Marker)
        || matches!(child, NodeKind::Reference(_))
    {
        return Ok(true);
    }
    match (parent, child) {
        (NodeKind::Document, _) => Ok(true),
        (NodeKind::Paragraph | NodeKind::Header { .. }, _) => Ok(false),
        (NodeKind::ListItem, NodeKind::Paragraph | NodeKind::List { .. }) => Ok(true),
        (NodeKind::ListItem, NodeKind::ListItem) => Ok(false),
        (NodeKind::List { .. }, child) => Ok(*child == NodeKind::ListItem),
        _ => Err(Error::Containment {
            parent: parent.name().to_string(),
            child: child.name().to_string(),
        }),
    }
}

fn marker_text(tree: &Tree, id: NodeId) -> Option<String> {
    match tree.kind(id) {
        NodeKind::Reference(r) => Some(format!(
            "<doc source=\"{}\" uri=\"{}\">",
            r.source.display(),
            r.uri
        )),
        _ => None,
    }
}


/// Replace every resolved reference by its content.
///
/// With `markers`, the content is bracketed by `<doc ...>` and `</doc>`
/// marker nodes naming the reference.
pub fn splice(tree: &mut Tree, markers: bool) -> Result<()> {
    while let Some(reference) = tree.find(|n| matches!(&n.kind, NodeKind::Reference(r) if r.resolved))
    {
        splice_one(tree, reference, markers)?;
    }
    check_containment(tree)
}

fn splice_one(tree: &mut Tree, reference: NodeId, markers: bool) -> Result<()> {
    let Some(parent) = tree.parent(reference) else {
        return Err(Error::invalid_tree("reference without a parent"));
    };
    let grandparent = tree.parent(parent);
    let ref_index = tree
        .index_of(parent, reference)
        .ok_or_else(|| Error::invalid_tree("reference missing from its parent"))?;

    let mut start = if markers {
        marker_text(tree, reference).map(|text| tree.add(NodeKind::Marker(text)))
    } else {
        None
    };
    let end = if markers {
        Some(tree.add(NodeKind::Marker("</doc>".to_string())))
    } else {
        None
    };

    let placed = [start, end];

    tree.remove(parent, ref_index);
    let content = tree.split_off(reference, 0);

    let mut target = parent;
    let mut index = ref_index;
    for child in content {
        if target == parent && !can_contain(tree.kind(parent), tree.kind(child))? {
            let Some(grandparent) = grandparent else {
                return Err(Error::Containment {
                    parent: tree.kind(parent).name().to_string(),
                    child: tree.kind(child).name().to_string(),
                });
            };
            let parent_index = tree
                .index_of(grandparent, parent)
                .ok_or_else(|| Error::invalid_tree("parent missing from grandparent"))?;
            target = grandparent;
            index = parent_index + 1;
        }
        if let Some(marker) = start.take() {
            tree.insert(target, index, marker);
            index += 1;
        }
        tree.insert(target, index, child);
        index += 1;
    }
    for marker in start.into_iter().chain(end) {
        tree.insert(target, index, marker);
        index += 1;
    }
    // Markers placed between blocks sit on lines of their own.
    for marker in placed.into_iter().flatten() {
        let between_blocks = tree.parent(marker).is_some_and(|p| {
            matches!(tree.kind(p), NodeKind::Document | NodeKind::ListItem)
        });
        if between_blocks {
            tree.node_mut(marker).newlines = Some(1);
        }
    }

    // Whatever followed the reference moves into a copy of the parent
    // placed after the hoisted content.
    if target != parent && tree.children(parent).len() > ref_index {
        let tail = tree.split_off(parent, ref_index);
        let copy = tree.add(tree.kind(parent).clone());
        tree.node_mut(copy).newlines = tree.node(parent).newlines;
        for child in tail {
            tree.append(copy, child);
        }
        tree.insert(target, index, copy);
    }

    if ref_index == 0 && tree.children(parent).is_empty() {
        if let Some(grandparent) = grandparent {
            if let Some(parent_index) = tree.index_of(grandparent, parent) {
                tree.remove(grandparent, parent_index);
            }
        }
    }
    Ok(())
}

/// Paragraphs and headers hold spans only once splicing is done.
fn check_containment(tree: &Tree) -> Result<()> {
    for id in tree.descendants() {
        let outer = tree.kind(id);
        if !matches!(outer, NodeKind::Paragraph | NodeKind::Header { .. }) {
            continue;
        }
        for inner in tree.preorder(id).into_iter().skip(1) {
            let kind = tree.kind(inner);
            if *kind == NodeKind::Paragraph {
                return Err(Error::invalid_tree(format!(
                    "nested paragraph under {}",
                    outer.name()
                )));
            }
            if kind.is_block() {
                return Err(Error::invalid_tree(format!(
                    "{} inside {}",
                    kind.name(),
                    outer.name()
                )));
            }
        }
    }
    Ok(())
}

/// List items made of spans end with one newline, items holding
/// paragraphs with a blank line.
pub fn set_newlines(tree: &mut Tree) {
    for id in tree.descendants() {
        if *tree.kind(id) != NodeKind::ListItem {
            continue;
        }
        let has_paragraph = tree
            .children(id)
            .iter()
            .any(|&c| *tree.kind(c) == NodeKind::Paragraph);
        tree.node_mut(id).newlines = Some(if has_paragraph { 2 } else { 1 });
    }
}

/// Split each block at its at-command texts so every at-command begins a
/// block of its own. The new block copies the split block's spacing.
pub fn resolve_splitters(tree: &mut Tree) {
    while let Some(splitter) = tree.find(|n| n.splitter) {
        tree.node_mut(splitter).splitter = false;
        let Some(parent) = tree.parent(splitter) else {
            continue;
        };
        let Some(grandparent) = tree.parent(parent) else {
            continue;
        };
        let (Some(index), Some(parent_index)) = (
            tree.index_of(parent, splitter),
            tree.index_of(grandparent, parent),
        ) else {
            continue;
        };
        if index == 0 {
            continue;
        }
        let tail = tree.split_off(parent, index);
        let copy = tree.add(tree.kind(parent).clone());
        tree.node_mut(copy).newlines = tree.node(parent).newlines;
        for child in tail {
            tree.append(copy, child);
        }
        tree.insert(grandparent, parent_index + 1, copy);
    }
}

/// Merge runs of adjacent text nodes.
pub fn join_texts(tree: &mut Tree) {
    for id in tree.preorder(tree.root()) {
        let children = tree.children(id).to_vec();
        let mut kept = Vec::with_capacity(children.len());
        let mut run: Option<NodeId> = None;
        for child in children {
            let text = match tree.kind(child) {
                NodeKind::Text(s) => Some(s.clone()),
                _ => None,
            };
            match (run, text) {
                (Some(first), Some(text)) => {
                    if let NodeKind::Text(s) = &mut tree.node_mut(first).kind {
                        s.push_str(&text);
                    }
                    tree.node_mut(child).parent = None;
                }
                (None, Some(_)) => {
                    run = Some(child);
                    kept.push(child);
                }
                (_, None) => {
                    run = None;
                    kept.push(child);
                }
            }
        }
        tree.node_mut(id).children = kept;
    }
}

/// Drop line breaks at the start of each paragraph's first text.
pub fn strip_leading_newlines(tree: &mut Tree) {
    for id in tree.descendants() {
        if *tree.kind(id) != NodeKind::Paragraph {
            continue;
        }
        let first = tree
            .children(id)
            .iter()
            .copied()
            .find(|&c| matches!(tree.kind(c), NodeKind::Text(_)));
        if let Some(first) = first {
            if let NodeKind::Text(s) = &mut tree.node_mut(first).kind {
                let stripped = s.trim_start_matches(['\r', '\n']).len();
                let cut = s.len() - stripped;
                s.drain(..cut);
            }
        }
    }
}

/// All structural passes between resolution and rendering.
pub fn finish(tree: &mut Tree, markers: bool) -> Result<()> {
    splice(tree, markers)?;
    set_newlines(tree);
    resolve_splitters(tree);
    join_texts(tree);
    strip_leading_newlines(tree);
    Ok(())
}

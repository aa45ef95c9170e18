//! Reference resolver — fetches `doc://` content into the tree.

use super::parse::parse_into;
use super::{Address, NodeId, NodeKind, Tree};
use crate::cache::ContentCache;
use crate::error::{Error, Result};

/// Maximum chain of references followed, even through distinct fragments.
pub const MAX_DEPTH: usize = 64;

/// Resolve every reference in `tree`, including references that appear in
/// fetched content, until none is left unresolved.
pub fn resolve(tree: &mut Tree, cache: &mut ContentCache) -> Result<()> {
    loop {
        let pending = unresolved(tree);
        if pending.is_empty() {
            return Ok(());
        }
        for id in pending {
            resolve_one(tree, cache, id)?;
        }
    }
}

fn unresolved(tree: &Tree) -> Vec<NodeId> {
    tree.descendants()
        .into_iter()
        .filter(|&id| matches!(tree.kind(id), NodeKind::Reference(r) if !r.resolved))
        .collect()
}

fn resolve_one(tree: &mut Tree, cache: &mut ContentCache, id: NodeId) -> Result<()> {
    let NodeKind::Reference(reference) = tree.kind(id).clone() else {
        return Ok(());
    };
    let depth = reference.chain.len();
    if depth >= MAX_DEPTH {
        return Err(Error::CyclicReference {
            uri: reference.uri,
            depth,
        });
    }

    let fragment = cache
        .resolve(&reference.uri, &reference.source)
        .map_err(|source| Error::Reference {
            uri: reference.uri.clone(),
            base: reference.source.clone(),
            source,
        })?;
    let content = fragment.content();
    let content_lines = fragment.lines.len();
    let path = fragment.path.clone();
    let address = Address {
        path: path.clone(),
        name: fragment.name.clone(),
    };
    if reference.chain.contains(&address) {
        return Err(Error::CyclicReference {
            uri: reference.uri,
            depth,
        });
    }
    log::debug!(
        "resolved {} to {} ({} line(s))",
        reference.uri,
        path.display(),
        content_lines
    );

    let mut chain = reference.chain;
    chain.push(address);
    parse_into(tree, id, &content, &path, &chain)?;
    if let NodeKind::Reference(r) = &mut tree.node_mut(id).kind {
        r.resolved = true;
        r.content_lines = content_lines;
    }
    Ok(())
}

/// Unwrap the paragraph around single-line fragments so their content can
/// sit inline where the reference was.
pub fn lift_singles(tree: &mut Tree) {
    for id in tree.descendants() {
        let single = matches!(tree.kind(id), NodeKind::Reference(r) if r.content_lines == 1);
        if !single || tree.children(id).len() != 1 {
            continue;
        }
        let wrapper = tree.children(id)[0];
        if *tree.kind(wrapper) != NodeKind::Paragraph {
            continue;
        }
        tree.remove(id, 0);
        for child in tree.split_off(wrapper, 0) {
            tree.append(id, child);
        }
    }
}

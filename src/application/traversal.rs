//! Read-only forest queries over a bounds store.
//!
//! These functions take no locks; services call them while holding the
//! forest lock in whichever mode their operation needs.

use std::collections::HashSet;

use crate::application::ApplicationResult;
use crate::domain::{DomainError, Node, NodeId};
use crate::infrastructure::traits::BoundsStore;

/// Fetch a node, rejecting missing keys and impossible bounds.
pub fn fetch(store: &dyn BoundsStore, id: NodeId) -> ApplicationResult<Node> {
    let node = store.get_by_key(id)?.ok_or(DomainError::NotFound(id))?;
    node.ensure_consistent()?;
    Ok(node)
}

/// Bounds of the interval enclosing `node`'s sibling group.
///
/// Roots are treated as children of a virtual node spanning `(0, max_right + 1)`.
pub fn enclosing_bounds(store: &dyn BoundsStore, node: &Node) -> ApplicationResult<(i64, i64)> {
    match node.parent {
        Some(parent) => {
            let parent = fetch(store, parent)?;
            Ok((parent.left, parent.right))
        }
        None => Ok((0, store.max_right()? + 1)),
    }
}

/// Number of siblings in `node`'s group, `node` included.
pub fn sibling_count(store: &dyn BoundsStore, node: &Node) -> ApplicationResult<usize> {
    let (left, right) = enclosing_bounds(store, node)?;
    Ok(store.count_by_interval(left, right, node.parent)?)
}

/// Direct (`recursive == false`) or all (`recursive == true`) children count.
pub fn count_children(
    store: &dyn BoundsStore,
    id: NodeId,
    recursive: bool,
) -> ApplicationResult<usize> {
    let node = fetch(store, id)?;
    if recursive {
        return Ok(node.descendant_count());
    }
    Ok(store.count_by_interval(node.left, node.right, Some(id))?)
}

/// Direct children, or the whole subtree in preorder, ordered by left.
pub fn children(
    store: &dyn BoundsStore,
    id: NodeId,
    recursive: bool,
) -> ApplicationResult<Vec<Node>> {
    let node = fetch(store, id)?;
    if recursive {
        return Ok(store.find_by_interval(node.left, node.right)?);
    }
    Ok(store.find_children(Some(id))?)
}

/// Ancestors of `id`, root first, ending with the node itself.
pub fn path(store: &dyn BoundsStore, id: NodeId) -> ApplicationResult<Vec<Node>> {
    let mut seen = HashSet::new();
    let mut path = Vec::new();
    let mut current = fetch(store, id)?;

    while let Some(parent_id) = current.parent {
        if !seen.insert(current.id) {
            return Err(DomainError::InconsistentBounds {
                node: current.id,
                reason: "parent references form a cycle".into(),
            }
            .into());
        }
        let parent = fetch(store, parent_id)?;
        if !parent.contains(&current) {
            return Err(DomainError::InconsistentBounds {
                node: current.id,
                reason: format!("not inside the interval of its parent {parent_id}"),
            }
            .into());
        }
        path.push(current);
        current = parent;
    }
    path.push(current);
    path.reverse();
    Ok(path)
}

/// 0-indexed position of `id` among its siblings, `None` if the scan misses it.
pub fn position(store: &dyn BoundsStore, id: NodeId) -> ApplicationResult<Option<usize>> {
    let node = fetch(store, id)?;
    let (parent_left, parent_right) = enclosing_bounds(store, &node)?;

    if node.left == parent_left + 1 {
        return Ok(Some(0));
    }
    if node.right + 1 == parent_right {
        let count = store.count_by_interval(parent_left, parent_right, node.parent)?;
        return Ok(Some(count.saturating_sub(1)));
    }

    Ok(store
        .find_children(node.parent)?
        .iter()
        .position(|sibling| sibling.id == id))
}

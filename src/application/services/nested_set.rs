//! Nested-set maintenance service
//!
//! Every structural change (insert, delete, reparent, sibling reorder) is a
//! sequence of range shifts that leaves the forest inconsistent between
//! steps. Each public operation therefore runs under the forest write lock
//! inside one store transaction, and rolls back on the first failure.

use std::sync::Arc;

use tracing::{debug, error, instrument, warn};

use crate::application::shift::shift;
use crate::application::traversal::{self, fetch};
use crate::application::services::ForestLock;
use crate::application::{ApplicationError, ApplicationResult};
use crate::config::Settings;
use crate::domain::{BoundKind, Bounds, DomainError, NewNode, NewRecord, Node, NodeId, Region};
use crate::infrastructure::traits::BoundsStore;

/// Service owning all mutations of one forest.
pub struct NestedSetService {
    store: Arc<dyn BoundsStore>,
    lock: ForestLock,
    jstree_positions: bool,
}

impl NestedSetService {
    /// Create a new nested-set service.
    pub fn new(store: Arc<dyn BoundsStore>, lock: ForestLock, settings: &Settings) -> Self {
        Self {
            store,
            lock,
            jstree_positions: settings.jstree_positions,
        }
    }

    /// Run `f` as one logical operation: exclusive lock, one transaction,
    /// rollback and the original error on failure.
    fn atomically<T>(
        &self,
        operation: &str,
        f: impl FnOnce(&dyn BoundsStore) -> ApplicationResult<T>,
    ) -> ApplicationResult<T> {
        let _guard = self
            .lock
            .write()
            .map_err(|_| ApplicationError::LockPoisoned)?;
        let store = self.store.as_ref();

        store.begin()?;
        let result = f(store).and_then(|value| {
            store.commit()?;
            Ok(value)
        });

        if let Err(e) = &result {
            warn!("{operation} failed, rolling back: {e}");
            if let Err(rollback_err) = store.rollback() {
                error!("{operation}: rollback failed: {rollback_err}");
            }
        } else {
            debug!("{operation} committed");
        }
        result
    }

    /// Pre-create hook: make room for a new node and return its bounds.
    ///
    /// `own_id` is the key the host will persist the node under, if known.
    /// The host must store the record with the returned bounds before any
    /// other structural change touches the forest.
    #[instrument(level = "debug", skip(self))]
    pub fn before_create(
        &self,
        parent: Option<NodeId>,
        own_id: Option<NodeId>,
    ) -> ApplicationResult<Bounds> {
        self.atomically("before_create", |store| {
            assign_bounds(store, parent, own_id)
        })
    }

    /// Insert a new node as the last root or the last child of its parent.
    #[instrument(level = "debug", skip(self))]
    pub fn insert(&self, new: NewNode) -> ApplicationResult<Node> {
        self.atomically("insert", |store| {
            let bounds = assign_bounds(store, new.parent, None)?;
            let node = store.insert(NewRecord {
                name: new.name,
                parent: new.parent,
                bounds,
            })?;
            debug!("inserted {node}");
            Ok(node)
        })
    }

    /// Pre-delete hook: remove the strict descendants of `id` and close the
    /// gap. The host removes `id` itself afterwards. Returns the number of
    /// descendants removed.
    #[instrument(level = "debug", skip(self))]
    pub fn before_delete(&self, id: NodeId) -> ApplicationResult<usize> {
        self.atomically("before_delete", |store| {
            let node = fetch(store, id)?;
            remove_subtree(store, &node)
        })
    }

    /// Delete a node with its whole subtree. Returns the number of nodes removed.
    #[instrument(level = "debug", skip(self))]
    pub fn delete(&self, id: NodeId) -> ApplicationResult<usize> {
        self.atomically("delete", |store| {
            let node = fetch(store, id)?;
            let descendants = remove_subtree(store, &node)?;
            if !store.delete(id)? {
                return Err(DomainError::NotFound(id).into());
            }
            Ok(descendants + 1)
        })
    }

    /// Pre-save hook: apply a parent change the host made to `node`.
    ///
    /// Only `node.parent` is read; bounds come from the store.
    #[instrument(level = "debug", skip(self), fields(id = node.id))]
    pub fn before_save(&self, node: &Node) -> ApplicationResult<Node> {
        if node.parent == Some(node.id) {
            return Err(DomainError::InvalidParent {
                node: node.id,
                parent: node.id,
            }
            .into());
        }
        self.atomically("before_save", |store| {
            let stored = fetch(store, node.id)?;
            relocate(store, &stored, node.parent)
        })
    }

    /// Move `id` with its subtree to become the last child of `new_parent`,
    /// or the last root for `None`.
    #[instrument(level = "debug", skip(self))]
    pub fn reparent(&self, id: NodeId, new_parent: Option<NodeId>) -> ApplicationResult<Node> {
        self.atomically("reparent", |store| {
            let node = fetch(store, id)?;
            relocate(store, &node, new_parent)
        })
    }

    /// Swap `id` with its previous sibling. False if it is already first.
    #[instrument(level = "debug", skip(self))]
    pub fn move_up(&self, id: NodeId) -> ApplicationResult<bool> {
        self.atomically("move_up", |store| {
            let node = fetch(store, id)?;
            Ok(swap_with_previous(store, &node)?.is_some())
        })
    }

    /// Swap `id` with its next sibling. False if it is already last.
    #[instrument(level = "debug", skip(self))]
    pub fn move_down(&self, id: NodeId) -> ApplicationResult<bool> {
        self.atomically("move_down", |store| {
            let node = fetch(store, id)?;
            Ok(swap_with_next(store, &node)?.is_some())
        })
    }

    /// Move `id` to sibling `position`, optionally under a new parent first.
    ///
    /// `new_parent`: `None` keeps the current parent, `Some(None)` moves to the
    /// root set, `Some(Some(p))` moves under `p`. Positions past the last
    /// sibling are clamped. Returns the final position.
    #[instrument(level = "debug", skip(self))]
    pub fn move_to(
        &self,
        id: NodeId,
        position: usize,
        new_parent: Option<Option<NodeId>>,
    ) -> ApplicationResult<usize> {
        let jstree_positions = self.jstree_positions;
        self.atomically("move_to", |store| {
            let mut node = fetch(store, id)?;
            if let Some(parent) = new_parent {
                node = relocate(store, &node, parent)?;
            }

            let current = current_position(store, &node)?;
            let count = traversal::sibling_count(store, &node)?;

            let mut target = position;
            if jstree_positions && current < target {
                target -= 1;
            }
            let target = target.min(count.saturating_sub(1));
            debug!("moving {id} from position {current} to {target} of {count}");

            for _ in 0..current.abs_diff(target) {
                let moved = if current < target {
                    swap_with_next(store, &node)?
                } else {
                    swap_with_previous(store, &node)?
                };
                match moved {
                    Some(moved) => node = moved,
                    None => break,
                }
            }
            current_position(store, &node)
        })
    }
}

fn current_position(store: &dyn BoundsStore, node: &Node) -> ApplicationResult<usize> {
    traversal::position(store, node.id)?.ok_or_else(|| {
        DomainError::InconsistentBounds {
            node: node.id,
            reason: "missing from its own sibling list".into(),
        }
        .into()
    })
}

/// Compute bounds for a node about to be created, shifting to make room.
fn assign_bounds(
    store: &dyn BoundsStore,
    parent: Option<NodeId>,
    own_id: Option<NodeId>,
) -> ApplicationResult<Bounds> {
    let Some(parent_id) = parent else {
        let max = store.max_right()?;
        return Ok(Bounds {
            left: max + 1,
            right: max + 2,
        });
    };

    if own_id == Some(parent_id) {
        return Err(DomainError::InvalidParent {
            node: parent_id,
            parent: parent_id,
        }
        .into());
    }

    let parent = fetch(store, parent_id)?;
    let r = parent.right;
    shift(store, Region::AtLeast(r), 2)?;
    Ok(Bounds {
        left: r,
        right: r + 1,
    })
}

/// Remove the strict descendants of `node` and close the gap left by its
/// whole span. `node` itself stays in the store.
fn remove_subtree(store: &dyn BoundsStore, node: &Node) -> ApplicationResult<usize> {
    let removed = if node.is_leaf() {
        0
    } else {
        store.delete_descendants(node.id)?
    };

    if removed != node.descendant_count() {
        return Err(DomainError::InconsistentBounds {
            node: node.id,
            reason: format!(
                "span promises {} descendants, store removed {removed}",
                node.descendant_count()
            ),
        }
        .into());
    }

    shift(store, Region::AtLeast(node.right + 1), -(node.span() + 1))?;
    debug!("removed {removed} descendants of {}", node.id);
    Ok(removed)
}

/// Relocate `node`'s subtree to the end of `new_parent`'s children.
///
/// The subtree is parked in negative space first so the gap-closing shift
/// cannot touch it, then restored at its final place.
fn relocate(
    store: &dyn BoundsStore,
    node: &Node,
    new_parent: Option<NodeId>,
) -> ApplicationResult<Node> {
    if new_parent == node.parent {
        return Ok(node.clone());
    }

    let target_right = match new_parent {
        Some(parent_id) => {
            let invalid = DomainError::InvalidParent {
                node: node.id,
                parent: parent_id,
            };
            if parent_id == node.id {
                return Err(invalid.into());
            }
            let parent = fetch(store, parent_id)?;
            if node.contains(&parent) {
                return Err(invalid.into());
            }
            parent.right
        }
        None => store.max_right()? + 1,
    };

    let (l, r, span) = (node.left, node.right, node.span());

    shift(store, Region::within(l, r), -r)?;
    let shift_x = if r < target_right {
        shift(store, Region::within(r + 1, target_right - 1), -(span + 1))?;
        target_right - r - 1
    } else {
        shift(store, Region::within(target_right, l - 1), span + 1)?;
        target_right - l
    };
    shift(store, Region::within(-span, 0), r + shift_x)?;
    store.set_parent(node.id, new_parent)?;

    debug!("relocated {} under {:?} by {shift_x}", node.id, new_parent);
    Ok(Node {
        parent: new_parent,
        left: l + shift_x,
        right: r + shift_x,
        ..node.clone()
    })
}

/// Transpose `node` with the sibling starting right after it.
fn swap_with_next(store: &dyn BoundsStore, node: &Node) -> ApplicationResult<Option<Node>> {
    let next = store
        .find_by_bound(BoundKind::Left, node.right + 1)?
        .filter(|next| next.parent == node.parent);
    let Some(next) = next else {
        return Ok(None);
    };

    let node_width = node.span() + 1;
    let next_width = next.span() + 1;

    shift(store, Region::within(node.left, node.right), -node.right)?;
    shift(store, Region::within(next.left, next.right), -node_width)?;
    shift(store, Region::within(-node.span(), 0), node.right + next_width)?;

    Ok(Some(Node {
        left: node.left + next_width,
        right: node.right + next_width,
        ..node.clone()
    }))
}

/// Transpose `node` with the sibling ending right before it.
fn swap_with_previous(store: &dyn BoundsStore, node: &Node) -> ApplicationResult<Option<Node>> {
    let prev = store
        .find_by_bound(BoundKind::Right, node.left - 1)?
        .filter(|prev| prev.parent == node.parent);
    let Some(prev) = prev else {
        return Ok(None);
    };

    let node_width = node.span() + 1;
    let prev_width = prev.span() + 1;

    shift(store, Region::within(node.left, node.right), -node.right)?;
    shift(store, Region::within(prev.left, prev.right), node_width)?;
    shift(store, Region::within(-node.span(), 0), node.right - prev_width)?;

    Ok(Some(Node {
        left: node.left - prev_width,
        right: node.right - prev_width,
        ..node.clone()
    }))
}

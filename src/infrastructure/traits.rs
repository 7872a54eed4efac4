//! I/O boundary traits for testability
//!
//! The engine talks to persistent storage only through `BoundsStore`, so
//! services can run against the in-memory store, the TOML file store, or a
//! failure-injecting wrapper in tests.

use crate::domain::{BoundKind, Node, NodeId, NewRecord, Region};
use crate::infrastructure::error::StoreResult;

/// Storage of node records with atomic bulk bound updates.
///
/// Query results that return several nodes are ordered by ascending left.
/// Every mutating call made by the engine is bracketed by `begin` and either
/// `commit` or `rollback`.
pub trait BoundsStore: Send + Sync {
    /// Fetch one node by key.
    fn get_by_key(&self, id: NodeId) -> StoreResult<Option<Node>>;

    /// Direct children of `parent`; `None` selects the roots.
    fn find_children(&self, parent: Option<NodeId>) -> StoreResult<Vec<Node>>;

    /// Nodes with `left > left_gt` and `right < right_lt`.
    fn find_by_interval(&self, left_gt: i64, right_lt: i64) -> StoreResult<Vec<Node>>;

    /// Count nodes with `left > left_gt`, `right < right_lt` and the given parent reference.
    fn count_by_interval(
        &self,
        left_gt: i64,
        right_lt: i64,
        parent: Option<NodeId>,
    ) -> StoreResult<usize>;

    /// The node whose `kind` bound equals `value`, if any.
    fn find_by_bound(&self, kind: BoundKind, value: i64) -> StoreResult<Option<Node>>;

    /// Highest right bound, 0 for an empty store.
    fn max_right(&self) -> StoreResult<i64>;

    /// Add `delta` to every `kind` bound matching `region`, atomically.
    fn shift_range(&self, kind: BoundKind, region: Region, delta: i64) -> StoreResult<()>;

    /// Remove every strict descendant of `id`. Returns the number removed.
    fn delete_descendants(&self, id: NodeId) -> StoreResult<usize>;

    /// Persist a positioned record under a fresh key.
    fn insert(&self, record: NewRecord) -> StoreResult<Node>;

    /// Rewrite a node's parent reference.
    fn set_parent(&self, id: NodeId, parent: Option<NodeId>) -> StoreResult<()>;

    /// Remove one node. Returns false if it did not exist.
    fn delete(&self, id: NodeId) -> StoreResult<bool>;

    /// Every node.
    fn all(&self) -> StoreResult<Vec<Node>>;

    /// Start a logical operation.
    fn begin(&self) -> StoreResult<()>;

    /// Make everything since `begin` durable.
    fn commit(&self) -> StoreResult<()>;

    /// Discard everything since `begin`.
    fn rollback(&self) -> StoreResult<()>;
}

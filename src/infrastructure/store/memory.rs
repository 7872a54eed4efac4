//! In-memory bounds store with snapshot transactions.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use itertools::Itertools;
use tracing::trace;

use crate::domain::{BoundKind, Node, NodeId, NewRecord, Region};
use crate::infrastructure::error::{StoreError, StoreResult};
use crate::infrastructure::traits::BoundsStore;

#[derive(Debug, Clone, Default)]
struct Tables {
    nodes: BTreeMap<NodeId, Node>,
    next_id: NodeId,
}

impl Tables {
    fn from_nodes(nodes: impl IntoIterator<Item = Node>) -> Self {
        let nodes: BTreeMap<NodeId, Node> = nodes.into_iter().map(|n| (n.id, n)).collect();
        let next_id = nodes.keys().next_back().map_or(1, |id| id + 1);
        Self { nodes, next_id }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    live: Tables,
    snapshot: Option<Tables>,
}

/// Bounds store keeping every record in a map behind a mutex.
///
/// `begin` clones the tables; `rollback` restores that clone.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing records. Keys are kept as given.
    pub fn with_nodes(nodes: impl IntoIterator<Item = Node>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                live: Tables::from_nodes(nodes),
                snapshot: None,
            }),
        }
    }

    /// Swap in a fresh set of records, e.g. after another writer changed
    /// the backing file. Refused while a transaction is open.
    pub fn replace_all(&self, nodes: impl IntoIterator<Item = Node>) -> StoreResult<()> {
        let mut state = self.lock()?;
        if state.snapshot.is_some() {
            return Err(StoreError::Transaction(
                "cannot replace records inside a transaction".into(),
            ));
        }
        state.live = Tables::from_nodes(nodes);
        Ok(())
    }

    /// True while a transaction is open.
    pub fn in_transaction(&self) -> StoreResult<bool> {
        Ok(self.lock()?.snapshot.is_some())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Transaction("memory store mutex poisoned".into()))
    }

    fn select(&self, filter: impl Fn(&Node) -> bool) -> StoreResult<Vec<Node>> {
        let state = self.lock()?;
        Ok(state
            .live
            .nodes
            .values()
            .filter(|n| filter(n))
            .sorted_by_key(|n| n.left)
            .cloned()
            .collect())
    }
}

impl BoundsStore for MemoryStore {
    fn get_by_key(&self, id: NodeId) -> StoreResult<Option<Node>> {
        Ok(self.lock()?.live.nodes.get(&id).cloned())
    }

    fn find_children(&self, parent: Option<NodeId>) -> StoreResult<Vec<Node>> {
        self.select(|n| n.parent == parent)
    }

    fn find_by_interval(&self, left_gt: i64, right_lt: i64) -> StoreResult<Vec<Node>> {
        self.select(|n| n.left > left_gt && n.right < right_lt)
    }

    fn count_by_interval(
        &self,
        left_gt: i64,
        right_lt: i64,
        parent: Option<NodeId>,
    ) -> StoreResult<usize> {
        let state = self.lock()?;
        Ok(state
            .live
            .nodes
            .values()
            .filter(|n| n.left > left_gt && n.right < right_lt && n.parent == parent)
            .count())
    }

    fn find_by_bound(&self, kind: BoundKind, value: i64) -> StoreResult<Option<Node>> {
        let state = self.lock()?;
        Ok(state
            .live
            .nodes
            .values()
            .find(|n| match kind {
                BoundKind::Left => n.left == value,
                BoundKind::Right => n.right == value,
            })
            .cloned())
    }

    fn max_right(&self) -> StoreResult<i64> {
        let state = self.lock()?;
        Ok(state.live.nodes.values().map(|n| n.right).max().unwrap_or(0))
    }

    fn shift_range(&self, kind: BoundKind, region: Region, delta: i64) -> StoreResult<()> {
        let mut state = self.lock()?;
        let mut touched = 0usize;
        for node in state.live.nodes.values_mut() {
            let bound = match kind {
                BoundKind::Left => &mut node.left,
                BoundKind::Right => &mut node.right,
            };
            if region.contains(*bound) {
                *bound += delta;
                touched += 1;
            }
        }
        trace!(?kind, %region, delta, touched, "shift_range");
        Ok(())
    }

    fn delete_descendants(&self, id: NodeId) -> StoreResult<usize> {
        let mut state = self.lock()?;
        let Some((left, right)) = state.live.nodes.get(&id).map(|n| (n.left, n.right)) else {
            return Ok(0);
        };
        let before = state.live.nodes.len();
        state
            .live
            .nodes
            .retain(|_, n| !(n.left > left && n.right < right));
        Ok(before - state.live.nodes.len())
    }

    fn insert(&self, record: NewRecord) -> StoreResult<Node> {
        let mut state = self.lock()?;
        let id = state.live.next_id.max(1);
        state.live.next_id = id + 1;
        let node = Node {
            id,
            parent: record.parent,
            left: record.bounds.left,
            right: record.bounds.right,
            name: record.name,
        };
        state.live.nodes.insert(id, node.clone());
        Ok(node)
    }

    fn set_parent(&self, id: NodeId, parent: Option<NodeId>) -> StoreResult<()> {
        let mut state = self.lock()?;
        let node = state
            .live
            .nodes
            .get_mut(&id)
            .ok_or_else(|| StoreError::Rejected(format!("set_parent on missing node {id}")))?;
        node.parent = parent;
        Ok(())
    }

    fn delete(&self, id: NodeId) -> StoreResult<bool> {
        Ok(self.lock()?.live.nodes.remove(&id).is_some())
    }

    fn all(&self) -> StoreResult<Vec<Node>> {
        self.select(|_| true)
    }

    fn begin(&self) -> StoreResult<()> {
        let mut state = self.lock()?;
        if state.snapshot.is_some() {
            return Err(StoreError::Transaction("transaction already open".into()));
        }
        state.snapshot = Some(state.live.clone());
        Ok(())
    }

    fn commit(&self) -> StoreResult<()> {
        let mut state = self.lock()?;
        state
            .snapshot
            .take()
            .map(|_| ())
            .ok_or_else(|| StoreError::Transaction("commit without begin".into()))
    }

    fn rollback(&self) -> StoreResult<()> {
        let mut state = self.lock()?;
        let snapshot = state
            .snapshot
            .take()
            .ok_or_else(|| StoreError::Transaction("rollback without begin".into()))?;
        state.live = snapshot;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Bounds;

    fn record(name: &str, parent: Option<NodeId>, left: i64, right: i64) -> NewRecord {
        NewRecord {
            name: name.into(),
            parent,
            bounds: Bounds { left, right },
        }
    }

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert(record("a", None, 1, 6)).unwrap();
        store.insert(record("b", Some(1), 2, 3)).unwrap();
        store.insert(record("c", Some(1), 4, 5)).unwrap();
        store
    }

    #[test]
    fn given_inserts_when_querying_then_keys_are_sequential_and_sorted() {
        let store = seeded();
        let ids: Vec<NodeId> = store.all().unwrap().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(store.max_right().unwrap(), 6);
        assert_eq!(store.count_by_interval(1, 6, Some(1)).unwrap(), 2);
    }

    #[test]
    fn given_within_region_when_shifting_left_then_only_left_column_moves() {
        let store = seeded();
        store
            .shift_range(BoundKind::Left, Region::within(2, 4), 10)
            .unwrap();
        let b = store.get_by_key(2).unwrap().unwrap();
        let c = store.get_by_key(3).unwrap().unwrap();
        assert_eq!((b.left, b.right), (12, 3));
        assert_eq!((c.left, c.right), (14, 5));
    }

    #[test]
    fn given_open_transaction_when_rolling_back_then_restores_snapshot() {
        let store = seeded();
        store.begin().unwrap();
        store.delete_descendants(1).unwrap();
        store.delete(1).unwrap();
        assert!(store.all().unwrap().is_empty());
        store.rollback().unwrap();
        assert_eq!(store.all().unwrap().len(), 3);
        assert!(!store.in_transaction().unwrap());
    }

    #[test]
    fn given_no_transaction_when_committing_then_errors() {
        let store = MemoryStore::new();
        assert!(matches!(store.commit(), Err(StoreError::Transaction(_))));
        store.begin().unwrap();
        assert!(store.begin().is_err());
        assert!(store.commit().is_ok());
    }

    #[test]
    fn given_seeded_nodes_when_inserting_then_next_key_follows_highest() {
        let store = MemoryStore::with_nodes(vec![Node {
            id: 41,
            parent: None,
            left: 1,
            right: 2,
            name: "x".into(),
        }]);
        let node = store.insert(record("y", None, 3, 4)).unwrap();
        assert_eq!(node.id, 42);
    }

    #[test]
    fn given_new_records_when_replacing_then_live_state_and_keys_follow() {
        let store = seeded();
        store
            .replace_all(vec![Node {
                id: 7,
                parent: None,
                left: 1,
                right: 2,
                name: "z".into(),
            }])
            .unwrap();

        assert_eq!(store.all().unwrap().len(), 1);
        assert_eq!(store.insert(record("w", None, 3, 4)).unwrap().id, 8);
    }

    #[test]
    fn given_open_transaction_when_replacing_then_refused() {
        let store = seeded();
        store.begin().unwrap();
        assert!(matches!(
            store.replace_all(Vec::new()),
            Err(StoreError::Transaction(_))
        ));
        assert_eq!(store.all().unwrap().len(), 3);
    }
}

//! Read-only query service
//!
//! Holds the forest read lock for the duration of each query so no caller
//! ever sees a half-shifted forest.

use std::sync::{Arc, RwLockReadGuard};

use tracing::{debug, instrument};

use crate::application::services::ForestLock;
use crate::application::traversal;
use crate::application::{ApplicationError, ApplicationResult};
use crate::config::Settings;
use crate::domain::{check_forest, ForestArena, Node, NodeId};
use crate::infrastructure::traits::BoundsStore;

/// Service answering position, ordering and path questions from bounds.
pub struct TraversalService {
    store: Arc<dyn BoundsStore>,
    lock: ForestLock,
    recursive: bool,
}

impl TraversalService {
    /// Create a new traversal service.
    pub fn new(store: Arc<dyn BoundsStore>, lock: ForestLock, settings: &Settings) -> Self {
        Self {
            store,
            lock,
            recursive: settings.recursive,
        }
    }

    fn read(&self) -> ApplicationResult<RwLockReadGuard<'_, ()>> {
        self.lock.read().map_err(|_| ApplicationError::LockPoisoned)
    }

    /// Fetch one node.
    pub fn get(&self, id: NodeId) -> ApplicationResult<Node> {
        let _guard = self.read()?;
        traversal::fetch(self.store.as_ref(), id)
    }

    /// Count direct children, or all descendants when recursive.
    /// `None` uses the configured default.
    #[instrument(level = "debug", skip(self))]
    pub fn count_children(&self, id: NodeId, recursive: Option<bool>) -> ApplicationResult<usize> {
        let _guard = self.read()?;
        traversal::count_children(self.store.as_ref(), id, recursive.unwrap_or(self.recursive))
    }

    /// Direct children, or the whole subtree in preorder when recursive.
    /// `None` uses the configured default.
    #[instrument(level = "debug", skip(self))]
    pub fn get_children(&self, id: NodeId, recursive: Option<bool>) -> ApplicationResult<Vec<Node>> {
        let _guard = self.read()?;
        traversal::children(self.store.as_ref(), id, recursive.unwrap_or(self.recursive))
    }

    /// Nodes from the root down to `id`, inclusive.
    #[instrument(level = "debug", skip(self))]
    pub fn get_path(&self, id: NodeId) -> ApplicationResult<Vec<Node>> {
        let _guard = self.read()?;
        traversal::path(self.store.as_ref(), id)
    }

    /// Sibling position of `id`, starting at 0.
    #[instrument(level = "debug", skip(self))]
    pub fn get_position(&self, id: NodeId) -> ApplicationResult<Option<usize>> {
        let _guard = self.read()?;
        traversal::position(self.store.as_ref(), id)
    }

    /// The ordered root set.
    pub fn roots(&self) -> ApplicationResult<Vec<Node>> {
        let _guard = self.read()?;
        Ok(self.store.find_children(None)?)
    }

    /// Every node in preorder.
    pub fn forest(&self) -> ApplicationResult<Vec<Node>> {
        let _guard = self.read()?;
        Ok(self.store.all()?)
    }

    /// Highest right bound, 0 when empty.
    pub fn max_right(&self) -> ApplicationResult<i64> {
        let _guard = self.read()?;
        Ok(self.store.max_right()?)
    }

    /// Linked view of the whole forest for rendering.
    pub fn arena(&self) -> ApplicationResult<ForestArena> {
        Ok(ForestArena::from_preorder(&self.forest()?))
    }

    /// Verify every structural invariant. Returns the node count.
    #[instrument(level = "debug", skip(self))]
    pub fn check(&self) -> ApplicationResult<usize> {
        let nodes = self.forest()?;
        check_forest(&nodes)?;
        debug!("check passed for {} nodes", nodes.len());
        Ok(nodes.len())
    }
}

use std::fmt;

use generational_arena::{Arena, Index};
use termtree::Tree;
use tracing::instrument;

use crate::domain::entities::Node;

/// Payload of an arena node: the record it was built from.
#[derive(Debug, Clone)]
pub struct NodeData {
    pub node: Node,
}

impl fmt::Display for NodeData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.node)
    }
}

/// Tree node in the arena-based forest structure.
#[derive(Debug)]
pub struct TreeNode {
    pub data: NodeData,
    /// Index of parent node in the arena, None for root nodes
    pub parent: Option<Index>,
    /// Indices of child nodes in sibling order
    pub children: Vec<Index>,
}

/// Linked in-memory view of a nested-set forest.
///
/// Built from nodes in ascending-left order; used for rendering and for
/// depth queries that bounds alone answer poorly.
#[derive(Debug, Default)]
pub struct ForestArena {
    arena: Arena<TreeNode>,
    roots: Vec<Index>,
}

impl ForestArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the arena from nodes sorted by left bound, linking each node to
    /// the innermost interval still open when it starts.
    #[instrument(level = "debug", skip(nodes), fields(nodes = nodes.len()))]
    pub fn from_preorder(nodes: &[Node]) -> Self {
        let mut forest = Self::new();
        let mut open: Vec<(Index, i64)> = Vec::new();

        for node in nodes {
            while open.last().is_some_and(|&(_, right)| right < node.left) {
                open.pop();
            }
            let parent = open.last().map(|&(idx, _)| idx);
            let idx = forest.insert_node(NodeData { node: node.clone() }, parent);
            open.push((idx, node.right));
        }
        forest
    }

    #[instrument(level = "trace", skip(self))]
    pub fn insert_node(&mut self, data: NodeData, parent: Option<Index>) -> Index {
        let node_idx = self.arena.insert(TreeNode {
            data,
            parent,
            children: Vec::new(),
        });

        match parent.and_then(|p| self.arena.get_mut(p)) {
            Some(parent) => parent.children.push(node_idx),
            None => self.roots.push(node_idx),
        }
        node_idx
    }

    pub fn get_node(&self, idx: Index) -> Option<&TreeNode> {
        self.arena.get(idx)
    }

    pub fn roots(&self) -> &[Index] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Number of levels of the deepest tree, 0 for an empty forest.
    pub fn depth(&self) -> usize {
        self.roots
            .iter()
            .map(|&root| self.calculate_depth(root))
            .max()
            .unwrap_or(0)
    }

    fn calculate_depth(&self, node_idx: Index) -> usize {
        self.get_node(node_idx)
            .map(|node| {
                1 + node
                    .children
                    .iter()
                    .map(|&child| self.calculate_depth(child))
                    .max()
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }

    /// Names of all nodes without children, in preorder.
    pub fn leaf_names(&self) -> Vec<String> {
        let mut leaves = Vec::new();
        let mut stack: Vec<Index> = self.roots.iter().rev().copied().collect();
        while let Some(idx) = stack.pop() {
            if let Some(node) = self.get_node(idx) {
                if node.children.is_empty() {
                    leaves.push(node.data.node.name.clone());
                }
                stack.extend(node.children.iter().rev().copied());
            }
        }
        leaves
    }

    /// One renderable tree per root.
    pub fn to_display_trees(&self) -> Vec<Tree<String>> {
        self.roots
            .iter()
            .filter_map(|&root| self.display_tree(root))
            .collect()
    }

    fn display_tree(&self, idx: Index) -> Option<Tree<String>> {
        let node = self.get_node(idx)?;
        let leaves: Vec<Tree<String>> = node
            .children
            .iter()
            .filter_map(|&child| self.display_tree(child))
            .collect();
        Some(Tree::new(node.data.to_string()).with_leaves(leaves))
    }
}

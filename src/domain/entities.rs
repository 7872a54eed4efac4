//! Domain entities: nodes, bounds and shift regions

use std::fmt;

use crate::domain::error::DomainError;

/// Unique key of a node record.
pub type NodeId = u64;

/// A single record of the forest.
///
/// `parent == None` marks a root. `left`/`right` are the nested-set bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub left: i64,
    pub right: i64,
    /// Free-text payload, never interpreted by the engine
    pub name: String,
}

impl Node {
    pub fn bounds(&self) -> Bounds {
        Bounds {
            left: self.left,
            right: self.right,
        }
    }

    /// right - left
    pub fn span(&self) -> i64 {
        self.right - self.left
    }

    pub fn is_leaf(&self) -> bool {
        self.span() == 1
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Number of strict descendants, derived from the bounds alone.
    pub fn descendant_count(&self) -> usize {
        ((self.span() - 1) / 2) as usize
    }

    /// True if `other` lies strictly inside this node's interval.
    pub fn contains(&self, other: &Node) -> bool {
        self.left < other.left && other.right < self.right
    }

    /// Reject bounds that no consistent forest can produce (I1, I5).
    pub fn ensure_consistent(&self) -> Result<(), DomainError> {
        if self.left < 1 {
            return Err(DomainError::InconsistentBounds {
                node: self.id,
                reason: format!("left bound {} is not positive", self.left),
            });
        }
        if self.left >= self.right {
            return Err(DomainError::InconsistentBounds {
                node: self.id,
                reason: format!("left {} is not below right {}", self.left, self.right),
            });
        }
        if self.span() % 2 == 0 {
            return Err(DomainError::InconsistentBounds {
                node: self.id,
                reason: format!("span {} is even", self.span()),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] ({}, {})", self.name, self.id, self.left, self.right)
    }
}

/// A bound pair assigned to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub left: i64,
    pub right: i64,
}

/// Record the host wants to create. Bounds are assigned by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNode {
    pub name: String,
    pub parent: Option<NodeId>,
}

impl NewNode {
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
        }
    }

    pub fn child(name: impl Into<String>, parent: NodeId) -> Self {
        Self {
            name: name.into(),
            parent: Some(parent),
        }
    }
}

/// A fully positioned record handed to the store for persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub name: String,
    pub parent: Option<NodeId>,
    pub bounds: Bounds,
}

/// Which bound column a range update applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundKind {
    Left,
    Right,
}

/// Predicate selecting bound values for a range shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// Every value `>= threshold`
    AtLeast(i64),
    /// Every value in the closed interval `[floor, ceiling]`
    Within { floor: i64, ceiling: i64 },
}

impl Region {
    pub fn within(floor: i64, ceiling: i64) -> Self {
        Region::Within { floor, ceiling }
    }

    pub fn contains(&self, value: i64) -> bool {
        match *self {
            Region::AtLeast(threshold) => value >= threshold,
            Region::Within { floor, ceiling } => floor <= value && value <= ceiling,
        }
    }

    /// A `Within` region whose floor exceeds its ceiling matches nothing.
    pub fn is_empty(&self) -> bool {
        matches!(*self, Region::Within { floor, ceiling } if floor > ceiling)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::AtLeast(threshold) => write!(f, ">= {threshold}"),
            Region::Within { floor, ceiling } => write!(f, "[{floor}, {ceiling}]"),
        }
    }
}

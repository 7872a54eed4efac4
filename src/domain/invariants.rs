//! Whole-forest consistency checks.
//!
//! Verifies nesting, parent references, sibling order, span parity and
//! bound uniqueness in a single sweep over the nodes ordered by left bound.
//! The bound values of a healthy forest are exactly `1..=2n`.

use std::collections::HashSet;

use itertools::Itertools;
use tracing::{debug, instrument};

use crate::domain::entities::{Node, NodeId};
use crate::domain::error::DomainError;

fn inconsistent(node: NodeId, reason: impl Into<String>) -> DomainError {
    DomainError::InconsistentBounds {
        node,
        reason: reason.into(),
    }
}

/// Check every structural invariant of `nodes`, returning the first violation.
#[instrument(level = "debug", skip(nodes), fields(nodes = nodes.len()))]
pub fn check_forest(nodes: &[Node]) -> Result<(), DomainError> {
    let mut ids = HashSet::with_capacity(nodes.len());
    for node in nodes {
        node.ensure_consistent()?;
        if !ids.insert(node.id) {
            return Err(inconsistent(node.id, "duplicate key"));
        }
    }

    check_bound_values(nodes)?;
    check_nesting(nodes)?;

    debug!("forest of {} nodes is consistent", nodes.len());
    Ok(())
}

/// Every bound value is used once and the values form `1..=2n`.
fn check_bound_values(nodes: &[Node]) -> Result<(), DomainError> {
    let values: Vec<(i64, NodeId)> = nodes
        .iter()
        .flat_map(|n| [(n.left, n.id), (n.right, n.id)])
        .sorted()
        .collect();

    if let Some(&(first, id)) = values.first() {
        if first != 1 {
            return Err(inconsistent(id, format!("lowest bound is {first}, expected 1")));
        }
    }
    for ((prev, _), (next, id)) in values.iter().copied().tuple_windows() {
        if next == prev {
            return Err(inconsistent(id, format!("bound {next} is shared")));
        }
        if next != prev + 1 {
            return Err(inconsistent(
                id,
                format!("gap between bounds {prev} and {next}"),
            ));
        }
    }
    Ok(())
}

/// Intervals nest or are disjoint, and each parent reference names the
/// innermost enclosing interval.
fn check_nesting(nodes: &[Node]) -> Result<(), DomainError> {
    let mut open: Vec<&Node> = Vec::new();

    for node in nodes.iter().sorted_by_key(|n| n.left) {
        while open.last().is_some_and(|top| top.right < node.left) {
            open.pop();
        }

        let expected_parent = match open.last() {
            Some(top) if node.right > top.right => {
                return Err(inconsistent(
                    node.id,
                    format!(
                        "interval ({}, {}) overlaps ({}, {}) of node {}",
                        node.left, node.right, top.left, top.right, top.id
                    ),
                ));
            }
            Some(top) => Some(top.id),
            None => None,
        };

        if node.parent != expected_parent {
            return Err(inconsistent(
                node.id,
                format!(
                    "parent reference {:?} does not match enclosing node {:?}",
                    node.parent, expected_parent
                ),
            ));
        }
        open.push(node);
    }
    Ok(())
}

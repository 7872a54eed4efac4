//! nestset: maintain hierarchical records in nested-set (lft/rght) form.
//!
//! Every node carries a left and right bound such that a subtree is exactly
//! the set of nodes whose bounds fall inside its root's bounds. Structural
//! changes (insert, delete, reparent, sibling reordering) rewrite those
//! bounds through a [`infrastructure::traits::BoundsStore`] inside a single
//! transaction.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;

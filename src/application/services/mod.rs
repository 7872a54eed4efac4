//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on the `BoundsStore` I/O boundary trait but are
//! themselves concrete structs, not traits.

use std::sync::{Arc, RwLock};

mod nested_set;
mod traversal;

pub use nested_set::NestedSetService;
pub use traversal::TraversalService;

/// Per-forest lock: mutations hold it exclusively, queries shared.
pub type ForestLock = Arc<RwLock<()>>;

//! Domain layer: entities and business rules
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod arena;
pub mod entities;
pub mod error;
pub mod invariants;

pub use arena::{ForestArena, NodeData, TreeNode};
pub use entities::*;
pub use error::DomainError;
pub use invariants::check_forest;

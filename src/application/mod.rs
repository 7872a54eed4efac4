//! Application layer: services and the nested-set algorithms
//!
//! This layer orchestrates domain logic and depends on the store boundary trait.

pub mod error;
pub mod services;
pub mod shift;
pub mod traversal;

pub use error::{ApplicationError, ApplicationResult};

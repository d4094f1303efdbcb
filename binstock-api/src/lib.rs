//! Binstock API - Shared types for the slot/compartment allocation engine.

mod column;
mod event;
mod model;
mod query;
mod walk;

pub use column::*;
pub use event::*;
pub use model::*;
pub use query::*;
pub use walk::*;

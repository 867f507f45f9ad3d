//! Provides storage for observations and climate normals.
//!
//! `repository` defines the contracts the analytics core consumes; `postgres` and `memory`
//! are the two backends implementing them.

mod memory;
mod postgres;
mod repository;

pub use memory::*;
pub use postgres::*;
pub use repository::*;

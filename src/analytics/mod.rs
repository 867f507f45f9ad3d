//! The analytics core: climate normals computation and weather-twin matching.
//!
//! Both engines talk to storage only through the traits in [`crate::db`], so they run
//! unchanged against PostgreSQL or the in-memory store.

mod normals;
mod similarity;
mod twins;

pub use normals::*;
pub use twins::*;

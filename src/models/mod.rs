//! Defines the data structures and models used throughout the application.
//!
//! This includes observations and locations read from the store, the climate normals
//! derived from them, and the payloads produced by twin searches.

mod condition;
mod normals;
mod observation;
mod twins;

pub use condition::*;
pub use normals::*;
pub use observation::*;
pub use twins::*;

//! Handles Command Line Interface (CLI) related functionalities.
//!
//! Includes the `clap` command definitions, the `App` that runs them against a store,
//! interactive prompts for the menu loop and table rendering of results.

mod commands;
mod prompts;
mod render;

pub use commands::*;
pub use prompts::*;
